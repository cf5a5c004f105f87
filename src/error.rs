use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Resource not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Slot unavailable")]
    SlotUnavailable,
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Calendar error: {0}")]
    Calendar(String),
    #[error("Notifier error: {0}")]
    Notifier(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps a lost booking race (unique violation on the reservation table)
    /// to `SlotUnavailable` so the caller can re-run the availability search.
    pub fn from_reservation_insert(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            let code = db_err.code().unwrap_or_default();
            // 2067 = SQLITE_CONSTRAINT_UNIQUE, 1555 = SQLITE_CONSTRAINT_PRIMARYKEY
            if code == "2067" || code == "1555" {
                return AppError::SlotUnavailable;
            }
        }
        AppError::Database(e)
    }
}
