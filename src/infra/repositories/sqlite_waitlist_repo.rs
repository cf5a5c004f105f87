use crate::domain::models::waitlist::WaitlistEntry;
use crate::domain::ports::WaitlistRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteWaitlistRepo {
    pool: SqlitePool,
}

impl SqliteWaitlistRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitlistRepository for SqliteWaitlistRepo {
    async fn create(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "INSERT INTO waitlist_entries (id, student_id, student_name, student_contact, preferred_start, day_of_week, \
             window_start, window_end, duration_min, accept_shorter, accept_longer, status, priority, position, \
             expires_at, notification_count, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&entry.id)
        .bind(&entry.student_id)
        .bind(&entry.student_name)
        .bind(&entry.student_contact)
        .bind(entry.preferred_start)
        .bind(entry.day_of_week)
        .bind(&entry.window_start)
        .bind(&entry.window_end)
        .bind(entry.duration_min)
        .bind(entry.accept_shorter)
        .bind(entry.accept_longer)
        .bind(entry.status)
        .bind(entry.priority)
        .bind(entry.position)
        .bind(entry.expires_at)
        .bind(entry.notification_count)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>("SELECT * FROM waitlist_entries WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_open(&self) -> Result<Vec<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist_entries WHERE status IN ('active','notified') \
             ORDER BY priority DESC, created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn count_open(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM waitlist_entries WHERE status IN ('active','notified')",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(count)
    }

    async fn update(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "UPDATE waitlist_entries SET status=?, priority=?, position=?, notification_count=?, expires_at=?
             WHERE id=?
             RETURNING *",
        )
        .bind(entry.status)
        .bind(entry.priority)
        .bind(entry.position)
        .bind(entry.notification_count)
        .bind(entry.expires_at)
        .bind(&entry.id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn set_position(&self, id: &str, position: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE waitlist_entries SET position = ? WHERE id = ?")
            .bind(position)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, AppError> {
        sqlx::query_as::<_, WaitlistEntry>(
            "SELECT * FROM waitlist_entries WHERE status IN ('active','notified') AND expires_at <= ?",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }
}
