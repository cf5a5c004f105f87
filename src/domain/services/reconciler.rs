use crate::config::Config;
use crate::domain::ports::{CalendarPort, Clock};
use crate::domain::services::booking_service::BookingService;
use crate::error::AppError;
use chrono::Duration;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info};

/// Pulls the externally-owned calendar of record and applies out-of-band
/// cancellations and time changes to local bookings.
pub struct CalendarReconciler {
    calendar: Arc<dyn CalendarPort>,
    bookings: Arc<BookingService>,
    clock: Arc<dyn Clock>,
    window_days: i64,
    port_timeout: StdDuration,
}

impl CalendarReconciler {
    pub fn new(
        calendar: Arc<dyn CalendarPort>,
        bookings: Arc<BookingService>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            calendar,
            bookings,
            clock,
            window_days: config.reconcile_window_days,
            port_timeout: StdDuration::from_secs(config.port_timeout_secs),
        }
    }

    /// One reconciliation pass over the forward-looking window. Failures
    /// on a single event are logged and skipped so the rest of the pass
    /// still runs. Re-running without external changes writes nothing.
    pub async fn run_once(&self) -> Result<usize, AppError> {
        let now = self.clock.now();
        let until = now + Duration::days(self.window_days);

        let events = tokio::time::timeout(
            self.port_timeout,
            self.calendar.list_events(now, until, true),
        )
        .await
        .unwrap_or_else(|_| Err(AppError::Calendar("Calendar listing timed out".to_string())))?;

        let total = events.len();
        let mut processed = 0;

        for event in events {
            if event.booking_id.is_none() {
                // Not a lesson created by this system.
                debug!("Reconcile: ignoring foreign calendar event {}", event.id);
                continue;
            }
            match self.bookings.apply_external_change(&event).await {
                Ok(()) => processed += 1,
                Err(e) => error!("Reconcile: event {} failed, skipping: {}", event.id, e),
            }
        }

        debug!("Reconcile pass done: {} of {} events processed", processed, total);
        Ok(processed)
    }

    /// Recovery half of the loop: re-create calendar events for bookings
    /// that never made it into the calendar.
    pub async fn sweep_pending_sync(&self) -> Result<usize, AppError> {
        let synced = self.bookings.sweep_pending_sync().await?;
        if synced > 0 {
            info!("Reconciler recovered {} unsynced booking(s)", synced);
        }
        Ok(synced)
    }
}
