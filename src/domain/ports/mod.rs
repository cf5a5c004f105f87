use crate::domain::models::{
    booking::Booking,
    notification::NotificationRecord,
    schedule::{BusyBlock, SchedulePolicy, ScheduleOverride},
    student::Student,
    waitlist::WaitlistEntry,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Inserts the booking and its reservation keys in one transaction.
    /// A unique violation on a key means the slot was taken concurrently
    /// and surfaces as `AppError::SlotUnavailable`.
    async fn create(&self, booking: &Booking, reservation_keys: &[String]) -> Result<Booking, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError>;
    async fn find_by_calendar_event(&self, event_id: &str) -> Result<Option<Booking>, AppError>;
    /// Active bookings whose [start, end) overlaps the given range, closed-open.
    async fn list_active_overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
    async fn count_active_overlap(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, AppError>;
    async fn update(&self, booking: &Booking) -> Result<Booking, AppError>;
    async fn clear_reservations(&self, booking_id: &str) -> Result<(), AppError>;
    /// Swaps the reservation keys for a booking whose time changed.
    async fn replace_reservations(&self, booking_id: &str, keys: &[String]) -> Result<(), AppError>;
    /// Active future bookings whose calendar sync has not succeeded yet.
    async fn find_pending_sync(&self, after: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
    /// Active bookings starting inside [from, until) that have not been reminded.
    async fn find_reminder_due(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Booking>, AppError>;
    /// Integrity check: id pairs of active bookings that overlap. Non-empty
    /// output indicates a concurrency-control defect, not something to heal.
    async fn find_overlapping_active(&self) -> Result<Vec<(String, String)>, AppError>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn upsert(&self, contact: &str, name: &str, now: DateTime<Utc>) -> Result<Student, AppError>;
    async fn find_by_contact(&self, contact: &str) -> Result<Option<Student>, AppError>;
    async fn increment_booked(&self, id: &str) -> Result<(), AppError>;
    async fn increment_cancelled(&self, id: &str) -> Result<(), AppError>;
    async fn add_debt(&self, id: &str, cents: i64) -> Result<(), AppError>;
}

#[async_trait]
pub trait WaitlistRepository: Send + Sync {
    async fn create(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<WaitlistEntry>, AppError>;
    /// Open entries (active or notified), priority desc then created_at asc.
    async fn list_open(&self) -> Result<Vec<WaitlistEntry>, AppError>;
    async fn count_open(&self) -> Result<i64, AppError>;
    async fn update(&self, entry: &WaitlistEntry) -> Result<WaitlistEntry, AppError>;
    async fn set_position(&self, id: &str, position: i64) -> Result<(), AppError>;
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<WaitlistEntry>, AppError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, record: &NotificationRecord) -> Result<NotificationRecord, AppError>;
    /// Pending/retrying records due at `now`, priority desc then scheduled_at asc.
    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<NotificationRecord>, AppError>;
    async fn update(&self, record: &NotificationRecord) -> Result<NotificationRecord, AppError>;
    async fn exists_with_hash(&self, context_hash: &str) -> Result<bool, AppError>;
    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
    async fn list_for_booking(&self, booking_id: &str) -> Result<Vec<NotificationRecord>, AppError>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn get_policy(&self) -> Result<SchedulePolicy, AppError>;
    async fn upsert_policy(&self, policy: &SchedulePolicy) -> Result<SchedulePolicy, AppError>;
    async fn find_override(&self, date: NaiveDate) -> Result<Option<ScheduleOverride>, AppError>;
    async fn upsert_override(&self, rule: &ScheduleOverride) -> Result<ScheduleOverride, AppError>;
    async fn create_busy_block(&self, block: &BusyBlock) -> Result<BusyBlock, AppError>;
    async fn list_busy_blocks(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyBlock>, AppError>;
    async fn delete_busy_block(&self, id: &str) -> Result<(), AppError>;
}

/// An event in the externally-owned calendar of record.
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub id: String,
    /// Back-reference to the local booking, when the event was created by us.
    pub booking_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub summary: String,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub struct CalendarEventDetails {
    pub booking_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub summary: String,
    pub description: Option<String>,
}

#[async_trait]
pub trait CalendarPort: Send + Sync {
    async fn create_event(&self, details: &CalendarEventDetails) -> Result<String, AppError>;
    async fn update_event(&self, event_id: &str, details: &CalendarEventDetails) -> Result<(), AppError>;
    async fn delete_event(&self, event_id: &str) -> Result<(), AppError>;
    async fn list_events(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        include_cancelled: bool,
    ) -> Result<Vec<CalendarEvent>, AppError>;
}

#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Fire-and-forget delivery; only success/failure is reported.
    async fn send(&self, recipient: &str, text: &str) -> Result<(), AppError>;
}

/// Injectable wall clock so lead-time, expiry and reconciliation logic are
/// testable without real waits.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
