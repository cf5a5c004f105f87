use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    CancelledByStudent,
    CancelledByTeacher,
    NoShow,
}

impl BookingStatus {
    /// Statuses that occupy their time window. No two bookings in this set
    /// may overlap closed-open.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            BookingStatus::Scheduled | BookingStatus::Confirmed | BookingStatus::InProgress
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            BookingStatus::CancelledByStudent | BookingStatus::CancelledByTeacher
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
    Error,
}

/// Who triggered a cancellation. Decides the terminal status and whether
/// the late-cancellation fee applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelActor {
    Student,
    Teacher,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Booking {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub student_contact: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_min: i64,
    pub status: BookingStatus,
    pub calendar_event_id: Option<String>,
    pub sync_status: SyncStatus,
    pub origin_booking_id: Option<String>,
    pub reschedule_count: i64,
    pub price_cents: i64,
    pub note: Option<String>,
    pub confirmation_sent: bool,
    pub reminder_sent: bool,
    pub late_fee_applied: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub management_token: String,
    pub created_at: DateTime<Utc>,
}

pub struct NewBookingParams {
    pub student_id: String,
    pub student_name: String,
    pub student_contact: String,
    pub start: DateTime<Utc>,
    pub duration_min: i64,
    pub price_cents: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(params: NewBookingParams) -> Self {
        let end_time = params.start + Duration::minutes(params.duration_min);

        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            student_id: params.student_id,
            student_name: params.student_name,
            student_contact: params.student_contact,
            start_time: params.start,
            end_time,
            duration_min: params.duration_min,
            status: BookingStatus::Scheduled,
            calendar_event_id: None,
            sync_status: SyncStatus::Pending,
            origin_booking_id: None,
            reschedule_count: 0,
            price_cents: params.price_cents,
            note: params.note,
            confirmation_sent: false,
            reminder_sent: false,
            late_fee_applied: false,
            cancelled_at: None,
            cancel_reason: None,
            management_token: token,
            created_at: params.created_at,
        }
    }

    /// Reservation keys: one per 30-minute step through [start, end),
    /// anchored at the booking's own start. The unique index on these turns
    /// a lost booking race into a detectable insert failure. Anchoring at
    /// the start (not a fixed grid) keeps back-to-back lessons in off-grid
    /// windows, such as one opening at 10:15, from colliding.
    pub fn reservation_keys(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<String> {
        let mut keys = Vec::new();
        let step = Duration::minutes(30);
        let mut cursor = start;
        while cursor < end {
            keys.push(cursor.format("%Y%m%d%H%M").to_string());
            cursor += step;
        }
        keys
    }
}
