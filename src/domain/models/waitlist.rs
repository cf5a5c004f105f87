use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Active,
    Notified,
    Expired,
    Fulfilled,
    Cancelled,
}

impl WaitlistStatus {
    /// Active and notified entries still hold a queue position and remain
    /// eligible for matching.
    pub fn is_open(&self) -> bool {
        matches!(self, WaitlistStatus::Active | WaitlistStatus::Notified)
    }
}

/// A pending request for a time that had no bookable slot when asked.
///
/// The preference is either an exact instant (`preferred_start`) or a
/// flexible day/time-window description; unset fields are unconstrained.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct WaitlistEntry {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub student_contact: String,
    pub preferred_start: Option<DateTime<Utc>>,
    /// 0 = Monday .. 6 = Sunday, in the schedule timezone.
    pub day_of_week: Option<i64>,
    /// "HH:MM" bounds in the schedule timezone.
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub duration_min: i64,
    pub accept_shorter: bool,
    pub accept_longer: bool,
    pub status: WaitlistStatus,
    pub priority: i64,
    pub position: i64,
    pub expires_at: DateTime<Utc>,
    pub notification_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct WaitlistPreference {
    pub preferred_start: Option<DateTime<Utc>>,
    pub day_of_week: Option<i64>,
    pub window_start: Option<String>,
    pub window_end: Option<String>,
    pub duration_min: i64,
    pub accept_shorter: bool,
    pub accept_longer: bool,
    pub priority: i64,
}

impl WaitlistEntry {
    pub fn new(
        student_id: String,
        student_name: String,
        student_contact: String,
        pref: WaitlistPreference,
        position: i64,
        max_wait_days: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            student_id,
            student_name,
            student_contact,
            preferred_start: pref.preferred_start,
            day_of_week: pref.day_of_week,
            window_start: pref.window_start,
            window_end: pref.window_end,
            duration_min: pref.duration_min,
            accept_shorter: pref.accept_shorter,
            accept_longer: pref.accept_longer,
            status: WaitlistStatus::Active,
            priority: pref.priority,
            position,
            expires_at: now + Duration::days(max_wait_days),
            notification_count: 0,
            created_at: now,
        }
    }
}
