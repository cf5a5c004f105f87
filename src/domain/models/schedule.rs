use chrono::{DateTime, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One bookable span inside a day, "HH:MM" local times.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TimeWindow {
    pub start: String,
    pub end: String,
}

impl TimeWindow {
    pub fn parse(&self) -> Option<(NaiveTime, NaiveTime)> {
        let start = NaiveTime::parse_from_str(&self.start, "%H:%M").ok()?;
        let end = NaiveTime::parse_from_str(&self.end, "%H:%M").ok()?;
        Some((start, end))
    }

    /// A window can accommodate a duration that fits its span.
    pub fn can_accommodate(&self, duration_min: i64) -> bool {
        match self.parse() {
            Some((start, end)) => {
                let span = (end - start).num_minutes();
                span >= duration_min
            }
            None => false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct WeekdayConfig {
    pub monday: Option<Vec<TimeWindow>>,
    pub tuesday: Option<Vec<TimeWindow>>,
    pub wednesday: Option<Vec<TimeWindow>>,
    pub thursday: Option<Vec<TimeWindow>>,
    pub friday: Option<Vec<TimeWindow>>,
    pub saturday: Option<Vec<TimeWindow>>,
    pub sunday: Option<Vec<TimeWindow>>,
}

impl WeekdayConfig {
    pub fn for_weekday(&self, weekday: Weekday) -> Option<&Vec<TimeWindow>> {
        match weekday {
            Weekday::Mon => self.monday.as_ref(),
            Weekday::Tue => self.tuesday.as_ref(),
            Weekday::Wed => self.wednesday.as_ref(),
            Weekday::Thu => self.thursday.as_ref(),
            Weekday::Fri => self.friday.as_ref(),
            Weekday::Sat => self.saturday.as_ref(),
            Weekday::Sun => self.sunday.as_ref(),
        }
    }
}

/// The teacher-side availability configuration. One row; read-only input
/// to slot computation, mutated only by owner-facing administration.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct SchedulePolicy {
    pub id: String,
    pub timezone: String,
    /// Weekly recurring windows as a `WeekdayConfig` JSON document.
    pub config_json: String,
    pub min_duration_min: i64,
    pub max_duration_min: i64,
    pub slot_interval_min: i64,
    /// Minutes kept free after every lesson.
    pub buffer_after_min: i64,
    pub min_lead_minutes: i64,
    pub max_advance_days: i64,
    pub hourly_rate_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl SchedulePolicy {
    pub fn weekly_config(&self) -> WeekdayConfig {
        serde_json::from_str(&self.config_json).unwrap_or_default()
    }

    pub fn price_for(&self, duration_min: i64) -> i64 {
        self.hourly_rate_cents * duration_min / 60
    }
}

/// A date-bounded exception: either the whole day is blocked or the
/// weekly windows for that date are replaced.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ScheduleOverride {
    pub id: String,
    pub date: NaiveDate,
    pub is_unavailable: bool,
    pub override_config_json: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ScheduleOverride {
    pub fn new(date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date,
            is_unavailable: false,
            override_config_json: None,
            created_at: now,
        }
    }
}

/// An owner-issued manual unavailability range, independent of the weekly
/// config. Occupies time exactly like an active booking.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct BusyBlock {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BusyBlock {
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            start_time,
            end_time,
            reason,
            created_at: now,
        }
    }
}
