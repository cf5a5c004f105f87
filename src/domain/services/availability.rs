use crate::config::Config;
use crate::domain::ports::{BookingRepository, Clock, ScheduleRepository};
use crate::domain::services::messages;
use crate::domain::services::slots::calculate_slots;
use crate::error::AppError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::Arc;

/// A bookable candidate, annotated for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
    pub price_cents: i64,
}

pub struct AvailabilityChecker {
    schedule_repo: Arc<dyn ScheduleRepository>,
    booking_repo: Arc<dyn BookingRepository>,
    clock: Arc<dyn Clock>,
    max_results: usize,
}

impl AvailabilityChecker {
    pub fn new(
        schedule_repo: Arc<dyn ScheduleRepository>,
        booking_repo: Arc<dyn BookingRepository>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            schedule_repo,
            booking_repo,
            clock,
            max_results: config.max_slot_results,
        }
    }

    /// All bookable slots of the given duration on one date.
    pub async fn slots_for_date(
        &self,
        date: NaiveDate,
        duration_min: i64,
    ) -> Result<Vec<Slot>, AppError> {
        let policy = self.schedule_repo.get_policy().await?;
        let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);

        // A generous UTC range around the local date covers any timezone offset.
        let day_anchor = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::Validation("Invalid date".to_string()))?
            .and_utc();
        let range_start = day_anchor - Duration::hours(36);
        let range_end = day_anchor + Duration::hours(60);

        let existing = self
            .booking_repo
            .list_active_overlapping(range_start, range_end)
            .await?;
        let busy = self.schedule_repo.list_busy_blocks(range_start, range_end).await?;
        let override_rule = self.schedule_repo.find_override(date).await?;

        let starts = calculate_slots(
            &policy,
            date,
            duration_min,
            &existing,
            &busy,
            override_rule.as_ref(),
            self.clock.now(),
        );

        let price_cents = policy.price_for(duration_min);
        Ok(starts
            .into_iter()
            .map(|start| {
                let end = start + Duration::minutes(duration_min);
                Slot {
                    start,
                    end,
                    label: format!(
                        "{}\u{2013}{}",
                        messages::format_local(start, &tz),
                        end.with_timezone(&tz).format("%H:%M")
                    ),
                    price_cents,
                }
            })
            .collect())
    }

    /// Slots over the next `days` days, chronological, capped at the
    /// configured result count. Days without effective windows contribute
    /// nothing and are skipped.
    pub async fn upcoming_slots(
        &self,
        days: i64,
        duration_min: i64,
    ) -> Result<Vec<Slot>, AppError> {
        let policy = self.schedule_repo.get_policy().await?;
        let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);
        let today = self.clock.now().with_timezone(&tz).date_naive();

        let mut results = Vec::new();
        for offset in 0..days {
            if results.len() >= self.max_results {
                break;
            }
            let date = today + Duration::days(offset);
            let mut day_slots = self.slots_for_date(date, duration_min).await?;
            day_slots.truncate(self.max_results - results.len());
            results.extend(day_slots);
        }
        Ok(results)
    }
}
