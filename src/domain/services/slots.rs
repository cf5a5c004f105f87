use crate::domain::models::booking::Booking;
use crate::domain::models::schedule::{BusyBlock, SchedulePolicy, ScheduleOverride, WeekdayConfig};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::cmp::{max, min};

const TOTAL_MINUTES: usize = 1440;

/// Closed-open interval overlap. Back-to-back ranges do not conflict.
pub fn overlaps(
    a_start: DateTime<Utc>,
    a_end: DateTime<Utc>,
    b_start: DateTime<Utc>,
    b_end: DateTime<Utc>,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// Commit-time conflict check against active bookings, including the
/// configured tail buffer of each existing booking.
pub fn has_conflict(
    existing: &[Booking],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    buffer_after_min: i64,
) -> bool {
    let buffer = Duration::minutes(buffer_after_min);
    existing.iter().any(|b| {
        b.status.is_active() && overlaps(b.start_time, b.end_time + buffer, start, end)
    })
}

fn mark_range(
    minutes: &mut [bool; TOTAL_MINUTES],
    range_start: DateTime<Utc>,
    range_end: DateTime<Utc>,
    day_start_utc: DateTime<Utc>,
    day_end_utc: DateTime<Utc>,
) {
    let clipped_start = max(range_start, day_start_utc);
    let clipped_end = min(range_end, day_end_utc);
    if clipped_start >= clipped_end {
        return;
    }

    let start_diff = (clipped_start - day_start_utc).num_minutes();
    let end_diff = (clipped_end - day_start_utc).num_minutes();

    let s_idx = max(0, min(start_diff, TOTAL_MINUTES as i64)) as usize;
    let e_idx = max(0, min(end_diff, TOTAL_MINUTES as i64)) as usize;

    for slot in &mut minutes[s_idx..e_idx] {
        *slot = true;
    }
}

/// Candidate slot starts for one date, in UTC, ascending.
///
/// Effective windows are the override's replacement config when present,
/// otherwise the weekly config for the date's weekday. An `is_unavailable`
/// override blanks the whole day. Existing active bookings (plus their
/// tail buffer) and busy blocks occupy minutes; a candidate must fit into
/// unoccupied minutes, start after the lead-time cutoff and inside the
/// advance-booking horizon.
pub fn calculate_slots(
    policy: &SchedulePolicy,
    date: NaiveDate,
    duration_min: i64,
    existing_bookings: &[Booking],
    busy_blocks: &[BusyBlock],
    override_rule: Option<&ScheduleOverride>,
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);

    if override_rule.is_some_and(|r| r.is_unavailable) {
        return Vec::new();
    }

    if duration_min < policy.min_duration_min || duration_min > policy.max_duration_min {
        return Vec::new();
    }

    let interval_min = policy.slot_interval_min;
    if duration_min <= 0 || interval_min <= 0 {
        return Vec::new();
    }

    let config: WeekdayConfig = match override_rule.and_then(|r| r.override_config_json.as_ref()) {
        Some(json) => serde_json::from_str(json).unwrap_or_else(|_| policy.weekly_config()),
        None => policy.weekly_config(),
    };

    let daily_windows = match config.for_weekday(date.weekday()) {
        Some(windows) => windows,
        None => return Vec::new(),
    };

    let day_start_tz = match date
        .and_hms_opt(0, 0, 0)
        .and_then(|dt| tz.from_local_datetime(&dt).single())
    {
        Some(dt) => dt,
        None => return Vec::new(),
    };
    let day_start_utc = day_start_tz.with_timezone(&Utc);
    let day_end_utc = day_start_utc + Duration::minutes(TOTAL_MINUTES as i64);

    let mut occupied = [false; TOTAL_MINUTES];
    let buffer = Duration::minutes(policy.buffer_after_min);

    for booking in existing_bookings {
        if !booking.status.is_active() {
            continue;
        }
        mark_range(
            &mut occupied,
            booking.start_time,
            booking.end_time + buffer,
            day_start_utc,
            day_end_utc,
        );
    }
    for block in busy_blocks {
        mark_range(
            &mut occupied,
            block.start_time,
            block.end_time,
            day_start_utc,
            day_end_utc,
        );
    }

    let lead_cutoff = now + Duration::minutes(policy.min_lead_minutes);
    let horizon = now + Duration::days(policy.max_advance_days);

    let mut valid_slots = Vec::new();

    for window in daily_windows {
        if !window.can_accommodate(duration_min) {
            continue;
        }
        let (win_start, win_end) = match window.parse() {
            Some(parsed) => parsed,
            None => continue,
        };

        let win_start_idx = (win_start.hour() * 60 + win_start.minute()) as i64;
        let mut win_end_idx = (win_end.hour() * 60 + win_end.minute()) as i64;
        if win_end_idx == 1439 {
            win_end_idx = 1440;
        }

        let mut cursor = win_start_idx;
        while cursor + duration_min <= win_end_idx {
            let hour = (cursor / 60) as u32;
            let minute = (cursor % 60) as u32;

            let slot_tz = NaiveTime::from_hms_opt(hour, minute, 0)
                .and_then(|nt| tz.from_local_datetime(&date.and_time(nt)).single());

            if let Some(slot_tz) = slot_tz {
                let slot_utc = slot_tz.with_timezone(&Utc);

                let mut free = true;
                for i in cursor..(cursor + duration_min) {
                    if (i as usize) < TOTAL_MINUTES && occupied[i as usize] {
                        free = false;
                        break;
                    }
                }

                if free && slot_utc >= lead_cutoff && slot_utc <= horizon {
                    valid_slots.push(slot_utc);
                }
            }
            cursor += interval_min;
        }
    }

    valid_slots.sort();
    valid_slots.dedup();
    valid_slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::booking::{Booking, NewBookingParams};
    use chrono::NaiveDate;

    fn policy(config: &str) -> SchedulePolicy {
        SchedulePolicy {
            id: "policy".to_string(),
            timezone: "UTC".to_string(),
            config_json: config.to_string(),
            min_duration_min: 30,
            max_duration_min: 120,
            slot_interval_min: 30,
            buffer_after_min: 0,
            min_lead_minutes: 30,
            max_advance_days: 60,
            hourly_rate_cents: 4000,
            created_at: Utc::now(),
        }
    }

    fn booking_at(date: NaiveDate, hour: u32, duration_min: i64) -> Booking {
        let start = date.and_hms_opt(hour, 0, 0).unwrap().and_utc();
        Booking::new(NewBookingParams {
            student_id: "s1".to_string(),
            student_name: "Student".to_string(),
            student_contact: "@student".to_string(),
            start,
            duration_min,
            price_cents: 4000,
            note: None,
            created_at: Utc::now(),
        })
    }

    fn far_monday() -> NaiveDate {
        // A Monday well past any lead-time cutoff relative to the fixed "now".
        NaiveDate::from_ymd_opt(2030, 6, 3).unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
            .and_utc()
    }

    const BUSINESS_HOURS: &str = r#"{"monday":[{"start":"10:00","end":"18:00"}]}"#;

    #[test]
    fn generates_half_hour_grid_within_window() {
        let slots = calculate_slots(
            &policy(BUSINESS_HOURS),
            far_monday(),
            60,
            &[],
            &[],
            None,
            fixed_now(),
        );
        // 10:00 through 17:00 inclusive at 30-minute steps.
        assert_eq!(slots.len(), 15);
        assert_eq!(slots[0].format("%H:%M").to_string(), "10:00");
        assert_eq!(slots[14].format("%H:%M").to_string(), "17:00");
    }

    #[test]
    fn existing_booking_excludes_overlapping_candidates() {
        let date = far_monday();
        let existing = vec![booking_at(date, 14, 60)];
        let slots = calculate_slots(
            &policy(BUSINESS_HOURS),
            date,
            60,
            &existing,
            &[],
            None,
            fixed_now(),
        );

        let starts: Vec<String> = slots.iter().map(|s| s.format("%H:%M").to_string()).collect();
        for blocked in ["13:30", "14:00", "14:30"] {
            assert!(!starts.contains(&blocked.to_string()), "{} must be excluded", blocked);
        }
        for open in ["10:00", "10:30", "13:00", "15:00", "17:00"] {
            assert!(starts.contains(&open.to_string()), "{} must be included", open);
        }
    }

    #[test]
    fn back_to_back_is_not_a_conflict() {
        let date = far_monday();
        let existing = vec![booking_at(date, 14, 60)];
        assert!(!has_conflict(
            &existing,
            date.and_hms_opt(15, 0, 0).unwrap().and_utc(),
            date.and_hms_opt(16, 0, 0).unwrap().and_utc(),
            0,
        ));
        assert!(has_conflict(
            &existing,
            date.and_hms_opt(14, 30, 0).unwrap().and_utc(),
            date.and_hms_opt(15, 30, 0).unwrap().and_utc(),
            0,
        ));
    }

    #[test]
    fn buffer_extends_occupied_tail() {
        let date = far_monday();
        let mut p = policy(BUSINESS_HOURS);
        p.buffer_after_min = 30;
        let existing = vec![booking_at(date, 14, 60)];
        let slots = calculate_slots(&p, date, 60, &existing, &[], None, fixed_now());
        let starts: Vec<String> = slots.iter().map(|s| s.format("%H:%M").to_string()).collect();
        assert!(!starts.contains(&"15:00".to_string()));
        assert!(starts.contains(&"15:30".to_string()));
    }

    #[test]
    fn busy_block_occupies_like_a_booking() {
        let date = far_monday();
        let blocks = vec![BusyBlock::new(
            date.and_hms_opt(10, 0, 0).unwrap().and_utc(),
            date.and_hms_opt(12, 0, 0).unwrap().and_utc(),
            Some("dentist".to_string()),
            Utc::now(),
        )];
        let slots = calculate_slots(
            &policy(BUSINESS_HOURS),
            date,
            60,
            &[],
            &blocks,
            None,
            fixed_now(),
        );
        assert_eq!(slots[0].format("%H:%M").to_string(), "12:00");
    }

    #[test]
    fn unavailable_override_blanks_day() {
        let date = far_monday();
        let mut rule = ScheduleOverride::new(date, Utc::now());
        rule.is_unavailable = true;
        let slots = calculate_slots(
            &policy(BUSINESS_HOURS),
            date,
            60,
            &[],
            &[],
            Some(&rule),
            fixed_now(),
        );
        assert!(slots.is_empty());
    }

    #[test]
    fn override_config_replaces_weekly_windows() {
        let date = far_monday();
        let mut rule = ScheduleOverride::new(date, Utc::now());
        rule.override_config_json =
            Some(r#"{"monday":[{"start":"13:00","end":"15:00"}]}"#.to_string());
        let slots = calculate_slots(
            &policy(BUSINESS_HOURS),
            date,
            60,
            &[],
            &[],
            Some(&rule),
            fixed_now(),
        );
        let starts: Vec<String> = slots.iter().map(|s| s.format("%H:%M").to_string()).collect();
        assert_eq!(starts, vec!["13:00", "13:30", "14:00"]);
    }

    #[test]
    fn lead_time_filters_near_slots() {
        // "now" on the target Monday at 11:45; 30-minute lead hides 12:00.
        let date = far_monday();
        let now = date.and_hms_opt(11, 45, 0).unwrap().and_utc();
        let slots = calculate_slots(&policy(BUSINESS_HOURS), date, 60, &[], &[], None, now);
        assert_eq!(slots[0].format("%H:%M").to_string(), "12:30");
    }

    #[test]
    fn duration_outside_policy_bounds_yields_nothing() {
        let slots = calculate_slots(
            &policy(BUSINESS_HOURS),
            far_monday(),
            180,
            &[],
            &[],
            None,
            fixed_now(),
        );
        assert!(slots.is_empty());
    }
}
