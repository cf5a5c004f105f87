use crate::config::Config;
use crate::domain::models::notification::NotificationKind;
use crate::domain::models::waitlist::{WaitlistEntry, WaitlistPreference, WaitlistStatus};
use crate::domain::ports::{Clock, ScheduleRepository, WaitlistRepository};
use crate::domain::services::messages;
use crate::domain::services::notification_service::{NotificationService, ScheduleParams};
use crate::error::AppError;
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tracing::{info, warn};

pub struct WaitlistService {
    repo: Arc<dyn WaitlistRepository>,
    schedule_repo: Arc<dyn ScheduleRepository>,
    notifications: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
    max_wait_days: i64,
    match_tolerance: Duration,
    notify_top: usize,
    notification_cap: i64,
}

impl WaitlistService {
    pub fn new(
        repo: Arc<dyn WaitlistRepository>,
        schedule_repo: Arc<dyn ScheduleRepository>,
        notifications: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            repo,
            schedule_repo,
            notifications,
            clock,
            max_wait_days: config.waitlist_max_wait_days,
            match_tolerance: Duration::hours(config.waitlist_match_tolerance_hours),
            notify_top: config.waitlist_notify_top,
            notification_cap: config.waitlist_notification_cap as i64,
        }
    }

    pub async fn enqueue(
        &self,
        student_id: String,
        student_name: String,
        student_contact: String,
        pref: WaitlistPreference,
    ) -> Result<WaitlistEntry, AppError> {
        let now = self.clock.now();
        let position = self.repo.count_open().await? + 1;
        let entry = WaitlistEntry::new(
            student_id,
            student_name,
            student_contact,
            pref,
            position,
            self.max_wait_days,
            now,
        );

        let created = self.repo.create(&entry).await?;
        // A high-priority newcomer may belong further up than the tail.
        self.recompute_positions().await?;

        let current = self.repo.find_by_id(&created.id).await?.unwrap_or(created);
        self.notifications
            .schedule(ScheduleParams {
                kind: NotificationKind::WaitlistAdded,
                recipient: current.student_contact.clone(),
                context: messages::waitlist_context(&current),
                booking_id: None,
                waitlist_id: Some(current.id.clone()),
                priority: 0,
                scheduled_at: None,
            })
            .await?;

        info!("Waitlist entry {} created at position {}", current.id, current.position);
        Ok(current)
    }

    /// Offers a freed window to the best-ranked matching open entries.
    /// Returns the entries that were notified.
    pub async fn match_and_notify(
        &self,
        freed_start: DateTime<Utc>,
        freed_end: DateTime<Utc>,
    ) -> Result<Vec<WaitlistEntry>, AppError> {
        let policy = self.schedule_repo.get_policy().await?;
        let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);
        let duration_min = (freed_end - freed_start).num_minutes();

        // list_open is already ranked priority desc, created_at asc.
        let open = self.repo.list_open().await?;
        let mut notified = Vec::new();

        for mut entry in open {
            if notified.len() >= self.notify_top {
                break;
            }
            if entry.notification_count >= self.notification_cap {
                continue;
            }
            if !Self::matches(&entry, freed_start, freed_end, duration_min, &tz, self.match_tolerance) {
                continue;
            }

            let scheduled = self
                .notifications
                .schedule(ScheduleParams {
                    kind: NotificationKind::SlotAvailable,
                    recipient: entry.student_contact.clone(),
                    context: messages::slot_offer_context(&entry, freed_start, duration_min, &tz),
                    booking_id: None,
                    waitlist_id: Some(entry.id.clone()),
                    priority: 1,
                    scheduled_at: None,
                })
                .await?;
            // Dedup skip: the entry was already offered this exact window.
            if scheduled.is_none() {
                continue;
            }

            entry.status = WaitlistStatus::Notified;
            entry.notification_count += 1;
            let updated = self.repo.update(&entry).await?;
            notified.push(updated);
        }

        if !notified.is_empty() {
            self.recompute_positions().await?;
            info!(
                "Waitlist: {} entr(ies) notified about freed window {}",
                notified.len(),
                freed_start
            );
        }

        Ok(notified)
    }

    fn matches(
        entry: &WaitlistEntry,
        freed_start: DateTime<Utc>,
        freed_end: DateTime<Utc>,
        duration_min: i64,
        tz: &Tz,
        tolerance: Duration,
    ) -> bool {
        let duration_ok = duration_min == entry.duration_min
            || (duration_min < entry.duration_min && entry.accept_shorter)
            || (duration_min > entry.duration_min && entry.accept_longer);
        if !duration_ok {
            return false;
        }

        let local_start = freed_start.with_timezone(tz);

        if let Some(dow) = entry.day_of_week {
            if local_start.weekday().num_days_from_monday() as i64 != dow {
                return false;
            }
        }

        if let (Some(ws), Some(we)) = (&entry.window_start, &entry.window_end) {
            match (
                NaiveTime::parse_from_str(ws, "%H:%M"),
                NaiveTime::parse_from_str(we, "%H:%M"),
            ) {
                (Ok(win_start), Ok(win_end)) => {
                    let local_end = freed_end.with_timezone(tz);
                    if local_start.time() < win_start || local_end.time() > win_end {
                        return false;
                    }
                }
                _ => {
                    warn!("Waitlist entry {} has an unparseable time window", entry.id);
                    return false;
                }
            }
        }

        if let Some(preferred) = entry.preferred_start {
            let distance = (freed_start - preferred).abs();
            if distance > tolerance {
                return false;
            }
        }

        true
    }

    /// Silent transition; no notification is sent for expiry.
    pub async fn expire_stale(&self) -> Result<usize, AppError> {
        let now = self.clock.now();
        let stale = self.repo.list_expired(now).await?;
        let count = stale.len();

        for mut entry in stale {
            entry.status = WaitlistStatus::Expired;
            self.repo.update(&entry).await?;
        }

        if count > 0 {
            self.recompute_positions().await?;
            info!("Expired {} stale waitlist entr(ies)", count);
        }
        Ok(count)
    }

    pub async fn fulfill(&self, id: &str) -> Result<WaitlistEntry, AppError> {
        self.close(id, WaitlistStatus::Fulfilled).await
    }

    pub async fn cancel_entry(&self, id: &str) -> Result<WaitlistEntry, AppError> {
        self.close(id, WaitlistStatus::Cancelled).await
    }

    async fn close(&self, id: &str, status: WaitlistStatus) -> Result<WaitlistEntry, AppError> {
        let mut entry = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Waitlist entry {} not found", id)))?;

        if !entry.status.is_open() {
            return Err(AppError::Conflict(format!(
                "Waitlist entry {} is already terminal",
                id
            )));
        }

        entry.status = status;
        let updated = self.repo.update(&entry).await?;
        self.recompute_positions().await?;
        Ok(updated)
    }

    /// Re-ranks every open entry so positions stay contiguous 1..N in
    /// priority-desc, created-asc order.
    pub async fn recompute_positions(&self) -> Result<(), AppError> {
        let open = self.repo.list_open().await?;
        for (idx, entry) in open.iter().enumerate() {
            let position = (idx + 1) as i64;
            if entry.position != position {
                self.repo.set_position(&entry.id, position).await?;
            }
        }
        Ok(())
    }
}
