use crate::config::Config;
use crate::domain::models::booking::{
    Booking, BookingStatus, CancelActor, NewBookingParams, SyncStatus,
};
use crate::domain::models::notification::NotificationKind;
use crate::domain::ports::{
    BookingRepository, CalendarEvent, CalendarEventDetails, CalendarPort, Clock,
    ScheduleRepository, StudentRepository,
};
use crate::domain::services::messages;
use crate::domain::services::notification_service::{NotificationService, ScheduleParams};
use crate::domain::services::slots::{calculate_slots, has_conflict};
use crate::domain::services::waitlist_service::WaitlistService;
use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::{info, warn};

const MAX_RESCHEDULES: i64 = 3;

pub struct BookRequest {
    pub start: DateTime<Utc>,
    pub duration_min: i64,
    pub student_name: String,
    pub student_contact: String,
    pub note: Option<String>,
}

pub struct BookingService {
    booking_repo: Arc<dyn BookingRepository>,
    student_repo: Arc<dyn StudentRepository>,
    schedule_repo: Arc<dyn ScheduleRepository>,
    calendar: Arc<dyn CalendarPort>,
    notifications: Arc<NotificationService>,
    waitlist: Arc<WaitlistService>,
    clock: Arc<dyn Clock>,
    late_cancel_hours: i64,
    port_timeout: StdDuration,
}

impl BookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        booking_repo: Arc<dyn BookingRepository>,
        student_repo: Arc<dyn StudentRepository>,
        schedule_repo: Arc<dyn ScheduleRepository>,
        calendar: Arc<dyn CalendarPort>,
        notifications: Arc<NotificationService>,
        waitlist: Arc<WaitlistService>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self {
            booking_repo,
            student_repo,
            schedule_repo,
            calendar,
            notifications,
            waitlist,
            clock,
            late_cancel_hours: config.late_cancel_hours,
            port_timeout: StdDuration::from_secs(config.port_timeout_secs),
        }
    }

    /// Books a slot. The requested start must be one of the currently valid
    /// candidates for its date; the reservation-key insert then guarantees
    /// that of two racing requests for overlapping windows exactly one wins,
    /// the other getting `SlotUnavailable`.
    pub async fn book(&self, request: BookRequest) -> Result<Booking, AppError> {
        let now = self.clock.now();
        let policy = self.schedule_repo.get_policy().await?;
        let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);

        let end = request.start + Duration::minutes(request.duration_min);
        let date = request.start.with_timezone(&tz).date_naive();

        let day_start = request.start - Duration::hours(36);
        let day_end = end + Duration::hours(36);
        let existing = self
            .booking_repo
            .list_active_overlapping(day_start, day_end)
            .await?;
        let busy = self.schedule_repo.list_busy_blocks(day_start, day_end).await?;
        let override_rule = self.schedule_repo.find_override(date).await?;

        let valid = calculate_slots(
            &policy,
            date,
            request.duration_min,
            &existing,
            &busy,
            override_rule.as_ref(),
            now,
        );
        if !valid.contains(&request.start) {
            return Err(AppError::SlotUnavailable);
        }

        // Commit-time recheck; listing may be stale by now.
        if has_conflict(&existing, request.start, end, policy.buffer_after_min)
            || self.booking_repo.count_active_overlap(request.start, end).await? > 0
        {
            return Err(AppError::SlotUnavailable);
        }

        let student = self
            .student_repo
            .upsert(&request.student_contact, &request.student_name, now)
            .await?;

        let booking = Booking::new(NewBookingParams {
            student_id: student.id.clone(),
            student_name: request.student_name,
            student_contact: request.student_contact,
            start: request.start,
            duration_min: request.duration_min,
            price_cents: policy.price_for(request.duration_min),
            note: request.note,
            created_at: now,
        });
        let keys = Booking::reservation_keys(booking.start_time, booking.end_time);

        let mut created = self.booking_repo.create(&booking, &keys).await?;
        self.student_repo.increment_booked(&student.id).await?;
        info!("Booking {} created for {}", created.id, created.student_contact);

        created = self.sync_calendar_event(created).await?;

        self.notifications
            .schedule(ScheduleParams {
                kind: NotificationKind::BookingConfirmed,
                recipient: created.student_contact.clone(),
                context: messages::booking_context(&created, &tz),
                booking_id: Some(created.id.clone()),
                waitlist_id: None,
                priority: 1,
                scheduled_at: None,
            })
            .await?;
        created.confirmation_sent = true;
        let created = self.booking_repo.update(&created).await?;

        Ok(created)
    }

    /// Attempts calendar-event creation. Failure is not fatal to the
    /// booking; the reconciler's pending-sync sweep retries later.
    async fn sync_calendar_event(&self, mut booking: Booking) -> Result<Booking, AppError> {
        let details = Self::event_details(&booking);
        let attempt = tokio::time::timeout(self.port_timeout, self.calendar.create_event(&details))
            .await
            .unwrap_or_else(|_| Err(AppError::Calendar("Calendar call timed out".to_string())));

        match attempt {
            Ok(event_id) => {
                booking.calendar_event_id = Some(event_id);
                booking.sync_status = SyncStatus::Synced;
            }
            Err(e) => {
                warn!("Calendar event creation failed for booking {}: {}", booking.id, e);
                booking.sync_status = SyncStatus::Error;
            }
        }
        self.booking_repo.update(&booking).await
    }

    fn event_details(booking: &Booking) -> CalendarEventDetails {
        CalendarEventDetails {
            booking_id: booking.id.clone(),
            start_time: booking.start_time,
            end_time: booking.end_time,
            summary: format!("Lesson: {}", booking.student_name),
            description: booking.note.clone(),
        }
    }

    pub async fn cancel(
        &self,
        id: &str,
        actor: CancelActor,
        reason: Option<String>,
    ) -> Result<Booking, AppError> {
        let booking = self.require(id).await?;
        let cancelled = self
            .cancel_inner(booking, actor, reason, true, NotificationKind::BookingCancelled)
            .await?;

        // The freed window goes back on the market.
        self.waitlist
            .match_and_notify(cancelled.start_time, cancelled.end_time)
            .await?;

        Ok(cancelled)
    }

    async fn cancel_inner(
        &self,
        mut booking: Booking,
        actor: CancelActor,
        reason: Option<String>,
        apply_late_fee: bool,
        notify_kind: NotificationKind,
    ) -> Result<Booking, AppError> {
        if !matches!(
            booking.status,
            BookingStatus::Scheduled | BookingStatus::Confirmed
        ) {
            return Err(AppError::Conflict(format!(
                "Booking {} cannot be cancelled in its current state",
                booking.id
            )));
        }

        let now = self.clock.now();
        booking.status = match actor {
            CancelActor::Student => BookingStatus::CancelledByStudent,
            CancelActor::Teacher => BookingStatus::CancelledByTeacher,
        };
        booking.cancelled_at = Some(now);
        booking.cancel_reason = reason;

        if apply_late_fee
            && actor == CancelActor::Student
            && booking.start_time - now < Duration::hours(self.late_cancel_hours)
        {
            booking.late_fee_applied = true;
            self.student_repo
                .add_debt(&booking.student_id, booking.price_cents)
                .await?;
        }

        let cancelled = self.booking_repo.update(&booking).await?;
        self.booking_repo.clear_reservations(&cancelled.id).await?;
        self.student_repo.increment_cancelled(&cancelled.student_id).await?;

        if let Some(event_id) = cancelled.calendar_event_id.clone() {
            let attempt = tokio::time::timeout(self.port_timeout, self.calendar.delete_event(&event_id))
                .await
                .unwrap_or_else(|_| Err(AppError::Calendar("Calendar call timed out".to_string())));
            if let Err(e) = attempt {
                warn!("Calendar event {} deletion failed: {}", event_id, e);
            }
        }

        let policy = self.schedule_repo.get_policy().await?;
        let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);
        self.notifications
            .schedule(ScheduleParams {
                kind: notify_kind,
                recipient: cancelled.student_contact.clone(),
                context: messages::booking_context(&cancelled, &tz),
                booking_id: Some(cancelled.id.clone()),
                waitlist_id: None,
                priority: 1,
                scheduled_at: None,
            })
            .await?;

        info!("Booking {} cancelled ({:?})", cancelled.id, actor);
        Ok(cancelled)
    }

    /// Books a replacement lesson linked to the original and cancels the
    /// original. Rejected once the lineage has been moved three times.
    pub async fn reschedule(&self, id: &str, new_start: DateTime<Utc>) -> Result<Booking, AppError> {
        let original = self.require(id).await?;

        if !matches!(
            original.status,
            BookingStatus::Scheduled | BookingStatus::Confirmed
        ) {
            return Err(AppError::Conflict(format!(
                "Booking {} cannot be rescheduled in its current state",
                original.id
            )));
        }
        if original.reschedule_count >= MAX_RESCHEDULES {
            return Err(AppError::Validation(format!(
                "Booking {} has reached the reschedule limit",
                original.id
            )));
        }

        let mut replacement = self
            .book(BookRequest {
                start: new_start,
                duration_min: original.duration_min,
                student_name: original.student_name.clone(),
                student_contact: original.student_contact.clone(),
                note: original.note.clone(),
            })
            .await?;

        replacement.origin_booking_id = Some(
            original
                .origin_booking_id
                .clone()
                .unwrap_or_else(|| original.id.clone()),
        );
        replacement.reschedule_count = original.reschedule_count + 1;
        let replacement = self.booking_repo.update(&replacement).await?;

        // No late fee on a reschedule; the slot is traded, not dropped.
        let freed = self
            .cancel_inner(
                original,
                CancelActor::Student,
                Some("rescheduled".to_string()),
                false,
                NotificationKind::BookingRescheduled,
            )
            .await?;
        self.waitlist
            .match_and_notify(freed.start_time, freed.end_time)
            .await?;

        Ok(replacement)
    }

    pub async fn confirm(&self, id: &str) -> Result<Booking, AppError> {
        self.transition(id, &[BookingStatus::Scheduled], BookingStatus::Confirmed)
            .await
    }

    pub async fn complete(&self, id: &str) -> Result<Booking, AppError> {
        self.transition(
            id,
            &[BookingStatus::Confirmed, BookingStatus::InProgress],
            BookingStatus::Completed,
        )
        .await
    }

    pub async fn mark_no_show(&self, id: &str) -> Result<Booking, AppError> {
        self.transition(
            id,
            &[BookingStatus::Scheduled, BookingStatus::Confirmed],
            BookingStatus::NoShow,
        )
        .await
    }

    async fn transition(
        &self,
        id: &str,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Booking, AppError> {
        let mut booking = self.require(id).await?;
        if !from.contains(&booking.status) {
            return Err(AppError::Conflict(format!(
                "Booking {} cannot move to {:?} from {:?}",
                id, to, booking.status
            )));
        }
        booking.status = to;
        if !to.is_active() {
            self.booking_repo.clear_reservations(id).await?;
        }
        self.booking_repo.update(&booking).await
    }

    /// Applies an out-of-band change observed in the external calendar.
    /// Safe to call repeatedly with the same event: an already-applied
    /// change is a no-op.
    pub async fn apply_external_change(&self, event: &CalendarEvent) -> Result<(), AppError> {
        let booking = match &event.booking_id {
            Some(id) => self.booking_repo.find_by_id(id).await?,
            None => self.booking_repo.find_by_calendar_event(&event.id).await?,
        };
        let booking = match booking {
            Some(b) => b,
            // Not a lesson created by this system.
            None => return Ok(()),
        };

        if event.cancelled {
            if !booking.status.is_active() {
                return Ok(());
            }
            let freed = self
                .cancel_external(booking)
                .await?;
            self.waitlist
                .match_and_notify(freed.start_time, freed.end_time)
                .await?;
            return Ok(());
        }

        if booking.status.is_active()
            && (event.start_time != booking.start_time || event.end_time != booking.end_time)
        {
            self.apply_time_change(booking, event.start_time, event.end_time).await?;
        }

        Ok(())
    }

    /// Cancellation initiated outside this system: the calendar event is
    /// already gone, so only local state and the student notification move.
    /// Unlike a domain cancel this applies from any active status.
    async fn cancel_external(&self, mut booking: Booking) -> Result<Booking, AppError> {
        let now = self.clock.now();
        booking.status = BookingStatus::CancelledByTeacher;
        booking.cancelled_at = Some(now);
        booking.cancel_reason = Some("cancelled in external calendar".to_string());
        booking.calendar_event_id = None;

        let cancelled = self.booking_repo.update(&booking).await?;
        self.booking_repo.clear_reservations(&cancelled.id).await?;
        self.student_repo.increment_cancelled(&cancelled.student_id).await?;

        let policy = self.schedule_repo.get_policy().await?;
        let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);
        self.notifications
            .schedule(ScheduleParams {
                kind: NotificationKind::BookingCancelled,
                recipient: cancelled.student_contact.clone(),
                context: messages::booking_context(&cancelled, &tz),
                booking_id: Some(cancelled.id.clone()),
                waitlist_id: None,
                priority: 1,
                scheduled_at: None,
            })
            .await?;

        info!("Booking {} cancelled by external calendar change", cancelled.id);
        Ok(cancelled)
    }

    async fn apply_time_change(
        &self,
        mut booking: Booking,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<(), AppError> {
        info!(
            "Booking {} moved externally: {} -> {}",
            booking.id, booking.start_time, new_start
        );

        booking.start_time = new_start;
        booking.end_time = new_end;
        booking.duration_min = (new_end - new_start).num_minutes();

        let keys = Booking::reservation_keys(new_start, new_end);
        self.booking_repo.replace_reservations(&booking.id, &keys).await?;
        let updated = self.booking_repo.update(&booking).await?;

        let policy = self.schedule_repo.get_policy().await?;
        let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);
        self.notifications
            .schedule(ScheduleParams {
                kind: NotificationKind::BookingTimeChanged,
                recipient: updated.student_contact.clone(),
                context: messages::booking_context(&updated, &tz),
                booking_id: Some(updated.id.clone()),
                waitlist_id: None,
                priority: 1,
                scheduled_at: None,
            })
            .await?;
        Ok(())
    }

    /// Retries calendar-event creation for bookings whose sync failed or
    /// never ran. Recovery path for calendar outages at booking time.
    pub async fn sweep_pending_sync(&self) -> Result<usize, AppError> {
        let now = self.clock.now();
        let pending = self.booking_repo.find_pending_sync(now).await?;
        let mut synced = 0;

        for booking in pending {
            let id = booking.id.clone();
            match self.sync_calendar_event(booking).await {
                Ok(updated) if updated.sync_status == SyncStatus::Synced => synced += 1,
                Ok(_) => {}
                Err(e) => warn!("Pending-sync retry failed for booking {}: {}", id, e),
            }
        }

        if synced > 0 {
            info!("Pending-sync sweep created {} calendar event(s)", synced);
        }
        Ok(synced)
    }

    async fn require(&self, id: &str) -> Result<Booking, AppError> {
        self.booking_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }
}
