use crate::state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, info_span, warn, Instrument};

/// Overlap guard for a periodic loop: a tick arriving while the previous
/// one is still running is skipped, not queued.
pub struct TickGuard {
    name: &'static str,
    busy: AtomicBool,
}

impl TickGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy: AtomicBool::new(false),
        }
    }

    pub fn try_start(&self) -> bool {
        let acquired = self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !acquired {
            warn!("{} tick skipped: previous run still in progress", self.name);
        }
        acquired
    }

    pub fn finish(&self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Delivers due notifications. Short period.
pub async fn tick_dispatch(state: &AppState) {
    if let Err(e) = state.notifications.process_due(50).await {
        error!("Notification dispatch tick failed: {:?}", e);
    }
}

/// Hourly housekeeping: waitlist expiry, lesson reminders, notification
/// retention, calendar-sync recovery.
pub async fn tick_maintenance(state: &AppState) {
    if let Err(e) = state.waitlist.expire_stale().await {
        error!("Waitlist expiry failed: {:?}", e);
    }
    if let Err(e) = schedule_reminders(state).await {
        error!("Reminder scheduling failed: {:?}", e);
    }
    if let Err(e) = state.notifications.sweep_expired().await {
        error!("Notification retention sweep failed: {:?}", e);
    }
    if let Err(e) = state.reconciler.sweep_pending_sync().await {
        error!("Pending-sync sweep failed: {:?}", e);
    }
}

/// One calendar reconciliation pass.
pub async fn tick_reconcile(state: &AppState) {
    if let Err(e) = state.reconciler.run_once().await {
        error!("Reconciliation pass failed: {:?}", e);
    }
}

/// Queues a reminder for every active booking starting inside the lead
/// window that has not been reminded yet.
pub async fn schedule_reminders(state: &AppState) -> Result<usize, crate::error::AppError> {
    use crate::domain::models::notification::NotificationKind;
    use crate::domain::services::messages;
    use crate::domain::services::notification_service::ScheduleParams;
    use chrono_tz::Tz;

    let now = state.clock.now();
    let until = now + chrono::Duration::hours(state.config.reminder_lead_hours);
    let due = state.booking_repo.find_reminder_due(now, until).await?;
    if due.is_empty() {
        return Ok(0);
    }

    let policy = state.schedule_repo.get_policy().await?;
    let tz: Tz = policy.timezone.parse().unwrap_or(chrono_tz::UTC);
    let mut scheduled = 0;

    for mut booking in due {
        state
            .notifications
            .schedule(ScheduleParams {
                kind: NotificationKind::Reminder,
                recipient: booking.student_contact.clone(),
                context: messages::booking_context(&booking, &tz),
                booking_id: Some(booking.id.clone()),
                waitlist_id: None,
                priority: 0,
                scheduled_at: None,
            })
            .await?;
        booking.reminder_sent = true;
        state.booking_repo.update(&booking).await?;
        scheduled += 1;
    }
    Ok(scheduled)
}

async fn run_loop<F, Fut>(
    state: Arc<AppState>,
    name: &'static str,
    period: Duration,
    tick: F,
) where
    F: Fn(Arc<AppState>) -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    let guard = TickGuard::new(name);
    loop {
        if guard.try_start() {
            let span = info_span!("background_tick", loop_name = name);
            tick(state.clone()).instrument(span).await;
            guard.finish();
        }
        sleep(period).await;
    }
}

pub async fn start_background_worker(state: Arc<AppState>) {
    info!("Starting background loops (dispatch/maintenance/reconcile)...");

    let dispatch_period = Duration::from_secs(state.config.dispatch_interval_secs);
    let maintenance_period = Duration::from_secs(state.config.maintenance_interval_secs);
    let reconcile_period = Duration::from_secs(state.config.reconcile_interval_secs);

    let s1 = state.clone();
    tokio::spawn(run_loop(s1, "dispatch", dispatch_period, |s| async move {
        tick_dispatch(&s).await;
    }));

    let s2 = state.clone();
    tokio::spawn(run_loop(s2, "maintenance", maintenance_period, |s| async move {
        tick_maintenance(&s).await;
    }));

    let s3 = state;
    tokio::spawn(run_loop(s3, "reconcile", reconcile_period, |s| async move {
        tick_reconcile(&s).await;
    }));
}
