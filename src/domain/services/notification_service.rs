use crate::config::Config;
use crate::domain::models::notification::{
    DeliveryStatus, NewNotification, NotificationKind, NotificationRecord,
};
use crate::domain::ports::{Clock, NotificationRepository, NotifierPort};
use crate::domain::services::messages;
use crate::error::AppError;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tera::Tera;
use tracing::{debug, error, info, warn};

/// Parameters for scheduling one outbound message.
pub struct ScheduleParams {
    pub kind: NotificationKind,
    pub recipient: String,
    pub context: tera::Context,
    pub booking_id: Option<String>,
    pub waitlist_id: Option<String>,
    pub priority: i64,
    pub scheduled_at: Option<DateTime<Utc>>,
}

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    notifier: Arc<dyn NotifierPort>,
    clock: Arc<dyn Clock>,
    templates: Arc<Tera>,
    max_retries: i64,
    retry_minutes: i64,
    retention_days: i64,
    send_timeout: StdDuration,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        notifier: Arc<dyn NotifierPort>,
        clock: Arc<dyn Clock>,
        templates: Arc<Tera>,
        config: &Config,
    ) -> Self {
        Self {
            repo,
            notifier,
            clock,
            templates,
            max_retries: config.notification_max_retries as i64,
            retry_minutes: config.notification_retry_minutes,
            retention_days: config.notification_retention_days,
            send_timeout: StdDuration::from_secs(config.port_timeout_secs),
        }
    }

    /// Renders the message and persists a pending record. A record whose
    /// context hash already exists is skipped, which is what makes the
    /// callers (reconciliation in particular) idempotent. The hash is
    /// scoped to the related booking/waitlist entry, so a later booking
    /// that renders an identical body is not suppressed.
    pub async fn schedule(&self, params: ScheduleParams) -> Result<Option<NotificationRecord>, AppError> {
        let body = self
            .templates
            .render(messages::template_name(&params.kind), &params.context)
            .map_err(|e| AppError::Internal(format!("Template render error: {:?}", e)))?;

        let related = params.booking_id.as_deref().or(params.waitlist_id.as_deref());
        let hash = NotificationRecord::context_hash(&params.kind, &params.recipient, related, &body);
        if self.repo.exists_with_hash(&hash).await? {
            debug!("Notification skipped (duplicate context) for {}", params.recipient);
            return Ok(None);
        }

        let now = self.clock.now();
        let record = NotificationRecord::new(
            NewNotification {
                student_contact: params.recipient,
                booking_id: params.booking_id,
                waitlist_id: params.waitlist_id,
                kind: params.kind,
                body,
                scheduled_at: params.scheduled_at.unwrap_or(now),
                max_retries: self.max_retries,
                priority: params.priority,
            },
            now,
        );

        let created = self.repo.create(&record).await?;
        Ok(Some(created))
    }

    /// Delivers all due pending/retrying records, priority first. Failures
    /// are pushed forward by a fixed delay until retries are exhausted.
    pub async fn process_due(&self, limit: i64) -> Result<usize, AppError> {
        let now = self.clock.now();
        let due = self.repo.find_due(now, limit).await?;
        let mut delivered = 0;

        for mut record in due {
            if record.status.is_terminal() {
                continue;
            }

            let attempt = tokio::time::timeout(
                self.send_timeout,
                self.notifier.send(&record.student_contact, &record.body),
            )
            .await
            .unwrap_or_else(|_| Err(AppError::Notifier("Send timed out".to_string())));

            match attempt {
                Ok(()) => {
                    record.status = DeliveryStatus::Sent;
                    record.sent_at = Some(self.clock.now());
                    self.repo.update(&record).await?;
                    delivered += 1;
                    info!("Notification {} sent to {}", record.id, record.student_contact);
                }
                Err(e) => {
                    record.retry_count += 1;
                    if record.retry_count < record.max_retries {
                        record.status = DeliveryStatus::Retrying;
                        record.scheduled_at = self.clock.now() + Duration::minutes(self.retry_minutes);
                        warn!(
                            "Notification {} failed (attempt {}): {}. Retrying at {}",
                            record.id, record.retry_count, e, record.scheduled_at
                        );
                    } else {
                        record.status = DeliveryStatus::Failed;
                        error!(
                            "Notification {} failed permanently after {} retries: {}",
                            record.id, record.retry_count, e
                        );
                    }
                    self.repo.update(&record).await?;
                }
            }
        }

        Ok(delivered)
    }

    /// Deletes terminal records older than the retention window.
    pub async fn sweep_expired(&self) -> Result<u64, AppError> {
        let cutoff = self.clock.now() - Duration::days(self.retention_days);
        let removed = self.repo.delete_terminal_before(cutoff).await?;
        if removed > 0 {
            info!("Purged {} notification records past retention", removed);
        }
        Ok(removed)
    }
}
