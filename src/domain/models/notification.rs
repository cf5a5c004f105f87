use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingConfirmed,
    BookingCancelled,
    BookingRescheduled,
    BookingTimeChanged,
    WaitlistAdded,
    SlotAvailable,
    Reminder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Retrying,
}

impl DeliveryStatus {
    /// Terminal records are never transitioned or re-sent.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Sent | DeliveryStatus::Delivered | DeliveryStatus::Failed
        )
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct NotificationRecord {
    pub id: String,
    pub student_contact: String,
    pub booking_id: Option<String>,
    pub waitlist_id: Option<String>,
    pub kind: NotificationKind,
    pub body: String,
    pub status: DeliveryStatus,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub retry_count: i64,
    pub max_retries: i64,
    pub priority: i64,
    /// sha256 over (kind, recipient, related booking/waitlist id, rendered
    /// body). Used to skip duplicates so re-running reconciliation never
    /// re-fires a message, while a later booking with an identical body
    /// still gets its own record.
    pub context_hash: String,
    pub created_at: DateTime<Utc>,
}

pub struct NewNotification {
    pub student_contact: String,
    pub booking_id: Option<String>,
    pub waitlist_id: Option<String>,
    pub kind: NotificationKind,
    pub body: String,
    pub scheduled_at: DateTime<Utc>,
    pub max_retries: i64,
    pub priority: i64,
}

impl NotificationRecord {
    pub fn new(params: NewNotification, now: DateTime<Utc>) -> Self {
        let related = params.booking_id.as_deref().or(params.waitlist_id.as_deref());
        let context_hash =
            Self::context_hash(&params.kind, &params.student_contact, related, &params.body);
        Self {
            id: Uuid::new_v4().to_string(),
            student_contact: params.student_contact,
            booking_id: params.booking_id,
            waitlist_id: params.waitlist_id,
            kind: params.kind,
            body: params.body,
            status: DeliveryStatus::Pending,
            scheduled_at: params.scheduled_at,
            sent_at: None,
            retry_count: 0,
            max_retries: params.max_retries,
            priority: params.priority,
            context_hash,
            created_at: now,
        }
    }

    pub fn context_hash(
        kind: &NotificationKind,
        recipient: &str,
        related_id: Option<&str>,
        body: &str,
    ) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_string(kind).unwrap_or_default().as_bytes());
        hasher.update(recipient.as_bytes());
        hasher.update(related_id.unwrap_or_default().as_bytes());
        hasher.update(body.as_bytes());
        hex::encode(hasher.finalize())
    }
}
