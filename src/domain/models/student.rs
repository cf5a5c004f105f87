use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A requester. Keyed by contact handle (the notifier recipient ref);
/// carries booking counters and the accrued late-cancellation debt.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Student {
    pub id: String,
    pub contact: String,
    pub name: String,
    pub bookings_total: i64,
    pub bookings_cancelled: i64,
    pub debt_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl Student {
    pub fn new(contact: String, name: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            contact,
            name,
            bookings_total: 0,
            bookings_cancelled: 0,
            debt_cents: 0,
            created_at: now,
        }
    }
}
