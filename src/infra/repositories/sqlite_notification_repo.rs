use crate::domain::models::notification::NotificationRecord;
use crate::domain::ports::NotificationRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteNotificationRepo {
    pool: SqlitePool,
}

impl SqliteNotificationRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for SqliteNotificationRepo {
    async fn create(&self, record: &NotificationRecord) -> Result<NotificationRecord, AppError> {
        sqlx::query_as::<_, NotificationRecord>(
            "INSERT INTO notifications (id, student_contact, booking_id, waitlist_id, kind, body, status, \
             scheduled_at, sent_at, retry_count, max_retries, priority, context_hash, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&record.id)
        .bind(&record.student_contact)
        .bind(&record.booking_id)
        .bind(&record.waitlist_id)
        .bind(record.kind)
        .bind(&record.body)
        .bind(record.status)
        .bind(record.scheduled_at)
        .bind(record.sent_at)
        .bind(record.retry_count)
        .bind(record.max_retries)
        .bind(record.priority)
        .bind(&record.context_hash)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<NotificationRecord>, AppError> {
        sqlx::query_as::<_, NotificationRecord>(
            "SELECT * FROM notifications WHERE status IN ('pending','retrying') AND scheduled_at <= ? \
             ORDER BY priority DESC, scheduled_at ASC LIMIT ?",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn update(&self, record: &NotificationRecord) -> Result<NotificationRecord, AppError> {
        sqlx::query_as::<_, NotificationRecord>(
            "UPDATE notifications SET status=?, scheduled_at=?, sent_at=?, retry_count=?
             WHERE id=?
             RETURNING *",
        )
        .bind(record.status)
        .bind(record.scheduled_at)
        .bind(record.sent_at)
        .bind(record.retry_count)
        .bind(&record.id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn exists_with_hash(&self, context_hash: &str) -> Result<bool, AppError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE context_hash = ?")
                .bind(context_hash)
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::Database)?;
        Ok(count > 0)
    }

    async fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "DELETE FROM notifications WHERE status IN ('sent','delivered','failed') AND created_at < ?",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn list_for_booking(&self, booking_id: &str) -> Result<Vec<NotificationRecord>, AppError> {
        sqlx::query_as::<_, NotificationRecord>(
            "SELECT * FROM notifications WHERE booking_id = ? ORDER BY created_at ASC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }
}
