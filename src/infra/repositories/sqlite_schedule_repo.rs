use crate::domain::models::schedule::{BusyBlock, SchedulePolicy, ScheduleOverride};
use crate::domain::ports::ScheduleRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;

pub struct SqliteScheduleRepo {
    pool: SqlitePool,
}

impl SqliteScheduleRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScheduleRepository for SqliteScheduleRepo {
    async fn get_policy(&self) -> Result<SchedulePolicy, AppError> {
        sqlx::query_as::<_, SchedulePolicy>("SELECT * FROM schedule_policy LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?
            .ok_or_else(|| AppError::NotFound("Schedule policy not configured".to_string()))
    }

    async fn upsert_policy(&self, policy: &SchedulePolicy) -> Result<SchedulePolicy, AppError> {
        sqlx::query_as::<_, SchedulePolicy>(
            "INSERT INTO schedule_policy (id, timezone, config_json, min_duration_min, max_duration_min, \
             slot_interval_min, buffer_after_min, min_lead_minutes, max_advance_days, hourly_rate_cents, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET timezone=excluded.timezone, config_json=excluded.config_json, \
             min_duration_min=excluded.min_duration_min, max_duration_min=excluded.max_duration_min, \
             slot_interval_min=excluded.slot_interval_min, buffer_after_min=excluded.buffer_after_min, \
             min_lead_minutes=excluded.min_lead_minutes, max_advance_days=excluded.max_advance_days, \
             hourly_rate_cents=excluded.hourly_rate_cents
             RETURNING *",
        )
        .bind(&policy.id)
        .bind(&policy.timezone)
        .bind(&policy.config_json)
        .bind(policy.min_duration_min)
        .bind(policy.max_duration_min)
        .bind(policy.slot_interval_min)
        .bind(policy.buffer_after_min)
        .bind(policy.min_lead_minutes)
        .bind(policy.max_advance_days)
        .bind(policy.hourly_rate_cents)
        .bind(policy.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_override(&self, date: NaiveDate) -> Result<Option<ScheduleOverride>, AppError> {
        sqlx::query_as::<_, ScheduleOverride>("SELECT * FROM schedule_overrides WHERE date = ?")
            .bind(date)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn upsert_override(&self, rule: &ScheduleOverride) -> Result<ScheduleOverride, AppError> {
        sqlx::query_as::<_, ScheduleOverride>(
            "INSERT INTO schedule_overrides (id, date, is_unavailable, override_config_json, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(date) DO UPDATE SET is_unavailable=excluded.is_unavailable, \
             override_config_json=excluded.override_config_json
             RETURNING *",
        )
        .bind(&rule.id)
        .bind(rule.date)
        .bind(rule.is_unavailable)
        .bind(&rule.override_config_json)
        .bind(rule.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn create_busy_block(&self, block: &BusyBlock) -> Result<BusyBlock, AppError> {
        sqlx::query_as::<_, BusyBlock>(
            "INSERT INTO busy_blocks (id, start_time, end_time, reason, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&block.id)
        .bind(block.start_time)
        .bind(block.end_time)
        .bind(&block.reason)
        .bind(block.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn list_busy_blocks(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<BusyBlock>, AppError> {
        sqlx::query_as::<_, BusyBlock>(
            "SELECT * FROM busy_blocks WHERE start_time < ? AND end_time > ? ORDER BY start_time ASC",
        )
        .bind(end)
        .bind(start)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn delete_busy_block(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM busy_blocks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Busy block not found".to_string()));
        }
        Ok(())
    }
}
