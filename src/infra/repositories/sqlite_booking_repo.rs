use crate::domain::models::booking::Booking;
use crate::domain::ports::BookingRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const ACTIVE: &str = "('scheduled','confirmed','in_progress')";

pub struct SqliteBookingRepo {
    pool: SqlitePool,
}

impl SqliteBookingRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for SqliteBookingRepo {
    async fn create(&self, booking: &Booking, reservation_keys: &[String]) -> Result<Booking, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let created = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, student_id, student_name, student_contact, start_time, end_time, duration_min, status, \
             calendar_event_id, sync_status, origin_booking_id, reschedule_count, price_cents, note, \
             confirmation_sent, reminder_sent, late_fee_applied, cancelled_at, cancel_reason, management_token, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *",
        )
        .bind(&booking.id)
        .bind(&booking.student_id)
        .bind(&booking.student_name)
        .bind(&booking.student_contact)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.duration_min)
        .bind(booking.status)
        .bind(&booking.calendar_event_id)
        .bind(booking.sync_status)
        .bind(&booking.origin_booking_id)
        .bind(booking.reschedule_count)
        .bind(booking.price_cents)
        .bind(&booking.note)
        .bind(booking.confirmation_sent)
        .bind(booking.reminder_sent)
        .bind(booking.late_fee_applied)
        .bind(booking.cancelled_at)
        .bind(&booking.cancel_reason)
        .bind(&booking.management_token)
        .bind(booking.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(AppError::Database)?;

        for key in reservation_keys {
            sqlx::query("INSERT INTO booking_reservations (slot_key, booking_id) VALUES (?, ?)")
                .bind(key)
                .bind(&booking.id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from_reservation_insert)?;
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(created)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_calendar_event(&self, event_id: &str) -> Result<Option<Booking>, AppError> {
        sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE calendar_event_id = ?")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_active_overlapping(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT * FROM bookings WHERE start_time < ? AND end_time > ? AND status IN {} ORDER BY start_time ASC",
            ACTIVE
        ))
        .bind(end)
        .bind(start)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn count_active_overlap(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM bookings WHERE start_time < ? AND end_time > ? AND status IN {}",
            ACTIVE
        ))
        .bind(end)
        .bind(start)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(count)
    }

    async fn update(&self, booking: &Booking) -> Result<Booking, AppError> {
        sqlx::query_as::<_, Booking>(
            "UPDATE bookings SET start_time=?, end_time=?, duration_min=?, status=?, calendar_event_id=?, sync_status=?, \
             origin_booking_id=?, reschedule_count=?, price_cents=?, note=?, confirmation_sent=?, reminder_sent=?, \
             late_fee_applied=?, cancelled_at=?, cancel_reason=?
             WHERE id=?
             RETURNING *",
        )
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.duration_min)
        .bind(booking.status)
        .bind(&booking.calendar_event_id)
        .bind(booking.sync_status)
        .bind(&booking.origin_booking_id)
        .bind(booking.reschedule_count)
        .bind(booking.price_cents)
        .bind(&booking.note)
        .bind(booking.confirmation_sent)
        .bind(booking.reminder_sent)
        .bind(booking.late_fee_applied)
        .bind(booking.cancelled_at)
        .bind(&booking.cancel_reason)
        .bind(&booking.id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn clear_reservations(&self, booking_id: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM booking_reservations WHERE booking_id = ?")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn replace_reservations(&self, booking_id: &str, keys: &[String]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM booking_reservations WHERE booking_id = ?")
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        for key in keys {
            sqlx::query("INSERT INTO booking_reservations (slot_key, booking_id) VALUES (?, ?)")
                .bind(key)
                .bind(booking_id)
                .execute(&mut *tx)
                .await
                .map_err(AppError::from_reservation_insert)?;
        }
        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn find_pending_sync(&self, after: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT * FROM bookings WHERE sync_status IN ('pending','error') AND status IN {} AND start_time > ?",
            ACTIVE
        ))
        .bind(after)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_reminder_due(&self, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Booking>, AppError> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT * FROM bookings WHERE status IN {} AND reminder_sent = 0 AND start_time >= ? AND start_time < ?",
            ACTIVE
        ))
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_overlapping_active(&self) -> Result<Vec<(String, String)>, AppError> {
        let rows: Vec<(String, String)> = sqlx::query_as(&format!(
            "SELECT a.id, b.id FROM bookings a JOIN bookings b ON a.id < b.id \
             WHERE a.status IN {0} AND b.status IN {0} AND a.start_time < b.end_time AND a.end_time > b.start_time",
            ACTIVE
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(rows)
    }
}
