use crate::domain::models::student::Student;
use crate::domain::ports::StudentRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

pub struct SqliteStudentRepo {
    pool: SqlitePool,
}

impl SqliteStudentRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentRepository for SqliteStudentRepo {
    async fn upsert(&self, contact: &str, name: &str, now: DateTime<Utc>) -> Result<Student, AppError> {
        let fresh = Student::new(contact.to_string(), name.to_string(), now);
        sqlx::query_as::<_, Student>(
            "INSERT INTO students (id, contact, name, bookings_total, bookings_cancelled, debt_cents, created_at)
             VALUES (?, ?, ?, 0, 0, 0, ?)
             ON CONFLICT(contact) DO UPDATE SET name=excluded.name
             RETURNING *",
        )
        .bind(&fresh.id)
        .bind(contact)
        .bind(name)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::Database)
    }

    async fn find_by_contact(&self, contact: &str) -> Result<Option<Student>, AppError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE contact = ?")
            .bind(contact)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn increment_booked(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE students SET bookings_total = bookings_total + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn increment_cancelled(&self, id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE students SET bookings_cancelled = bookings_cancelled + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }

    async fn add_debt(&self, id: &str, cents: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE students SET debt_cents = debt_cents + ? WHERE id = ?")
            .bind(cents)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(())
    }
}
