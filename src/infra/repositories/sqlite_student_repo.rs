use crate::domain::{models::subscription::{Student, SubscriptionStatus}, ports::StudentRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;
use chrono::Utc;

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
    async fn upsert_profile(&self, id: &str, email: Option<&str>) -> Result<Student, AppError> {
        let now = Utc::now();
        sqlx::query_as::<_, Student>(
            "INSERT INTO students (id, email, subscription_status, created_at, updated_at)
             VALUES (?, ?, 'trial', ?, ?)
             ON CONFLICT(id) DO UPDATE SET email = COALESCE(excluded.email, students.email), updated_at = excluded.updated_at
             RETURNING *"
        )
            .bind(id).bind(email).bind(now).bind(now)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Student>, AppError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = ?").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_customer_id(&self, customer_id: &str) -> Result<Option<Student>, AppError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE stripe_customer_id = ? LIMIT 1").bind(customer_id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn activate(&self, id: &str, customer_id: Option<&str>, subscription_id: Option<&str>, subscription_type: Option<&str>) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE students SET subscription_status = 'active',
                stripe_customer_id = COALESCE(?, stripe_customer_id),
                stripe_subscription_id = COALESCE(?, stripe_subscription_id),
                subscription_type = COALESCE(?, subscription_type),
                updated_at = ?
             WHERE id = ?"
        )
            .bind(customer_id).bind(subscription_id).bind(subscription_type).bind(Utc::now()).bind(id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Student not found".into()));
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, status: SubscriptionStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE students SET subscription_status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str()).bind(Utc::now()).bind(id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn expire(&self, id: &str, clear_subscription: bool) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE students SET subscription_status = 'expired',
                stripe_subscription_id = CASE WHEN ? THEN NULL ELSE stripe_subscription_id END,
                updated_at = ?
             WHERE id = ?"
        )
            .bind(clear_subscription).bind(Utc::now()).bind(id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT event_id FROM processed_webhook_events WHERE event_id = ?")
            .bind(event_id).fetch_optional(&self.pool).await.map_err(AppError::Database)?;
        Ok(row.is_some())
    }

    async fn record_event(&self, event_id: &str, event_type: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO processed_webhook_events (event_id, event_type, processed_at) VALUES (?, ?, ?)
             ON CONFLICT(event_id) DO NOTHING"
        )
            .bind(event_id).bind(event_type).bind(Utc::now())
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }
}
