use crate::domain::{models::subscription::{Student, SubscriptionStatus}, ports::StudentRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;

pub struct PostgresStudentRepo {
    pool: PgPool,
}

impl PostgresStudentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StudentRepository for PostgresStudentRepo {
    async fn upsert_profile(&self, id: &str, email: Option<&str>) -> Result<Student, AppError> {
        let now = Utc::now();
        sqlx::query_as::<_, Student>(
            "INSERT INTO students (id, email, subscription_status, created_at, updated_at)
             VALUES ($1, $2, 'trial', $3, $4)
             ON CONFLICT (id) DO UPDATE SET email = COALESCE(EXCLUDED.email, students.email), updated_at = EXCLUDED.updated_at
             RETURNING *"
        )
            .bind(id).bind(email).bind(now).bind(now)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Student>, AppError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_customer_id(&self, customer_id: &str) -> Result<Option<Student>, AppError> {
        sqlx::query_as::<_, Student>("SELECT * FROM students WHERE stripe_customer_id = $1 LIMIT 1").bind(customer_id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn activate(&self, id: &str, customer_id: Option<&str>, subscription_id: Option<&str>, subscription_type: Option<&str>) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE students SET subscription_status = 'active',
                stripe_customer_id = COALESCE($1, stripe_customer_id),
                stripe_subscription_id = COALESCE($2, stripe_subscription_id),
                subscription_type = COALESCE($3, subscription_type),
                updated_at = $4
             WHERE id = $5"
        )
            .bind(customer_id).bind(subscription_id).bind(subscription_type).bind(Utc::now()).bind(id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Student not found".into()));
        }
        Ok(())
    }

    async fn set_status(&self, id: &str, status: SubscriptionStatus) -> Result<(), AppError> {
        sqlx::query("UPDATE students SET subscription_status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str()).bind(Utc::now()).bind(id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn expire(&self, id: &str, clear_subscription: bool) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE students SET subscription_status = 'expired',
                stripe_subscription_id = CASE WHEN $1 THEN NULL ELSE stripe_subscription_id END,
                updated_at = $2
             WHERE id = $3"
        )
            .bind(clear_subscription).bind(Utc::now()).bind(id)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn is_event_processed(&self, event_id: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT event_id FROM processed_webhook_events WHERE event_id = $1")
            .bind(event_id).fetch_optional(&self.pool).await.map_err(AppError::Database)?;
        Ok(row.is_some())
    }

    async fn record_event(&self, event_id: &str, event_type: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO processed_webhook_events (event_id, event_type, processed_at) VALUES ($1, $2, $3)
             ON CONFLICT (event_id) DO NOTHING"
        )
            .bind(event_id).bind(event_type).bind(Utc::now())
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }
}
