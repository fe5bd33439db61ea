use crate::domain::{models::{subscription::MonthlyCommission, waitlist::WaitlistCommission}, ports::CommissionRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;
use chrono::{DateTime, Utc};

pub struct PostgresCommissionRepo {
    pool: PgPool,
}

impl PostgresCommissionRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CommissionRepository for PostgresCommissionRepo {
    async fn list_waitlist_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<WaitlistCommission>, AppError> {
        sqlx::query_as::<_, WaitlistCommission>("SELECT * FROM waitlist_commissions WHERE ambassador_id = $1 ORDER BY created_at ASC")
            .bind(ambassador_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn mark_waitlist_verified(&self, waitlist_email: &str, verified_at: DateTime<Utc>, payable_date: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE waitlist_commissions SET verified = TRUE, verified_at = $1, payable_date = $2, status = 'verified'
             WHERE waitlist_email = $3 AND status = 'pending'"
        )
            .bind(verified_at).bind(payable_date).bind(waitlist_email)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn mature_waitlist(&self, as_of: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE waitlist_commissions SET status = 'payable' WHERE status = 'verified' AND payable_date <= $1")
            .bind(as_of).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn insert_monthly_if_absent(&self, c: &MonthlyCommission) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO monthly_commissions (id, ambassador_id, student_id, billing_month, is_active, amount_pence, subscription_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (student_id, billing_month) DO NOTHING"
        )
            .bind(&c.id).bind(&c.ambassador_id).bind(&c.student_id).bind(&c.billing_month)
            .bind(c.is_active).bind(c.amount_pence).bind(&c.subscription_id).bind(c.created_at)
            .execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_monthly_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<MonthlyCommission>, AppError> {
        sqlx::query_as::<_, MonthlyCommission>("SELECT * FROM monthly_commissions WHERE ambassador_id = $1 ORDER BY billing_month ASC, created_at ASC")
            .bind(ambassador_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }
}
