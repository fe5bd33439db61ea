use crate::domain::{models::subscription::Referral, ports::ReferralRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::PgPool;
use chrono::Utc;

pub struct PostgresReferralRepo {
    pool: PgPool,
}

impl PostgresReferralRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferralRepository for PostgresReferralRepo {
    async fn record(&self, r: &Referral) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let inserted = sqlx::query(
            "INSERT INTO referrals (id, student_user_id, ambassador_id, student_email, status, signup_date, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (student_user_id) DO NOTHING"
        )
            .bind(&r.id).bind(&r.student_user_id).bind(&r.ambassador_id).bind(&r.student_email)
            .bind(&r.status).bind(r.signup_date).bind(r.updated_at)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        if inserted.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query("UPDATE students SET referred_by_ambassador = $1, updated_at = $2 WHERE id = $3 AND referred_by_ambassador IS NULL")
            .bind(&r.ambassador_id).bind(r.updated_at).bind(&r.student_user_id)
            .execute(&mut *tx).await.map_err(AppError::Database)?;
        sqlx::query("UPDATE ambassadors SET leads_acquired = leads_acquired + 1 WHERE id = $1")
            .bind(&r.ambassador_id)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(true)
    }

    async fn find_by_student(&self, student_id: &str) -> Result<Option<Referral>, AppError> {
        sqlx::query_as::<_, Referral>("SELECT * FROM referrals WHERE student_user_id = $1").bind(student_id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn list_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<Referral>, AppError> {
        sqlx::query_as::<_, Referral>("SELECT * FROM referrals WHERE ambassador_id = $1 ORDER BY signup_date DESC")
            .bind(ambassador_id).fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn activate(&self, student_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE referrals SET status = 'active', updated_at = $1 WHERE student_user_id = $2 AND status <> 'active'")
            .bind(Utc::now()).bind(student_id).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }

    async fn cancel(&self, student_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE referrals SET status = 'cancelled', updated_at = $1 WHERE student_user_id = $2 AND status <> 'cancelled'")
            .bind(Utc::now()).bind(student_id).execute(&self.pool).await.map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
