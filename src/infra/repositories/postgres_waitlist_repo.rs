use crate::domain::{models::waitlist::{LeadVerification, WaitlistCommission, WaitlistLead}, ports::WaitlistRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use chrono::{DateTime, Utc};

pub struct PostgresWaitlistRepo {
    pool: PgPool,
}

impl PostgresWaitlistRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitlistRepository for PostgresWaitlistRepo {
    async fn insert_lead(&self, lead: &WaitlistLead, commission: Option<&WaitlistCommission>, cap: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        sqlx::query(
            "INSERT INTO waitlist (id, email, social_handle, ambassador_id, verification_token, verified, verified_at, ip_address, created_at)
             VALUES ($1, $2, $3, NULL, $4, FALSE, NULL, $5, $6)"
        )
            .bind(&lead.id).bind(&lead.email).bind(&lead.social_handle)
            .bind(&lead.verification_token).bind(&lead.ip_address).bind(lead.created_at)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        let mut referred = false;
        if let Some(c) = commission {
            // Row lock on the ambassador serialises competing signups for the cap.
            sqlx::query("SELECT id FROM ambassadors WHERE id = $1 FOR UPDATE")
                .bind(&c.ambassador_id)
                .fetch_optional(&mut *tx).await.map_err(AppError::Database)?;

            let inserted = sqlx::query(
                "INSERT INTO waitlist_commissions (id, ambassador_id, waitlist_email, verified, verified_at, payable_date, status, amount_pence, created_at)
                 SELECT $1, $2, $3, FALSE, NULL, NULL, 'pending', $4, $5
                 WHERE (SELECT COUNT(*) FROM waitlist_commissions WHERE ambassador_id = $2) < $6"
            )
                .bind(&c.id).bind(&c.ambassador_id).bind(&c.waitlist_email).bind(c.amount_pence).bind(c.created_at)
                .bind(cap)
                .execute(&mut *tx).await.map_err(AppError::Database)?;

            if inserted.rows_affected() == 1 {
                sqlx::query("UPDATE waitlist SET ambassador_id = $1 WHERE id = $2")
                    .bind(&c.ambassador_id).bind(&lead.id)
                    .execute(&mut *tx).await.map_err(AppError::Database)?;
                sqlx::query("UPDATE ambassadors SET leads_acquired = leads_acquired + 1 WHERE id = $1")
                    .bind(&c.ambassador_id)
                    .execute(&mut *tx).await.map_err(AppError::Database)?;
                referred = true;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(referred)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<WaitlistLead>, AppError> {
        sqlx::query_as::<_, WaitlistLead>("SELECT * FROM waitlist WHERE email = $1").bind(email).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM waitlist").fetch_one(&self.pool).await.map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn mark_verified(&self, email: &str, token: &str, now: DateTime<Utc>) -> Result<LeadVerification, AppError> {
        // The token is single-use: a successful verification clears it.
        let updated = sqlx::query("UPDATE waitlist SET verified = TRUE, verified_at = $1, verification_token = NULL WHERE email = $2 AND verification_token = $3 AND verified = FALSE")
            .bind(now).bind(email).bind(token)
            .execute(&self.pool).await.map_err(AppError::Database)?;

        if updated.rows_affected() == 1 {
            return Ok(LeadVerification::Verified { verified_at: now });
        }

        let existing = sqlx::query_as::<_, WaitlistLead>("SELECT * FROM waitlist WHERE email = $1 AND verified = TRUE")
            .bind(email)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)?;

        Ok(match existing {
            Some(lead) => LeadVerification::AlreadyVerified { verified_at: lead.verified_at },
            None => LeadVerification::Invalid,
        })
    }
}
