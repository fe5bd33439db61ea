use crate::domain::{models::waitlist::{LeadVerification, WaitlistCommission, WaitlistLead}, ports::WaitlistRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::{SqlitePool, Row};
use chrono::{DateTime, Utc};

pub struct SqliteWaitlistRepo {
    pool: SqlitePool,
}

impl SqliteWaitlistRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitlistRepository for SqliteWaitlistRepo {
    async fn insert_lead(&self, lead: &WaitlistLead, commission: Option<&WaitlistCommission>, cap: i64) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        sqlx::query(
            "INSERT INTO waitlist (id, email, social_handle, ambassador_id, verification_token, verified, verified_at, ip_address, created_at)
             VALUES (?, ?, ?, NULL, ?, 0, NULL, ?, ?)"
        )
            .bind(&lead.id).bind(&lead.email).bind(&lead.social_handle)
            .bind(&lead.verification_token).bind(&lead.ip_address).bind(lead.created_at)
            .execute(&mut *tx).await.map_err(AppError::Database)?;

        let mut referred = false;
        if let Some(c) = commission {
            // The cap check and the insert are one statement; the write lock
            // taken by the lead insert above serialises competing signups.
            let inserted = sqlx::query(
                "INSERT INTO waitlist_commissions (id, ambassador_id, waitlist_email, verified, verified_at, payable_date, status, amount_pence, created_at)
                 SELECT ?, ?, ?, 0, NULL, NULL, 'pending', ?, ?
                 WHERE (SELECT COUNT(*) FROM waitlist_commissions WHERE ambassador_id = ?) < ?"
            )
                .bind(&c.id).bind(&c.ambassador_id).bind(&c.waitlist_email).bind(c.amount_pence).bind(c.created_at)
                .bind(&c.ambassador_id).bind(cap)
                .execute(&mut *tx).await.map_err(AppError::Database)?;

            if inserted.rows_affected() == 1 {
                sqlx::query("UPDATE waitlist SET ambassador_id = ? WHERE id = ?")
                    .bind(&c.ambassador_id).bind(&lead.id)
                    .execute(&mut *tx).await.map_err(AppError::Database)?;
                sqlx::query("UPDATE ambassadors SET leads_acquired = leads_acquired + 1 WHERE id = ?")
                    .bind(&c.ambassador_id)
                    .execute(&mut *tx).await.map_err(AppError::Database)?;
                referred = true;
            }
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(referred)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<WaitlistLead>, AppError> {
        sqlx::query_as::<_, WaitlistLead>("SELECT * FROM waitlist WHERE email = ?").bind(email).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn count(&self) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM waitlist").fetch_one(&self.pool).await.map_err(AppError::Database)?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn mark_verified(&self, email: &str, token: &str, now: DateTime<Utc>) -> Result<LeadVerification, AppError> {
        // The token is single-use: a successful verification clears it.
        let updated = sqlx::query("UPDATE waitlist SET verified = 1, verified_at = ?, verification_token = NULL WHERE email = ? AND verification_token = ? AND verified = 0")
            .bind(now).bind(email).bind(token)
            .execute(&self.pool).await.map_err(AppError::Database)?;

        if updated.rows_affected() == 1 {
            return Ok(LeadVerification::Verified { verified_at: now });
        }

        let existing = sqlx::query_as::<_, WaitlistLead>("SELECT * FROM waitlist WHERE email = ? AND verified = 1")
            .bind(email)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)?;

        Ok(match existing {
            Some(lead) => LeadVerification::AlreadyVerified { verified_at: lead.verified_at },
            None => LeadVerification::Invalid,
        })
    }
}
