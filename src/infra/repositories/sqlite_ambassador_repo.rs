use crate::domain::{models::ambassador::{Ambassador, OnboardingStage, PayoutDetails}, ports::AmbassadorRepository};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;
use chrono::Utc;
use serde_json::Value;

pub struct SqliteAmbassadorRepo {
    pool: SqlitePool,
}

impl SqliteAmbassadorRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AmbassadorRepository for SqliteAmbassadorRepo {
    async fn create(&self, a: &Ambassador) -> Result<Ambassador, AppError> {
        sqlx::query_as::<_, Ambassador>(
            "INSERT INTO ambassadors (id, first_name, last_name, email, social_handle, discord_handle, country, referral_code, receipt_prefix, receipt_seq, leads_acquired, total_paid_pence, payout_method, joined_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, 0, ?, ?)
             RETURNING *"
        )
            .bind(&a.id).bind(&a.first_name).bind(&a.last_name).bind(&a.email)
            .bind(&a.social_handle).bind(&a.discord_handle).bind(&a.country)
            .bind(&a.referral_code).bind(&a.receipt_prefix).bind(&a.payout_method).bind(a.joined_at)
            .fetch_one(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Ambassador>, AppError> {
        sqlx::query_as::<_, Ambassador>("SELECT * FROM ambassadors WHERE id = ?").bind(id).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_code(&self, referral_code: &str) -> Result<Option<Ambassador>, AppError> {
        sqlx::query_as::<_, Ambassador>("SELECT * FROM ambassadors WHERE referral_code = ?").bind(referral_code).fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn find_by_login(&self, email: &str, referral_code: &str) -> Result<Option<Ambassador>, AppError> {
        sqlx::query_as::<_, Ambassador>("SELECT * FROM ambassadors WHERE email = ? AND referral_code = ?")
            .bind(email).bind(referral_code)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)
    }

    async fn list(&self) -> Result<Vec<Ambassador>, AppError> {
        sqlx::query_as::<_, Ambassador>("SELECT * FROM ambassadors ORDER BY joined_at ASC").fetch_all(&self.pool).await.map_err(AppError::Database)
    }

    async fn update_payout_details(&self, id: &str, d: &PayoutDetails) -> Result<Ambassador, AppError> {
        sqlx::query_as::<_, Ambassador>(
            "UPDATE ambassadors SET
                payout_method = COALESCE(?, payout_method),
                payout_address = COALESCE(?, payout_address),
                address_line1 = COALESCE(?, address_line1),
                address_line2 = COALESCE(?, address_line2),
                city = COALESCE(?, city),
                postcode = COALESCE(?, postcode),
                country = COALESCE(?, country)
             WHERE id = ?
             RETURNING *"
        )
            .bind(&d.payout_method).bind(&d.payout_address).bind(&d.address_line1).bind(&d.address_line2)
            .bind(&d.city).bind(&d.postcode).bind(&d.country).bind(id)
            .fetch_optional(&self.pool).await.map_err(AppError::Database)?
            .ok_or(AppError::NotFound("Ambassador not found".into()))
    }

    async fn record_onboarding(&self, id: &str, stage: OnboardingStage, document: Option<Value>) -> Result<(), AppError> {
        let now = Utc::now();
        let document = document.map(|d| d.to_string());
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let flag_sql = match stage {
            OnboardingStage::Terms => "UPDATE ambassadors SET accepted_terms = 1, terms_accepted_at = ? WHERE id = ?",
            OnboardingStage::Consent => "UPDATE ambassadors SET accepted_consent = 1, consent_accepted_at = ? WHERE id = ?",
            OnboardingStage::Guide => "UPDATE ambassadors SET accepted_guide = 1, guide_accepted_at = ?, onboarding_completed = 1 WHERE id = ?",
        };
        let updated = sqlx::query(flag_sql).bind(now).bind(id).execute(&mut *tx).await.map_err(AppError::Database)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("Ambassador not found".into()));
        }

        let document_sql = match stage {
            OnboardingStage::Terms => Some(
                "INSERT INTO ambassador_documents (ambassador_id, terms_json, terms_signed_at, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(ambassador_id) DO UPDATE SET terms_json = excluded.terms_json, terms_signed_at = excluded.terms_signed_at, updated_at = excluded.updated_at"
            ),
            OnboardingStage::Consent => Some(
                "INSERT INTO ambassador_documents (ambassador_id, consent_json, consent_signed_at, updated_at) VALUES (?, ?, ?, ?)
                 ON CONFLICT(ambassador_id) DO UPDATE SET consent_json = excluded.consent_json, consent_signed_at = excluded.consent_signed_at, updated_at = excluded.updated_at"
            ),
            OnboardingStage::Guide => None,
        };
        if let Some(sql) = document_sql {
            sqlx::query(sql).bind(id).bind(&document).bind(now).bind(now).execute(&mut *tx).await.map_err(AppError::Database)?;
        }

        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }
}
