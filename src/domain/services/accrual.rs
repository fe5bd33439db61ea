use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::domain::models::{
    subscription::{is_valid_billing_month, MonthlyCommission},
    waitlist::{normalize_email, WaitlistCommission},
};
use crate::domain::ports::{CommissionRepository, ReferralRepository};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub enum AccrualOutcome {
    Accrued(String),
    /// A commission for this student and month already exists.
    Duplicate,
    NotReferred,
}

/// Turns ledger and billing lifecycle events into commission rows. Every
/// operation is safe to replay with the same input.
pub struct AccrualEngine {
    commission_repo: Arc<dyn CommissionRepository>,
    referral_repo: Arc<dyn ReferralRepository>,
}

impl AccrualEngine {
    pub fn new(commission_repo: Arc<dyn CommissionRepository>, referral_repo: Arc<dyn ReferralRepository>) -> Self {
        Self { commission_repo, referral_repo }
    }

    /// Moves the lead's pending commission to `verified` and starts the fraud
    /// window. Returns whether a commission moved.
    pub async fn on_lead_verified(&self, lead_email: &str, verified_at: DateTime<Utc>) -> Result<bool, AppError> {
        let email = normalize_email(lead_email);
        let payable_date = WaitlistCommission::payable_date_for(verified_at);
        let moved = self.commission_repo.mark_waitlist_verified(&email, verified_at, payable_date).await?;
        if moved > 0 {
            info!(payable_date = %payable_date, "Waitlist commission verified");
        }
        Ok(moved > 0)
    }

    pub async fn on_recurring_payment_succeeded(
        &self,
        student_id: &str,
        billing_month: &str,
        subscription_id: Option<&str>,
    ) -> Result<AccrualOutcome, AppError> {
        if !is_valid_billing_month(billing_month) {
            return Err(AppError::Validation(format!("Invalid billing month: {}", billing_month)));
        }

        let Some(referral) = self.referral_repo.find_by_student(student_id).await? else {
            return Ok(AccrualOutcome::NotReferred);
        };

        // A payment after cancellation means the student resubscribed.
        self.referral_repo.activate(student_id).await?;

        let commission = MonthlyCommission::new(
            referral.ambassador_id.clone(),
            student_id.to_string(),
            billing_month.to_string(),
            subscription_id.map(str::to_string),
        );

        if self.commission_repo.insert_monthly_if_absent(&commission).await? {
            info!(ambassador_id = %referral.ambassador_id, billing_month = %billing_month, "Monthly commission accrued");
            Ok(AccrualOutcome::Accrued(commission.id))
        } else {
            info!(student_id = %student_id, billing_month = %billing_month, "Monthly commission already accrued, skipping");
            Ok(AccrualOutcome::Duplicate)
        }
    }

    /// Cancels the referral only. Monthly commissions already accrued were
    /// earned for months already billed and stay active. A later successful
    /// payment reactivates the referral.
    pub async fn on_subscription_cancelled(&self, student_id: &str) -> Result<bool, AppError> {
        let changed = self.referral_repo.cancel(student_id).await?;
        if changed > 0 {
            info!(student_id = %student_id, "Referral cancelled");
        }
        Ok(changed > 0)
    }

    /// Persists `verified -> payable` for commissions past their fraud window.
    pub async fn mature_commissions(&self, as_of: DateTime<Utc>) -> Result<u64, AppError> {
        let matured = self.commission_repo.mature_waitlist(as_of).await?;
        if matured > 0 {
            info!(matured, "Waitlist commissions became payable");
        }
        Ok(matured)
    }
}
