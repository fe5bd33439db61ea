use std::sync::Arc;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::info;

use crate::domain::models::payout::{PaymentReceipt, PayoutStatement};
use crate::domain::ports::{AmbassadorRepository, CommissionRepository, ReceiptRepository};
use crate::domain::services::payout::{build_statement, qualifying_waitlist};
use crate::error::AppError;

#[derive(Debug)]
pub struct IssuedReceipt {
    pub receipt: PaymentReceipt,
    pub statement: PayoutStatement,
    pub settled_commissions: usize,
}

/// Settlement cut-off for a payment date: the end of that day, but never
/// later than `now`, so a future-dated receipt cannot pay commissions that
/// are still inside their fraud window.
pub fn settlement_cutoff(payment_date: NaiveDate, now: DateTime<Utc>) -> DateTime<Utc> {
    let end_of_day = payment_date
        .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
        .and_utc();
    end_of_day.min(now)
}

pub struct ReceiptIssuer {
    ambassador_repo: Arc<dyn AmbassadorRepository>,
    commission_repo: Arc<dyn CommissionRepository>,
    receipt_repo: Arc<dyn ReceiptRepository>,
}

impl ReceiptIssuer {
    pub fn new(
        ambassador_repo: Arc<dyn AmbassadorRepository>,
        commission_repo: Arc<dyn CommissionRepository>,
        receipt_repo: Arc<dyn ReceiptRepository>,
    ) -> Self {
        Self { ambassador_repo, commission_repo, receipt_repo }
    }

    pub async fn issue_receipt(&self, ambassador_id: &str, payment_date: NaiveDate) -> Result<IssuedReceipt, AppError> {
        self.issue_receipt_at(ambassador_id, payment_date, Utc::now()).await
    }

    /// Phase-1 commissions counted here end up `paid`; Phase-2 commissions are
    /// recurring and are left untouched.
    pub async fn issue_receipt_at(&self, ambassador_id: &str, payment_date: NaiveDate, now: DateTime<Utc>) -> Result<IssuedReceipt, AppError> {
        let ambassador = self.ambassador_repo.find_by_id(ambassador_id).await?
            .ok_or(AppError::NotFound("Ambassador not found".into()))?;

        let as_of = settlement_cutoff(payment_date, now);
        let waitlist = self.commission_repo.list_waitlist_by_ambassador(&ambassador.id).await?;
        let monthly = self.commission_repo.list_monthly_by_ambassador(&ambassador.id).await?;
        let statement = build_statement(&ambassador.id, &waitlist, &monthly, as_of);

        if statement.total_pence <= 0 {
            return Err(AppError::NoPayoutDue);
        }

        let settled: Vec<String> = qualifying_waitlist(&waitlist, as_of)
            .into_iter()
            .map(|c| c.id.clone())
            .collect();

        let draft = PaymentReceipt::draft(&ambassador, &statement, payment_date);
        let receipt = self.receipt_repo.issue(&draft, &settled).await?;

        info!(
            ambassador_id = %ambassador.id,
            receipt_number = %receipt.receipt_number,
            total_pence = receipt.total_pence,
            settled = settled.len(),
            "Payment receipt issued"
        );

        Ok(IssuedReceipt { receipt, statement, settled_commissions: settled.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cutoff_is_end_of_payment_day() {
        let now = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        assert_eq!(settlement_cutoff(date, now), Utc.with_ymd_and_hms(2024, 5, 15, 23, 59, 59).unwrap());
    }

    #[test]
    fn test_future_payment_date_is_capped_at_now() {
        let now = Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        assert_eq!(settlement_cutoff(date, now), now);
    }
}
