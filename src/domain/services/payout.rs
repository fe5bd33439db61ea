use std::sync::Arc;
use chrono::{DateTime, Datelike, NaiveDate, Utc};

use crate::domain::models::{
    ambassador::Ambassador,
    payout::PayoutStatement,
    subscription::{MonthlyCommission, MONTHLY_COMMISSION_PENCE},
    waitlist::{WaitlistCommission, WAITLIST_COMMISSION_PENCE},
};
use crate::domain::ports::{AmbassadorRepository, CommissionRepository};
use crate::error::AppError;

/// Payouts run on this day of each month.
pub const PAYOUT_DAY: u32 = 15;

/// Waitlist commissions that count toward a payout at `as_of`.
pub fn qualifying_waitlist(commissions: &[WaitlistCommission], as_of: DateTime<Utc>) -> Vec<&WaitlistCommission> {
    commissions.iter().filter(|c| c.is_payable_at(as_of)).collect()
}

pub fn build_statement(
    ambassador_id: &str,
    waitlist: &[WaitlistCommission],
    monthly: &[MonthlyCommission],
    as_of: DateTime<Utc>,
) -> PayoutStatement {
    let phase1_count = qualifying_waitlist(waitlist, as_of).len() as i64;
    let phase2_count = monthly.iter().filter(|c| c.is_active).count() as i64;
    let phase1_total_pence = phase1_count * WAITLIST_COMMISSION_PENCE;
    let phase2_total_pence = phase2_count * MONTHLY_COMMISSION_PENCE;

    PayoutStatement {
        ambassador_id: ambassador_id.to_string(),
        phase1_count,
        phase1_total_pence,
        phase2_count,
        phase2_total_pence,
        total_pence: phase1_total_pence + phase2_total_pence,
        as_of,
    }
}

/// 15th of this month before the 15th, otherwise the 15th of next month.
pub fn next_payout_date(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.day() < PAYOUT_DAY {
        (today.year(), today.month())
    } else if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, PAYOUT_DAY).unwrap_or(today)
}

pub struct AmbassadorPayout {
    pub ambassador: Ambassador,
    pub statement: PayoutStatement,
}

/// Read-only view over accrued commissions; never writes.
pub struct PayoutAggregator {
    ambassador_repo: Arc<dyn AmbassadorRepository>,
    commission_repo: Arc<dyn CommissionRepository>,
}

impl PayoutAggregator {
    pub fn new(ambassador_repo: Arc<dyn AmbassadorRepository>, commission_repo: Arc<dyn CommissionRepository>) -> Self {
        Self { ambassador_repo, commission_repo }
    }

    pub async fn compute_payout(&self, ambassador_id: &str, as_of: DateTime<Utc>) -> Result<PayoutStatement, AppError> {
        let ambassador = self.ambassador_repo.find_by_id(ambassador_id).await?
            .ok_or(AppError::NotFound("Ambassador not found".into()))?;
        self.statement_for(&ambassador, as_of).await
    }

    pub async fn statement_for(&self, ambassador: &Ambassador, as_of: DateTime<Utc>) -> Result<PayoutStatement, AppError> {
        let waitlist = self.commission_repo.list_waitlist_by_ambassador(&ambassador.id).await?;
        let monthly = self.commission_repo.list_monthly_by_ambassador(&ambassador.id).await?;
        Ok(build_statement(&ambassador.id, &waitlist, &monthly, as_of))
    }

    /// Ambassadors with something to pay, largest first. The sort is stable so
    /// equal totals keep join order.
    pub async fn list_all_payouts(&self, as_of: DateTime<Utc>) -> Result<Vec<AmbassadorPayout>, AppError> {
        let ambassadors = self.ambassador_repo.list().await?;
        let mut payouts = Vec::new();

        for ambassador in ambassadors {
            let statement = self.statement_for(&ambassador, as_of).await?;
            if statement.total_pence > 0 {
                payouts.push(AmbassadorPayout { ambassador, statement });
            }
        }

        payouts.sort_by(|a, b| b.statement.total_pence.cmp(&a.statement.total_pence));
        Ok(payouts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn verified(days_ago: i64, now: DateTime<Utc>) -> WaitlistCommission {
        let verified_at = now - Duration::days(days_ago);
        let mut c = WaitlistCommission::new("amb-a".into(), &format!("lead{}@example.com", days_ago));
        c.status = "verified".into();
        c.verified = true;
        c.verified_at = Some(verified_at);
        c.payable_date = Some(WaitlistCommission::payable_date_for(verified_at));
        c
    }

    fn monthly(month: &str, active: bool) -> MonthlyCommission {
        let mut c = MonthlyCommission::new("amb-a".into(), format!("stu-{}", month), month.into(), None);
        c.is_active = active;
        c
    }

    #[test]
    fn test_statement_mixed_scenario() {
        let now = Utc::now();
        let mut waitlist = vec![verified(10, now), verified(10, now), verified(10, now), verified(1, now)];
        waitlist[0].status = "payable".into();
        waitlist.push(WaitlistCommission::new("amb-a".into(), "pending@example.com"));
        let monthly = vec![monthly("2024-01", true), monthly("2024-02", true), monthly("2024-03", false)];

        let statement = build_statement("amb-a", &waitlist, &monthly, now);
        assert_eq!(statement.phase1_count, 3);
        assert_eq!(statement.phase1_total_pence, 150);
        assert_eq!(statement.phase2_count, 2);
        assert_eq!(statement.phase2_total_pence, 400);
        assert_eq!(statement.total_pence, 550);
    }

    #[test]
    fn test_paid_commissions_do_not_count() {
        let now = Utc::now();
        let mut c = verified(30, now);
        c.status = "paid".into();
        let statement = build_statement("amb-a", &[c], &[], now);
        assert_eq!(statement.total_pence, 0);
    }

    #[test]
    fn test_statement_is_pure() {
        let now = Utc::now();
        let waitlist = vec![verified(8, now)];
        let monthly = vec![monthly("2024-01", true)];
        assert_eq!(
            build_statement("amb-a", &waitlist, &monthly, now),
            build_statement("amb-a", &waitlist, &monthly, now)
        );
    }

    #[test]
    fn test_next_payout_date() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(next_payout_date(d(2024, 3, 14)), d(2024, 3, 15));
        assert_eq!(next_payout_date(d(2024, 3, 15)), d(2024, 4, 15));
        assert_eq!(next_payout_date(d(2024, 12, 20)), d(2025, 1, 15));
        assert_eq!(next_payout_date(d(2024, 12, 1)), d(2024, 12, 15));
        assert_eq!(next_payout_date(d(2024, 1, 31)), d(2024, 2, 15));
    }
}
