use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::models::{
    ambassador::Ambassador,
    payout::{format_pence, PaymentReceipt, PayoutStatement},
    subscription::{MonthlyCommission, Referral},
    waitlist::{CommissionStatus, WaitlistCommission, PHASE1_LEAD_CAP, WAITLIST_COMMISSION_PENCE},
};
use crate::domain::services::payout::AmbassadorPayout;

#[derive(Serialize)]
pub struct AmbassadorCreatedResponse {
    pub ambassador_id: String,
    pub referral_code: String,
}

#[derive(Serialize)]
pub struct OnboardingProgress {
    pub accepted_terms: bool,
    pub accepted_consent: bool,
    pub accepted_guide: bool,
    pub completed: bool,
}

impl From<&Ambassador> for OnboardingProgress {
    fn from(a: &Ambassador) -> Self {
        Self {
            accepted_terms: a.accepted_terms,
            accepted_consent: a.accepted_consent,
            accepted_guide: a.accepted_guide,
            completed: a.onboarding_completed,
        }
    }
}

#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct Phase1Stats {
    pub total_signups: i64,
    pub verified_signups: i64,
    pub payable_signups: i64,
    pub paid_signups: i64,
    pub cap: i64,
    pub remaining_cap: i64,
    pub earned_pence: i64,
}

impl Phase1Stats {
    /// `earned_pence` covers everything verified so far, paid or not.
    pub fn from_commissions(commissions: &[WaitlistCommission], as_of: DateTime<Utc>) -> Self {
        let count = |status: CommissionStatus| {
            commissions.iter().filter(|c| c.effective_status(as_of) == Some(status)).count() as i64
        };
        let verified_signups = commissions.iter().filter(|c| c.verified).count() as i64;
        let total_signups = commissions.len() as i64;

        Self {
            total_signups,
            verified_signups,
            payable_signups: count(CommissionStatus::Payable),
            paid_signups: count(CommissionStatus::Paid),
            cap: PHASE1_LEAD_CAP,
            remaining_cap: (PHASE1_LEAD_CAP - total_signups).max(0),
            earned_pence: verified_signups.min(PHASE1_LEAD_CAP) * WAITLIST_COMMISSION_PENCE,
        }
    }
}

#[derive(Serialize)]
pub struct Phase2Stats {
    pub active_commissions: i64,
    pub active_referrals: i64,
    pub earned_pence: i64,
}

impl Phase2Stats {
    pub fn from_records(commissions: &[MonthlyCommission], referrals: &[Referral]) -> Self {
        let active: Vec<&MonthlyCommission> = commissions.iter().filter(|c| c.is_active).collect();
        Self {
            active_commissions: active.len() as i64,
            active_referrals: referrals.iter().filter(|r| r.status == "active").count() as i64,
            earned_pence: active.iter().map(|c| c.amount_pence).sum(),
        }
    }
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub ambassador_id: String,
    pub first_name: String,
    pub last_name: String,
    pub referral_code: String,
    pub leads_acquired: i64,
    pub total_paid_pence: i64,
    pub onboarding: OnboardingProgress,
    pub phase1: Phase1Stats,
    pub phase2: Phase2Stats,
    pub statement: PayoutStatement,
    pub next_payout_date: NaiveDate,
    pub referrals: Vec<Referral>,
    pub waitlist_commissions: Vec<WaitlistCommission>,
}

#[derive(Serialize)]
pub struct PayoutRow {
    pub ambassador_id: String,
    pub name: String,
    pub email: String,
    pub referral_code: String,
    pub payout_method: String,
    pub payout_address: Option<String>,
    pub phase1_count: i64,
    pub phase1_total_pence: i64,
    pub phase2_count: i64,
    pub phase2_total_pence: i64,
    pub total_pence: i64,
    pub total_formatted: String,
}

impl From<&AmbassadorPayout> for PayoutRow {
    fn from(p: &AmbassadorPayout) -> Self {
        Self {
            ambassador_id: p.ambassador.id.clone(),
            name: p.ambassador.full_name(),
            email: p.ambassador.email.clone(),
            referral_code: p.ambassador.referral_code.clone(),
            payout_method: p.ambassador.payout_method.clone(),
            payout_address: p.ambassador.payout_address.clone(),
            phase1_count: p.statement.phase1_count,
            phase1_total_pence: p.statement.phase1_total_pence,
            phase2_count: p.statement.phase2_count,
            phase2_total_pence: p.statement.phase2_total_pence,
            total_pence: p.statement.total_pence,
            total_formatted: format_pence(p.statement.total_pence),
        }
    }
}

#[derive(Serialize)]
pub struct PayoutSummary {
    pub ambassador_count: usize,
    pub phase1_total_pence: i64,
    pub phase2_total_pence: i64,
    pub total_pence: i64,
    pub total_formatted: String,
    pub next_payout_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
}

impl PayoutSummary {
    pub fn from_rows(rows: &[PayoutRow], next_payout_date: NaiveDate, generated_at: DateTime<Utc>) -> Self {
        let phase1_total_pence = rows.iter().map(|r| r.phase1_total_pence).sum();
        let phase2_total_pence = rows.iter().map(|r| r.phase2_total_pence).sum();
        let total_pence = rows.iter().map(|r| r.total_pence).sum();
        Self {
            ambassador_count: rows.len(),
            phase1_total_pence,
            phase2_total_pence,
            total_pence,
            total_formatted: format_pence(total_pence),
            next_payout_date,
            generated_at,
        }
    }
}

#[derive(Serialize)]
pub struct AdminPayoutsResponse {
    pub payouts: Vec<PayoutRow>,
    pub summary: PayoutSummary,
}

#[derive(Serialize)]
pub struct AdminAmbassadorResponse {
    pub ambassador: Ambassador,
    pub statement: PayoutStatement,
    pub waitlist_commissions: Vec<WaitlistCommission>,
    pub monthly_commissions: Vec<MonthlyCommission>,
    pub referrals: Vec<Referral>,
    pub receipts: Vec<PaymentReceipt>,
}

#[derive(Serialize)]
pub struct ReceiptResponse {
    pub receipt: PaymentReceipt,
    pub total_formatted: String,
    pub settled_commissions: usize,
}

#[derive(Serialize)]
pub struct WaitlistSignupResponse {
    pub message: String,
    pub referred: bool,
}

#[derive(Serialize)]
pub struct CountResponse {
    pub count: i64,
}

#[derive(Serialize)]
pub struct LeadVerifiedResponse {
    pub status: String,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Serialize)]
pub struct CheckoutVerifiedResponse {
    pub success: bool,
    pub product_type: String,
    pub subscription_id: Option<String>,
}

#[derive(Serialize)]
pub struct MaturityResponse {
    pub matured: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn commission(status: &str, verified_days_ago: Option<i64>, now: DateTime<Utc>) -> WaitlistCommission {
        let mut c = WaitlistCommission::new("amb".into(), &format!("{}-{:?}@example.com", status, verified_days_ago));
        c.status = status.into();
        if let Some(days) = verified_days_ago {
            let at = now - Duration::days(days);
            c.verified = true;
            c.verified_at = Some(at);
            c.payable_date = Some(WaitlistCommission::payable_date_for(at));
        }
        c
    }

    #[test]
    fn test_phase1_stats_use_effective_status() {
        let now = Utc::now();
        let commissions = vec![
            commission("pending", None, now),
            commission("verified", Some(2), now),
            commission("verified", Some(9), now),
            commission("payable", Some(20), now),
            commission("paid", Some(40), now),
        ];
        let stats = Phase1Stats::from_commissions(&commissions, now);
        assert_eq!(stats.total_signups, 5);
        assert_eq!(stats.verified_signups, 4);
        assert_eq!(stats.payable_signups, 2);
        assert_eq!(stats.paid_signups, 1);
        assert_eq!(stats.remaining_cap, 95);
        assert_eq!(stats.earned_pence, 200);
    }
}
