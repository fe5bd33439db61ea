use std::sync::Arc;
use crate::domain::ports::{
    AmbassadorRepository, CommissionRepository, EmailService, MarketingService, PaymentGateway,
    ReceiptRepository, ReferralRepository, StudentRepository, WaitlistRepository,
};
use crate::domain::services::{
    accrual::AccrualEngine,
    auth_service::AuthService,
    billing_events::BillingEventProcessor,
    payout::PayoutAggregator,
    receipt::ReceiptIssuer,
    referral_ledger::ReferralLedger,
};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ambassador_repo: Arc<dyn AmbassadorRepository>,
    pub waitlist_repo: Arc<dyn WaitlistRepository>,
    pub commission_repo: Arc<dyn CommissionRepository>,
    pub referral_repo: Arc<dyn ReferralRepository>,
    pub student_repo: Arc<dyn StudentRepository>,
    pub receipt_repo: Arc<dyn ReceiptRepository>,
    pub auth_service: Arc<AuthService>,
    pub email_service: Arc<dyn EmailService>,
    pub marketing_service: Arc<dyn MarketingService>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
}

impl AppState {
    pub fn ledger(&self) -> ReferralLedger {
        ReferralLedger::new(
            self.ambassador_repo.clone(),
            self.waitlist_repo.clone(),
            self.referral_repo.clone(),
            self.student_repo.clone(),
        )
    }

    pub fn accrual(&self) -> AccrualEngine {
        AccrualEngine::new(self.commission_repo.clone(), self.referral_repo.clone())
    }

    pub fn payouts(&self) -> PayoutAggregator {
        PayoutAggregator::new(self.ambassador_repo.clone(), self.commission_repo.clone())
    }

    pub fn receipts(&self) -> ReceiptIssuer {
        ReceiptIssuer::new(self.ambassador_repo.clone(), self.commission_repo.clone(), self.receipt_repo.clone())
    }

    pub fn billing_events(&self) -> BillingEventProcessor {
        BillingEventProcessor::new(self.student_repo.clone(), self.accrual())
    }
}
