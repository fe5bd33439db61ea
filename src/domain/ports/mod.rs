use crate::domain::models::{
    ambassador::{Ambassador, OnboardingStage, PayoutDetails},
    payout::PaymentReceipt,
    subscription::{MonthlyCommission, Referral, Student, SubscriptionStatus},
    waitlist::{LeadVerification, WaitlistCommission, WaitlistLead},
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

#[async_trait]
pub trait AmbassadorRepository: Send + Sync {
    async fn create(&self, ambassador: &Ambassador) -> Result<Ambassador, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Ambassador>, AppError>;
    /// Exact match on the canonical code.
    async fn find_by_code(&self, referral_code: &str) -> Result<Option<Ambassador>, AppError>;
    async fn find_by_login(&self, email: &str, referral_code: &str) -> Result<Option<Ambassador>, AppError>;
    /// Ordered by join time, oldest first.
    async fn list(&self) -> Result<Vec<Ambassador>, AppError>;
    async fn update_payout_details(&self, id: &str, details: &PayoutDetails) -> Result<Ambassador, AppError>;
    async fn record_onboarding(&self, id: &str, stage: OnboardingStage, document: Option<Value>) -> Result<(), AppError>;
}

#[async_trait]
pub trait WaitlistRepository: Send + Sync {
    /// Inserts the lead. When `commission` is given it is inserted only while the
    /// ambassador holds fewer than `cap` commissions; on success the lead is
    /// linked and the ambassador's lead counter incremented. Returns whether
    /// the referral was recorded.
    async fn insert_lead(&self, lead: &WaitlistLead, commission: Option<&WaitlistCommission>, cap: i64) -> Result<bool, AppError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<WaitlistLead>, AppError>;
    async fn count(&self) -> Result<i64, AppError>;
    /// Verifies the lead and clears its token. A lead already verified
    /// reports `AlreadyVerified` whatever token is presented.
    async fn mark_verified(&self, email: &str, token: &str, now: DateTime<Utc>) -> Result<LeadVerification, AppError>;
}

#[async_trait]
pub trait CommissionRepository: Send + Sync {
    async fn list_waitlist_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<WaitlistCommission>, AppError>;
    /// `pending -> verified`; rows already past `pending` are untouched.
    async fn mark_waitlist_verified(&self, waitlist_email: &str, verified_at: DateTime<Utc>, payable_date: DateTime<Utc>) -> Result<u64, AppError>;
    /// `verified -> payable` for every commission whose payable date is `<= as_of`.
    async fn mature_waitlist(&self, as_of: DateTime<Utc>) -> Result<u64, AppError>;
    /// Insert-or-ignore on `(student_id, billing_month)`. Returns whether a row was written.
    async fn insert_monthly_if_absent(&self, commission: &MonthlyCommission) -> Result<bool, AppError>;
    async fn list_monthly_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<MonthlyCommission>, AppError>;
}

#[async_trait]
pub trait ReferralRepository: Send + Sync {
    /// Records the referral once per student, links the student profile and
    /// increments the ambassador's lead counter. Returns whether it was new.
    async fn record(&self, referral: &Referral) -> Result<bool, AppError>;
    async fn find_by_student(&self, student_id: &str) -> Result<Option<Referral>, AppError>;
    async fn list_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<Referral>, AppError>;
    /// `pending` or `cancelled` -> `active`.
    async fn activate(&self, student_id: &str) -> Result<u64, AppError>;
    /// Any non-cancelled status -> `cancelled`.
    async fn cancel(&self, student_id: &str) -> Result<u64, AppError>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Creates the profile if missing; a provided email overwrites the stored one.
    async fn upsert_profile(&self, id: &str, email: Option<&str>) -> Result<Student, AppError>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Student>, AppError>;
    async fn find_by_customer_id(&self, customer_id: &str) -> Result<Option<Student>, AppError>;
    async fn activate(&self, id: &str, customer_id: Option<&str>, subscription_id: Option<&str>, subscription_type: Option<&str>) -> Result<(), AppError>;
    async fn set_status(&self, id: &str, status: SubscriptionStatus) -> Result<(), AppError>;
    async fn expire(&self, id: &str, clear_subscription: bool) -> Result<(), AppError>;
    async fn is_event_processed(&self, event_id: &str) -> Result<bool, AppError>;
    /// Insert-if-absent. Returns whether the event id was new.
    async fn record_event(&self, event_id: &str, event_type: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    /// In one transaction: claims the ambassador's next receipt sequence,
    /// stores the receipt, settles the listed commissions as `paid` and adds
    /// the total to the ambassador's paid counter.
    async fn issue(&self, receipt: &PaymentReceipt, commission_ids: &[String]) -> Result<PaymentReceipt, AppError>;
    async fn list_by_ambassador(&self, ambassador_id: &str) -> Result<Vec<PaymentReceipt>, AppError>;
}

#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait MarketingService: Send + Sync {
    async fn subscribe(&self, email: &str, properties: Value) -> Result<(), AppError>;
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub price_id: String,
    pub user_id: String,
    pub user_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
    pub payment_status: Option<String>,
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
    pub user_id: Option<String>,
    pub product_type: Option<String>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError>;
    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, AppError>;
}
