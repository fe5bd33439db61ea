use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
pub struct RegisterAmbassadorRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub social_handle: String,
    pub discord_handle: String,
    pub country: String,
}

#[derive(Deserialize)]
pub struct AmbassadorLoginRequest {
    pub email: String,
    pub referral_code: String,
}

#[derive(Deserialize)]
pub struct OnboardingRequest {
    pub stage: String,
    pub form_data: Option<Value>,
}

#[derive(Deserialize)]
pub struct WaitlistSignupRequest {
    pub email: String,
    pub social_handle: Option<String>,
    pub referral_code: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyLeadQuery {
    pub email: String,
    pub token: String,
}

#[derive(Deserialize)]
pub struct NewsletterRequest {
    pub email: String,
    pub social_handle: Option<String>,
    pub signup_source: Option<String>,
}

#[derive(Deserialize)]
pub struct TrackReferralRequest {
    pub user_id: String,
    pub email: String,
    pub referral_code: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCheckoutRequest {
    pub price_id: String,
    pub user_id: String,
    pub user_email: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
    pub quantity: Option<u32>,
}

#[derive(Deserialize)]
pub struct VerifyCheckoutRequest {
    pub session_id: String,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

#[derive(Deserialize)]
pub struct IssueReceiptRequest {
    pub payment_date: Option<NaiveDate>,
}
