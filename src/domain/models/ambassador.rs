use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

pub const DEFAULT_PAYOUT_METHOD: &str = "PayPal";

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Ambassador {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub social_handle: Option<String>,
    pub discord_handle: Option<String>,
    pub country: Option<String>,
    pub referral_code: String,
    pub receipt_prefix: String,
    pub receipt_seq: i64,
    pub leads_acquired: i64,
    pub total_paid_pence: i64,
    pub payout_method: String,
    pub payout_address: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub accepted_terms: bool,
    pub terms_accepted_at: Option<DateTime<Utc>>,
    pub accepted_consent: bool,
    pub consent_accepted_at: Option<DateTime<Utc>>,
    pub accepted_guide: bool,
    pub guide_accepted_at: Option<DateTime<Utc>>,
    pub onboarding_completed: bool,
    pub joined_at: DateTime<Utc>,
}

pub struct NewAmbassadorParams {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub social_handle: Option<String>,
    pub discord_handle: Option<String>,
    pub country: Option<String>,
}

impl Ambassador {
    pub fn new(params: NewAmbassadorParams, referral_code: String) -> Self {
        let receipt_prefix = receipt_prefix_for(&referral_code);
        Self {
            id: Uuid::new_v4().to_string(),
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email.trim().to_lowercase(),
            social_handle: params.social_handle,
            discord_handle: params.discord_handle,
            country: params.country,
            referral_code,
            receipt_prefix,
            receipt_seq: 0,
            leads_acquired: 0,
            total_paid_pence: 0,
            payout_method: DEFAULT_PAYOUT_METHOD.to_string(),
            payout_address: None,
            address_line1: None,
            address_line2: None,
            city: None,
            postcode: None,
            accepted_terms: false,
            terms_accepted_at: None,
            accepted_consent: false,
            consent_accepted_at: None,
            accepted_guide: false,
            guide_accepted_at: None,
            onboarding_completed: false,
            joined_at: Utc::now(),
        }
    }

    /// Swaps in a freshly generated code after a collision.
    pub fn with_referral_code(mut self, referral_code: String) -> Self {
        self.receipt_prefix = receipt_prefix_for(&referral_code);
        self.referral_code = referral_code;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Single-line postal address, empty parts skipped.
    pub fn postal_address(&self) -> String {
        [
            self.address_line1.as_deref(),
            self.address_line2.as_deref(),
            self.city.as_deref(),
            self.postcode.as_deref(),
            self.country.as_deref(),
        ]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn receipt_prefix_for(referral_code: &str) -> String {
    let suffix = referral_code.get(4..).unwrap_or(referral_code);
    format!("REC-{}", suffix)
}

#[derive(Debug, Deserialize, Clone)]
pub struct PayoutDetails {
    pub payout_method: Option<String>,
    pub payout_address: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnboardingStage {
    Terms,
    Consent,
    Guide,
}

impl OnboardingStage {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "terms" => Some(Self::Terms),
            "consent" => Some(Self::Consent),
            "guide" => Some(Self::Guide),
            _ => None,
        }
    }
}
