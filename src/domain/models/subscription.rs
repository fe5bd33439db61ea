use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Flat Phase-2 commission per referred subscriber per billing month.
pub const MONTHLY_COMMISSION_PENCE: i64 = 200;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct MonthlyCommission {
    pub id: String,
    pub ambassador_id: String,
    pub student_id: String,
    pub billing_month: String,
    pub is_active: bool,
    pub amount_pence: i64,
    pub subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MonthlyCommission {
    pub fn new(ambassador_id: String, student_id: String, billing_month: String, subscription_id: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ambassador_id,
            student_id,
            billing_month,
            is_active: true,
            amount_pence: MONTHLY_COMMISSION_PENCE,
            subscription_id,
            created_at: Utc::now(),
        }
    }
}

/// `YYYY-MM` for the month containing `at`.
pub fn billing_month_of(at: DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

pub fn is_valid_billing_month(raw: &str) -> bool {
    raw.len() == 7 && NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d").is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralStatus {
    Pending,
    Active,
    Cancelled,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Referral {
    pub id: String,
    pub student_user_id: String,
    pub ambassador_id: String,
    pub student_email: String,
    pub status: String,
    pub signup_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Referral {
    pub fn new(student_user_id: String, ambassador_id: String, student_email: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            student_user_id,
            ambassador_id,
            student_email,
            status: ReferralStatus::Pending.as_str().to_string(),
            signup_date: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }

    /// Maps a processor subscription status onto the student's access state.
    pub fn from_processor(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "canceled" | "unpaid" => Self::Expired,
            _ => Self::Trial,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Student {
    pub id: String,
    pub email: Option<String>,
    pub referred_by_ambassador: Option<String>,
    pub subscription_status: String,
    pub subscription_type: Option<String>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
