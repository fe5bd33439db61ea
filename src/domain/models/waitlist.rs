use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use sqlx::FromRow;
use rand::{distributions::Alphanumeric, Rng};

/// Flat Phase-1 commission per verified waitlist signup.
pub const WAITLIST_COMMISSION_PENCE: i64 = 50;
/// Phase-1 leads an ambassador can hold before new signups stop counting.
pub const PHASE1_LEAD_CAP: i64 = 100;
/// Fraud buffer between verification and the commission becoming payable.
pub const FRAUD_DELAY_DAYS: i64 = 7;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct WaitlistLead {
    pub id: String,
    pub email: String,
    pub social_handle: Option<String>,
    pub ambassador_id: Option<String>,
    #[serde(skip_serializing)]
    pub verification_token: Option<String>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WaitlistLead {
    pub fn new(email: &str, social_handle: Option<String>, ip_address: Option<String>) -> Self {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            email: normalize_email(email),
            social_handle,
            ambassador_id: None,
            verification_token: Some(token),
            verified: false,
            verified_at: None,
            ip_address,
            created_at: Utc::now(),
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Shape check only: one `@`, no whitespace, a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommissionStatus {
    Pending,
    Verified,
    Payable,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Payable => "payable",
            Self::Paid => "paid",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "verified" => Some(Self::Verified),
            "payable" => Some(Self::Payable),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }

    /// Transitions only move forward; `paid` is terminal.
    pub fn can_transition_to(&self, next: CommissionStatus) -> bool {
        next > *self
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct WaitlistCommission {
    pub id: String,
    pub ambassador_id: String,
    pub waitlist_email: String,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub payable_date: Option<DateTime<Utc>>,
    pub status: String,
    pub amount_pence: i64,
    pub created_at: DateTime<Utc>,
}

impl WaitlistCommission {
    pub fn new(ambassador_id: String, waitlist_email: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ambassador_id,
            waitlist_email: normalize_email(waitlist_email),
            verified: false,
            verified_at: None,
            payable_date: None,
            status: CommissionStatus::Pending.as_str().to_string(),
            amount_pence: WAITLIST_COMMISSION_PENCE,
            created_at: Utc::now(),
        }
    }

    pub fn payable_date_for(verified_at: DateTime<Utc>) -> DateTime<Utc> {
        verified_at + Duration::days(FRAUD_DELAY_DAYS)
    }

    pub fn status(&self) -> Option<CommissionStatus> {
        CommissionStatus::parse(&self.status)
    }

    /// Stored `verified` rows whose fraud window has elapsed are already payable.
    pub fn effective_status(&self, as_of: DateTime<Utc>) -> Option<CommissionStatus> {
        match self.status()? {
            CommissionStatus::Verified | CommissionStatus::Payable => {
                match self.payable_date {
                    Some(date) if date <= as_of => Some(CommissionStatus::Payable),
                    _ => Some(CommissionStatus::Verified),
                }
            }
            other => Some(other),
        }
    }

    pub fn is_payable_at(&self, as_of: DateTime<Utc>) -> bool {
        self.effective_status(as_of) == Some(CommissionStatus::Payable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeadVerification {
    Verified { verified_at: DateTime<Utc> },
    AlreadyVerified { verified_at: Option<DateTime<Utc>> },
    Invalid,
}
