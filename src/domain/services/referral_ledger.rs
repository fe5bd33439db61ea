use std::sync::Arc;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::models::{
    ambassador::{Ambassador, NewAmbassadorParams},
    subscription::Referral,
    waitlist::{is_valid_email, normalize_email, WaitlistCommission, WaitlistLead, PHASE1_LEAD_CAP},
};
use crate::domain::ports::{AmbassadorRepository, ReferralRepository, StudentRepository, WaitlistRepository};
use crate::domain::services::referral_code::{generate_referral_code, normalize_referral_code, MAX_CODE_ATTEMPTS};
use crate::error::AppError;

/// Whether a registration was attributed to an ambassador. Invalid, unknown
/// and exhausted codes all come back as `referred: false` so callers cannot
/// probe which codes exist.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReferralOutcome {
    pub referred: bool,
    pub ambassador_id: Option<String>,
}

impl ReferralOutcome {
    fn not_referred() -> Self {
        Self { referred: false, ambassador_id: None }
    }

    fn referred(ambassador_id: String) -> Self {
        Self { referred: true, ambassador_id: Some(ambassador_id) }
    }
}

pub struct NewLead {
    pub email: String,
    pub social_handle: Option<String>,
    pub referral_code: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug)]
pub struct LeadSignup {
    pub lead: WaitlistLead,
    pub outcome: ReferralOutcome,
}

pub struct ReferralLedger {
    ambassador_repo: Arc<dyn AmbassadorRepository>,
    waitlist_repo: Arc<dyn WaitlistRepository>,
    referral_repo: Arc<dyn ReferralRepository>,
    student_repo: Arc<dyn StudentRepository>,
}

impl ReferralLedger {
    pub fn new(
        ambassador_repo: Arc<dyn AmbassadorRepository>,
        waitlist_repo: Arc<dyn WaitlistRepository>,
        referral_repo: Arc<dyn ReferralRepository>,
        student_repo: Arc<dyn StudentRepository>,
    ) -> Self {
        Self { ambassador_repo, waitlist_repo, referral_repo, student_repo }
    }

    pub async fn register_ambassador(&self, params: NewAmbassadorParams) -> Result<Ambassador, AppError> {
        self.register_ambassador_with(params, || generate_referral_code(&mut rand::thread_rng())).await
    }

    /// Retries on code collisions, bounded by `MAX_CODE_ATTEMPTS`. The unique
    /// index on `referral_code` is the arbiter, so concurrent signups cannot
    /// both win the same code.
    pub async fn register_ambassador_with<F>(&self, params: NewAmbassadorParams, mut next_code: F) -> Result<Ambassador, AppError>
    where
        F: FnMut() -> String + Send,
    {
        let mut candidate = Ambassador::new(params, next_code());

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            match self.ambassador_repo.create(&candidate).await {
                Ok(created) => {
                    info!(ambassador_id = %created.id, referral_code = %created.referral_code, "Ambassador registered");
                    return Ok(created);
                }
                Err(e) if e.is_unique_violation() => {
                    warn!(attempt, code = %candidate.referral_code, "Referral code collision, regenerating");
                    if attempt < MAX_CODE_ATTEMPTS {
                        candidate = candidate.with_referral_code(next_code());
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::InternalWithMsg("Could not generate unique referral code".into()))
    }

    pub async fn resolve_code(&self, raw_code: &str) -> Result<Option<Ambassador>, AppError> {
        match normalize_referral_code(raw_code) {
            Some(code) => self.ambassador_repo.find_by_code(&code).await,
            None => Ok(None),
        }
    }

    /// Waitlist path: the only one that enforces the Phase-1 lead cap.
    pub async fn register_lead(&self, new_lead: NewLead) -> Result<LeadSignup, AppError> {
        if !is_valid_email(&new_lead.email) {
            return Err(AppError::Validation("Valid email is required".into()));
        }
        let email = normalize_email(&new_lead.email);

        if self.waitlist_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Already on waitlist".into()));
        }

        let ambassador = match new_lead.referral_code.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(code) => self.resolve_code(code).await?,
            None => None,
        };

        let mut lead = WaitlistLead::new(&email, new_lead.social_handle, new_lead.ip_address);
        let commission = ambassador.as_ref().map(|a| WaitlistCommission::new(a.id.clone(), &email));

        let referred = match self.waitlist_repo.insert_lead(&lead, commission.as_ref(), PHASE1_LEAD_CAP).await {
            Ok(referred) => referred,
            Err(e) if e.is_unique_violation() => return Err(AppError::Conflict("Already on waitlist".into())),
            Err(e) => return Err(e),
        };

        let outcome = match (referred, ambassador) {
            (true, Some(amb)) => {
                lead.ambassador_id = Some(amb.id.clone());
                info!(ambassador_id = %amb.id, "Waitlist lead attributed to ambassador");
                ReferralOutcome::referred(amb.id)
            }
            (false, Some(amb)) => {
                info!(ambassador_id = %amb.id, "Ambassador at lead cap, lead recorded unattributed");
                ReferralOutcome::not_referred()
            }
            _ => ReferralOutcome::not_referred(),
        };

        Ok(LeadSignup { lead, outcome })
    }

    /// Student path: no cap. Repeat calls for the same student are no-ops that
    /// report the original attribution.
    pub async fn register_student(&self, student_id: &str, email: &str, referral_code: Option<&str>) -> Result<ReferralOutcome, AppError> {
        self.student_repo.upsert_profile(student_id, Some(email)).await?;

        let Some(code) = referral_code.filter(|c| !c.trim().is_empty()) else {
            return Ok(ReferralOutcome::not_referred());
        };

        let Some(ambassador) = self.resolve_code(code).await? else {
            info!(student_id = %student_id, "Referral code did not resolve");
            return Ok(ReferralOutcome::not_referred());
        };

        let referral = Referral::new(student_id.to_string(), ambassador.id.clone(), normalize_email(email));
        if self.referral_repo.record(&referral).await? {
            info!(student_id = %student_id, ambassador_id = %ambassador.id, "Student referral recorded");
            return Ok(ReferralOutcome::referred(ambassador.id));
        }

        match self.referral_repo.find_by_student(student_id).await? {
            Some(existing) => Ok(ReferralOutcome::referred(existing.ambassador_id)),
            None => Ok(ReferralOutcome::not_referred()),
        }
    }
}
