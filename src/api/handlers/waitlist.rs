use axum::{extract::{State, Query}, response::IntoResponse, http::StatusCode, Json};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::state::AppState;
use crate::api::dtos::{
    requests::{NewsletterRequest, VerifyLeadQuery, WaitlistSignupRequest},
    responses::{CountResponse, LeadVerifiedResponse, WaitlistSignupResponse},
};
use crate::api::extractors::client_ip::ClientIp;
use crate::domain::models::waitlist::{is_valid_email, normalize_email, LeadVerification, WaitlistLead};
use crate::domain::services::referral_ledger::NewLead;
use crate::error::AppError;

const MARKETING_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn join_waitlist(
    State(state): State<Arc<AppState>>,
    ClientIp(ip_address): ClientIp,
    Json(payload): Json<WaitlistSignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let social_handle = payload.social_handle
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty());

    let signup = state.ledger().register_lead(NewLead {
        email: payload.email,
        social_handle: social_handle.clone(),
        referral_code: payload.referral_code,
        ip_address,
    }).await?;

    send_verification_email(&state, &signup.lead).await;

    push_to_marketing(state.clone(), signup.lead.email.clone(), json!({
        "signup_source": "waitlist",
        "social_handle": social_handle,
        "referred": signup.outcome.referred,
    }));

    info!(referred = signup.outcome.referred, "Waitlist signup recorded");

    Ok((StatusCode::CREATED, Json(WaitlistSignupResponse {
        message: "Successfully joined waitlist".to_string(),
        referred: signup.outcome.referred,
    })))
}

pub async fn waitlist_count(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let count = state.waitlist_repo.count().await?;
    Ok(Json(CountResponse { count }))
}

pub async fn verify_lead(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyLeadQuery>,
) -> Result<impl IntoResponse, AppError> {
    let email = normalize_email(&query.email);
    let now = Utc::now();

    let (status, verified_at) = match state.waitlist_repo.mark_verified(&email, &query.token, now).await? {
        LeadVerification::Verified { verified_at } => ("verified", verified_at),
        LeadVerification::AlreadyVerified { verified_at } => ("already_verified", verified_at.unwrap_or(now)),
        LeadVerification::Invalid => {
            return Err(AppError::Validation("Invalid or expired verification link".into()));
        }
    };

    // Only moves a commission still `pending`, so repeating it after a
    // partial failure is harmless.
    state.accrual().on_lead_verified(&email, verified_at).await?;

    Ok(Json(LeadVerifiedResponse {
        status: status.to_string(),
        verified_at: Some(verified_at),
    }))
}

pub async fn subscribe_newsletter(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewsletterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("Valid email is required".into()));
    }
    let email = normalize_email(&payload.email);

    state.marketing_service.subscribe(&email, json!({
        "signup_source": payload.signup_source.as_deref().unwrap_or("newsletter"),
        "social_handle": payload.social_handle,
    })).await?;

    info!("Newsletter subscription recorded");

    Ok(Json(json!({ "success": true })))
}

/// Failures are logged; the signup itself already succeeded.
async fn send_verification_email(state: &AppState, lead: &WaitlistLead) {
    let Some(token) = lead.verification_token.as_deref() else {
        return;
    };

    let base = format!("{}/api/v1/waitlist/verify", state.config.public_base_url.trim_end_matches('/'));
    let link = match reqwest::Url::parse_with_params(&base, &[("email", lead.email.as_str()), ("token", token)]) {
        Ok(url) => url,
        Err(e) => {
            error!("Could not build verification link: {}", e);
            return;
        }
    };

    let body = format!(
        "<p>Thanks for joining the waitlist!</p><p><a href=\"{}\">Confirm your email address</a></p>",
        link
    );

    if let Err(e) = state.email_service.send(&lead.email, "Confirm your waitlist signup", &body).await {
        error!("Failed to send verification email: {:?}", e);
    }
}

fn push_to_marketing(state: Arc<AppState>, email: String, properties: Value) {
    tokio::spawn(async move {
        match tokio::time::timeout(MARKETING_TIMEOUT, state.marketing_service.subscribe(&email, properties)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Marketing subscription failed: {:?}", e),
            Err(_) => warn!("Marketing subscription timed out"),
        }
    });
}
