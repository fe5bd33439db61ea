use axum::{extract::{State, Path}, response::IntoResponse, http::StatusCode, Json};
use chrono::Utc;
use crate::state::AppState;
use crate::api::dtos::{
    requests::{OnboardingRequest, RegisterAmbassadorRequest},
    responses::{AmbassadorCreatedResponse, DashboardResponse, OnboardingProgress, Phase1Stats, Phase2Stats},
};
use crate::api::extractors::auth::AuthSession;
use crate::domain::models::{
    ambassador::{NewAmbassadorParams, OnboardingStage, PayoutDetails},
    waitlist::is_valid_email,
};
use crate::domain::services::payout::{build_statement, next_payout_date};
use std::sync::Arc;
use crate::error::AppError;
use tracing::info;

pub async fn register_ambassador(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterAmbassadorRequest>,
) -> Result<impl IntoResponse, AppError> {
    let required = [
        ("first_name", &payload.first_name),
        ("last_name", &payload.last_name),
        ("email", &payload.email),
        ("social_handle", &payload.social_handle),
        ("discord_handle", &payload.discord_handle),
        ("country", &payload.country),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(AppError::Validation(format!("{} is required", field)));
    }
    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("Valid email is required".into()));
    }

    let ambassador = state.ledger().register_ambassador(NewAmbassadorParams {
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
        email: payload.email,
        social_handle: Some(payload.social_handle.trim().to_string()),
        discord_handle: Some(payload.discord_handle.trim().to_string()),
        country: Some(payload.country.trim().to_string()),
    }).await?;

    Ok((StatusCode::CREATED, Json(AmbassadorCreatedResponse {
        ambassador_id: ambassador.id,
        referral_code: ambassador.referral_code,
    })))
}

pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    AuthSession(claims): AuthSession,
    Path(ambassador_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.can_access_ambassador(&ambassador_id) {
        return Err(AppError::Forbidden("Access denied".into()));
    }

    let ambassador = state.ambassador_repo.find_by_id(&ambassador_id).await?
        .ok_or(AppError::NotFound("Ambassador not found".into()))?;

    let now = Utc::now();
    let waitlist = state.commission_repo.list_waitlist_by_ambassador(&ambassador.id).await?;
    let monthly = state.commission_repo.list_monthly_by_ambassador(&ambassador.id).await?;
    let referrals = state.referral_repo.list_by_ambassador(&ambassador.id).await?;

    let statement = build_statement(&ambassador.id, &waitlist, &monthly, now);

    Ok(Json(DashboardResponse {
        ambassador_id: ambassador.id.clone(),
        first_name: ambassador.first_name.clone(),
        last_name: ambassador.last_name.clone(),
        referral_code: ambassador.referral_code.clone(),
        leads_acquired: ambassador.leads_acquired,
        total_paid_pence: ambassador.total_paid_pence,
        onboarding: OnboardingProgress::from(&ambassador),
        phase1: Phase1Stats::from_commissions(&waitlist, now),
        phase2: Phase2Stats::from_records(&monthly, &referrals),
        statement,
        next_payout_date: next_payout_date(now.date_naive()),
        referrals,
        waitlist_commissions: waitlist,
    }))
}

pub async fn update_payout_details(
    State(state): State<Arc<AppState>>,
    AuthSession(claims): AuthSession,
    Path(ambassador_id): Path<String>,
    Json(payload): Json<PayoutDetails>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.can_access_ambassador(&ambassador_id) {
        return Err(AppError::Forbidden("Access denied".into()));
    }
    if payload.payout_method.as_deref().is_some_and(|m| m.trim().is_empty()) {
        return Err(AppError::Validation("payout_method cannot be empty".into()));
    }

    let updated = state.ambassador_repo.update_payout_details(&ambassador_id, &payload).await?;
    info!("Payout details updated for ambassador: {}", updated.id);

    Ok(Json(updated))
}

pub async fn record_onboarding(
    State(state): State<Arc<AppState>>,
    AuthSession(claims): AuthSession,
    Path(ambassador_id): Path<String>,
    Json(payload): Json<OnboardingRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.can_access_ambassador(&ambassador_id) {
        return Err(AppError::Forbidden("Access denied".into()));
    }

    let stage = OnboardingStage::parse(&payload.stage)
        .ok_or(AppError::Validation("Invalid onboarding stage".into()))?;

    if matches!(stage, OnboardingStage::Terms | OnboardingStage::Consent) && payload.form_data.is_none() {
        return Err(AppError::Validation("form_data is required for this stage".into()));
    }

    state.ambassador_repo.record_onboarding(&ambassador_id, stage, payload.form_data).await?;
    info!(stage = %payload.stage, "Onboarding stage recorded for ambassador: {}", ambassador_id);

    let ambassador = state.ambassador_repo.find_by_id(&ambassador_id).await?
        .ok_or(AppError::NotFound("Ambassador not found".into()))?;

    Ok(Json(OnboardingProgress::from(&ambassador)))
}
