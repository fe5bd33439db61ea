use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::state::AppState;
use crate::api::dtos::requests::TrackReferralRequest;
use crate::domain::models::waitlist::is_valid_email;
use crate::error::AppError;

/// Called by the student app right after account creation.
pub async fn track_referral(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<TrackReferralRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.user_id.trim().is_empty() {
        return Err(AppError::Validation("user_id is required".into()));
    }
    if !is_valid_email(&payload.email) {
        return Err(AppError::Validation("Valid email is required".into()));
    }

    let outcome = state.ledger()
        .register_student(payload.user_id.trim(), &payload.email, payload.referral_code.as_deref())
        .await?;

    Ok(Json(outcome))
}
