use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;
use crate::api::dtos::{
    requests::{CreateCheckoutRequest, VerifyCheckoutRequest},
    responses::{CheckoutResponse, CheckoutVerifiedResponse},
};
use crate::domain::models::waitlist::is_valid_email;
use crate::domain::ports::CheckoutRequest;
use crate::domain::services::billing_events::WebhookOutcome;
use crate::error::AppError;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.price_id.trim().is_empty() || payload.user_id.trim().is_empty() {
        return Err(AppError::Validation("price_id and user_id are required".into()));
    }
    if !is_valid_email(&payload.user_email) {
        return Err(AppError::Validation("Valid email is required".into()));
    }

    let base = state.config.public_base_url.trim_end_matches('/');
    let request = CheckoutRequest {
        price_id: payload.price_id,
        user_id: payload.user_id,
        user_email: payload.user_email,
        success_url: payload.success_url
            .unwrap_or_else(|| format!("{}/success?session_id={{CHECKOUT_SESSION_ID}}", base)),
        cancel_url: payload.cancel_url.unwrap_or_else(|| format!("{}/pricing", base)),
        quantity: payload.quantity.unwrap_or(1).max(1),
    };

    state.student_repo.upsert_profile(&request.user_id, Some(&request.user_email)).await?;
    let session = state.payment_gateway.create_checkout_session(&request).await?;

    info!(session_id = %session.id, "Checkout session created for student: {}", request.user_id);

    Ok(Json(CheckoutResponse { id: session.id, url: session.url }))
}

pub async fn verify_checkout(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<VerifyCheckoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = state.payment_gateway.retrieve_checkout_session(&payload.session_id).await?;

    if session.payment_status.as_deref() != Some("paid") {
        return Err(AppError::Validation("Payment not completed".into()));
    }
    if session.user_id.as_deref() != Some(payload.user_id.as_str()) {
        return Err(AppError::Forbidden("Checkout session belongs to another user".into()));
    }

    state.student_repo.upsert_profile(&payload.user_id, None).await?;
    state.student_repo.activate(
        &payload.user_id,
        session.customer_id.as_deref(),
        session.subscription_id.as_deref(),
        session.product_type.as_deref(),
    ).await?;

    info!("Checkout verified, student activated: {}", payload.user_id);

    Ok(Json(CheckoutVerifiedResponse {
        success: true,
        product_type: session.product_type.unwrap_or_else(|| "subscription".to_string()),
        subscription_id: session.subscription_id,
    }))
}

/// Takes the raw body: the signature covers the exact bytes sent.
pub async fn handle_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers.get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Validation("Missing Stripe-Signature header".into()))?;

    let outcome = state.billing_events()
        .handle_webhook(&body, signature, &state.config.stripe_webhook_secret, Utc::now())
        .await?;

    Ok(Json(json!({
        "received": true,
        "duplicate": outcome == WebhookOutcome::Duplicate,
    })))
}
