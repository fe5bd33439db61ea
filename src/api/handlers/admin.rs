use axum::{extract::{State, Path}, response::IntoResponse, http::StatusCode, Json};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;
use crate::api::dtos::{
    requests::IssueReceiptRequest,
    responses::{AdminAmbassadorResponse, AdminPayoutsResponse, MaturityResponse, PayoutRow, PayoutSummary, ReceiptResponse},
};
use crate::api::extractors::auth::AdminSession;
use crate::background::run_maturity_sweep;
use crate::domain::models::payout::format_pence;
use crate::domain::services::payout::{build_statement, next_payout_date};
use crate::error::AppError;

pub async fn list_payouts(
    State(state): State<Arc<AppState>>,
    AdminSession(_claims): AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let payouts = state.payouts().list_all_payouts(now).await?;

    let rows: Vec<PayoutRow> = payouts.iter().map(PayoutRow::from).collect();
    let summary = PayoutSummary::from_rows(&rows, next_payout_date(now.date_naive()), now);

    Ok(Json(AdminPayoutsResponse { payouts: rows, summary }))
}

pub async fn get_ambassador(
    State(state): State<Arc<AppState>>,
    AdminSession(_claims): AdminSession,
    Path(ambassador_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ambassador = state.ambassador_repo.find_by_id(&ambassador_id).await?
        .ok_or(AppError::NotFound("Ambassador not found".into()))?;

    let waitlist = state.commission_repo.list_waitlist_by_ambassador(&ambassador.id).await?;
    let monthly = state.commission_repo.list_monthly_by_ambassador(&ambassador.id).await?;
    let referrals = state.referral_repo.list_by_ambassador(&ambassador.id).await?;
    let receipts = state.receipt_repo.list_by_ambassador(&ambassador.id).await?;
    let statement = build_statement(&ambassador.id, &waitlist, &monthly, Utc::now());

    Ok(Json(AdminAmbassadorResponse {
        ambassador,
        statement,
        waitlist_commissions: waitlist,
        monthly_commissions: monthly,
        referrals,
        receipts,
    }))
}

pub async fn issue_receipt(
    State(state): State<Arc<AppState>>,
    AdminSession(claims): AdminSession,
    Path(ambassador_id): Path<String>,
    Json(payload): Json<IssueReceiptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let payment_date = payload.payment_date.unwrap_or_else(|| Utc::now().date_naive());

    let issued = state.receipts().issue_receipt(&ambassador_id, payment_date).await?;

    info!(
        issued_by = %claims.sub,
        receipt_number = %issued.receipt.receipt_number,
        "Receipt issued for ambassador: {}", ambassador_id
    );

    Ok((StatusCode::CREATED, Json(ReceiptResponse {
        total_formatted: format_pence(issued.receipt.total_pence),
        settled_commissions: issued.settled_commissions,
        receipt: issued.receipt,
    })))
}

pub async fn list_receipts(
    State(state): State<Arc<AppState>>,
    AdminSession(_claims): AdminSession,
    Path(ambassador_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    if state.ambassador_repo.find_by_id(&ambassador_id).await?.is_none() {
        return Err(AppError::NotFound("Ambassador not found".into()));
    }
    let receipts = state.receipt_repo.list_by_ambassador(&ambassador_id).await?;
    Ok(Json(receipts))
}

pub async fn mature_commissions(
    State(state): State<Arc<AppState>>,
    AdminSession(_claims): AdminSession,
) -> Result<impl IntoResponse, AppError> {
    let matured = run_maturity_sweep(&state).await?;
    Ok(Json(MaturityResponse { matured }))
}
