use axum::{
    body::Body,
    extract::Request,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use crate::state::AppState;
use crate::api::handlers::{admin, ambassador, auth, billing, health, referral, waitlist};
use tower_http::{
    trace::TraceLayer,
    classify::ServerErrorsFailureClass,
};
use tower_cookies::CookieManagerLayer;
use tracing::{info_span, Span, error, info};
use uuid::Uuid;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))

        // Ambassadors
        .route("/api/v1/ambassadors", post(ambassador::register_ambassador))
        .route("/api/v1/ambassadors/login", post(auth::ambassador_login))
        .route("/api/v1/ambassadors/{id}/dashboard", get(ambassador::get_dashboard))
        .route("/api/v1/ambassadors/{id}/payout-details", put(ambassador::update_payout_details))
        .route("/api/v1/ambassadors/{id}/onboarding", post(ambassador::record_onboarding))

        // Waitlist & Marketing
        .route("/api/v1/waitlist", post(waitlist::join_waitlist).get(waitlist::waitlist_count))
        .route("/api/v1/waitlist/verify", get(waitlist::verify_lead))
        .route("/api/v1/newsletter", post(waitlist::subscribe_newsletter))

        // Students
        .route("/api/v1/referrals/track", post(referral::track_referral))

        // Billing
        .route("/api/v1/billing/checkout", post(billing::create_checkout))
        .route("/api/v1/billing/checkout/verify", post(billing::verify_checkout))
        .route("/api/v1/billing/webhook", post(billing::handle_webhook))

        // Admin
        .route("/api/v1/admin/login", post(auth::admin_login))
        .route("/api/v1/admin/payouts", get(admin::list_payouts))
        .route("/api/v1/admin/ambassadors/{id}", get(admin::get_ambassador))
        .route("/api/v1/admin/ambassadors/{id}/receipts", post(admin::issue_receipt).get(admin::list_receipts))
        .route("/api/v1/admin/commissions/mature", post(admin::mature_commissions))

        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    let request_id = Uuid::new_v4().to_string();
                    info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = ?request.method(),
                        path = %request.uri().path(),
                        version = ?request.version(),
                        subject = tracing::field::Empty,
                        role = tracing::field::Empty,
                    )
                })
                .on_request(|request: &Request<Body>, _span: &Span| {
                    info!("started processing request: {} {}", request.method(), request.uri().path());
                })
                .on_response(|response: &axum::http::Response<Body>, latency: Duration, _span: &Span| {
                    info!(
                        status = response.status().as_u16(),
                        latency_ms = latency.as_millis(),
                        "finished processing request"
                    );
                })
                .on_failure(|error: ServerErrorsFailureClass, _latency: Duration, _span: &Span| {
                    error!("request failed: {:?}", error);
                })
        )
        .layer(CookieManagerLayer::new())
        .with_state(state)
}
