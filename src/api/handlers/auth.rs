use axum::{extract::State, response::IntoResponse, Json};
use crate::state::AppState;
use crate::error::AppError;
use crate::api::dtos::requests::{AdminLoginRequest, AmbassadorLoginRequest};
use crate::api::extractors::auth::ACCESS_TOKEN_COOKIE;
use crate::domain::models::{auth::SessionResponse, waitlist::normalize_email};
use crate::domain::services::auth_service::{IssuedSession, SESSION_TTL_HOURS};
use crate::domain::services::referral_code::normalize_referral_code;
use std::sync::Arc;
use tower_cookies::{Cookies, Cookie};
use tower_cookies::cookie::SameSite;
use time::Duration;
use tracing::{info, warn};

pub async fn admin_login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !state.auth_service.verify_admin_password(&payload.password) {
        warn!("Rejected admin login attempt");
        return Err(AppError::Unauthorized);
    }

    let session = state.auth_service.admin_session()?;
    set_session_cookie(&cookies, &session.access_token);

    info!("Admin logged in");

    Ok(Json(session_response(session)))
}

/// Ambassadors sign in with their email and referral code.
pub async fn ambassador_login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Json(payload): Json<AmbassadorLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let code = normalize_referral_code(&payload.referral_code)
        .ok_or(AppError::Unauthorized)?;

    let ambassador = state.ambassador_repo
        .find_by_login(&normalize_email(&payload.email), &code)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let session = state.auth_service.ambassador_session(&ambassador.id)?;
    set_session_cookie(&cookies, &session.access_token);

    info!("Ambassador logged in: {}", ambassador.id);

    Ok(Json(session_response(session)))
}

fn session_response(session: IssuedSession) -> SessionResponse {
    SessionResponse {
        csrf_token: session.csrf_token,
        subject: session.claims.sub,
        role: session.claims.role,
    }
}

fn set_session_cookie(cookies: &Cookies, access: &str) {
    let mut access_c = Cookie::new(ACCESS_TOKEN_COOKIE, access.to_string());
    access_c.set_http_only(true);
    access_c.set_secure(true);
    access_c.set_same_site(SameSite::Strict);
    access_c.set_path("/");
    access_c.set_max_age(Duration::hours(SESSION_TTL_HOURS));
    cookies.add(access_c);
}
