#![allow(dead_code)]

use tutoring_backend::{
    api::router::create_router,
    state::AppState,
    config::Config,
    infra::factory::{sqlite_state, Integrations},
    domain::ports::{CheckoutRequest, CheckoutSession, EmailService, MarketingService, PaymentGateway},
    domain::services::billing_events::sign_payload,
    error::AppError,
};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Pool, Sqlite};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use axum::{
    body::Body,
    http::{Request, header},
    response::Response,
    Router,
};
use chrono::Utc;
use std::str::FromStr;
use async_trait::async_trait;
use tower::ServiceExt;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Default)]
pub struct MockEmailService {
    pub sent: Mutex<Vec<SentEmail>>,
}

#[async_trait]
impl EmailService for MockEmailService {
    async fn send(&self, recipient: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(SentEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MockMarketingService {
    pub fail: bool,
    pub subscribed: Mutex<Vec<String>>,
}

#[async_trait]
impl MarketingService for MockMarketingService {
    async fn subscribe(&self, email: &str, _properties: Value) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::Upstream("marketing list unavailable".into()));
        }
        self.subscribed.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

/// Serves checkout sessions registered by the test.
#[derive(Default)]
pub struct MockPaymentGateway {
    pub sessions: Mutex<HashMap<String, CheckoutSession>>,
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutSession, AppError> {
        let session = CheckoutSession {
            id: format!("cs_test_{}", Uuid::new_v4().simple()),
            url: Some("https://checkout.test/pay".to_string()),
            payment_status: Some("unpaid".to_string()),
            customer_id: None,
            subscription_id: None,
            user_id: Some(request.user_id.clone()),
            product_type: Some("subscription".to_string()),
        };
        self.sessions.lock().unwrap().insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn retrieve_checkout_session(&self, session_id: &str) -> Result<CheckoutSession, AppError> {
        self.sessions.lock().unwrap()
            .get(session_id)
            .cloned()
            .ok_or(AppError::Upstream(format!("No such checkout session: {}", session_id)))
    }
}

pub struct AuthHeaders {
    pub access_token: String,
    pub csrf_token: String,
}

pub struct TestApp {
    pub router: Router,
    pub pool: Pool<Sqlite>,
    pub db_filename: String,
    pub state: Arc<AppState>,
    pub email: Arc<MockEmailService>,
    pub marketing: Arc<MockMarketingService>,
    pub gateway: Arc<MockPaymentGateway>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_marketing(MockMarketingService::default()).await
    }

    pub async fn with_marketing(marketing: MockMarketingService) -> Self {
        let db_filename = format!("test_{}.db", Uuid::new_v4());
        let db_url = format!("sqlite://{}?mode=rwc", db_filename);

        let connection_options = SqliteConnectOptions::from_str(&db_url)
            .unwrap()
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(connection_options)
            .await
            .expect("Failed to connect to test db");

        sqlx::migrate!("./migrations/sqlite")
            .run(&pool)
            .await
            .expect("Failed to migrate test db");

        let config = Config::for_tests(&db_url);
        let email = Arc::new(MockEmailService::default());
        let marketing = Arc::new(marketing);
        let gateway = Arc::new(MockPaymentGateway::default());

        let integrations = Integrations {
            email_service: email.clone(),
            marketing_service: marketing.clone(),
            payment_gateway: gateway.clone(),
        };

        let state = Arc::new(sqlite_state(&config, pool.clone(), integrations));
        let router = create_router(state.clone());

        Self {
            router,
            pool,
            db_filename,
            state,
            email,
            marketing,
            gateway,
        }
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>, auth: Option<&AuthHeaders>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder
                .header(header::COOKIE, format!("access_token={}", auth.access_token))
                .header("X-CSRF-Token", &auth.csrf_token);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    pub async fn admin_login(&self) -> AuthHeaders {
        let response = self.request(
            "POST",
            "/api/v1/admin/login",
            Some(json!({ "password": self.state.config.admin_password })),
            None,
        ).await;
        session_from_response(response).await
    }

    pub async fn ambassador_login(&self, email: &str, referral_code: &str) -> AuthHeaders {
        let response = self.request(
            "POST",
            "/api/v1/ambassadors/login",
            Some(json!({ "email": email, "referral_code": referral_code })),
            None,
        ).await;
        session_from_response(response).await
    }

    /// Returns `(ambassador_id, referral_code)`.
    pub async fn register_ambassador(&self, email: &str) -> (String, String) {
        let response = self.request("POST", "/api/v1/ambassadors", Some(json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": email,
            "social_handle": "@ada",
            "discord_handle": "ada#0001",
            "country": "United Kingdom"
        })), None).await;

        if !response.status().is_success() {
            panic!("Ambassador registration failed in test helper: status {}", response.status());
        }
        let body = parse_body(response).await;
        (
            body["ambassador_id"].as_str().unwrap().to_string(),
            body["referral_code"].as_str().unwrap().to_string(),
        )
    }

    pub async fn join_waitlist(&self, email: &str, referral_code: Option<&str>) -> Response {
        self.request("POST", "/api/v1/waitlist", Some(json!({
            "email": email,
            "referral_code": referral_code
        })), None).await
    }

    pub async fn send_webhook(&self, event: Value) -> Response {
        let payload = event.to_string();
        let signature = sign_payload(
            payload.as_bytes(),
            &self.state.config.stripe_webhook_secret,
            Utc::now().timestamp(),
        ).unwrap();

        self.router.clone().oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/billing/webhook")
                .header(header::CONTENT_TYPE, "application/json")
                .header("Stripe-Signature", signature)
                .body(Body::from(payload))
                .unwrap()
        ).await.unwrap()
    }
}

async fn session_from_response(response: Response) -> AuthHeaders {
    if !response.status().is_success() {
        panic!("Login failed in test helper: status {}", response.status());
    }

    let cookies: Vec<String> = response.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|h| h.to_str().unwrap().to_string())
        .collect();

    let access_token_cookie = cookies.iter()
        .find(|c| c.contains("access_token="))
        .expect("No access_token cookie returned");

    let start = access_token_cookie.find("access_token=").unwrap() + 13;
    let end = access_token_cookie[start..].find(';').unwrap_or(access_token_cookie.len() - start);
    let access_token = access_token_cookie[start..start + end].to_string();

    let body_json = parse_body(response).await;
    let csrf_token = body_json["csrf_token"].as_str().expect("No csrf_token in body").to_string();

    AuthHeaders {
        access_token,
        csrf_token,
    }
}

pub async fn parse_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_filename);
        let _ = std::fs::remove_file(format!("{}-wal", self.db_filename));
        let _ = std::fs::remove_file(format!("{}-shm", self.db_filename));
    }
}
