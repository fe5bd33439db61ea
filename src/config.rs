use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub public_base_url: String,
    pub admin_password: String,
    pub jwt_secret: String,
    pub auth_issuer: String,
    pub mail_service_url: String,
    pub mail_service_token: String,
    pub marketing_api_url: String,
    pub marketing_api_key: String,
    pub marketing_list_id: String,
    pub stripe_api_url: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub maturity_sweep_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            port: env::var("PORT").unwrap_or_else(|_| "3000".to_string()).parse().expect("PORT must be a number"),
            public_base_url: env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string()),
            admin_password: env::var("ADMIN_PASSWORD").expect("ADMIN_PASSWORD must be set"),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            auth_issuer: env::var("AUTH_ISSUER").unwrap_or_else(|_| "https://api.tutoring.local".to_string()),
            mail_service_url: env::var("MAIL_SERVICE_URL").unwrap_or_else(|_| "http://localhost:8000/api/v1/send".to_string()),
            mail_service_token: env::var("MAIL_SERVICE_TOKEN").unwrap_or_default(),
            marketing_api_url: env::var("MARKETING_API_URL").unwrap_or_else(|_| "https://a.klaviyo.com/api".to_string()),
            marketing_api_key: env::var("MARKETING_API_KEY").unwrap_or_default(),
            marketing_list_id: env::var("MARKETING_LIST_ID").unwrap_or_default(),
            stripe_api_url: env::var("STRIPE_API_URL").unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").unwrap_or_default(),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET").unwrap_or_default(),
            maturity_sweep_secs: env::var("MATURITY_SWEEP_SECS").unwrap_or_else(|_| "300".to_string()).parse().expect("MATURITY_SWEEP_SECS must be a number"),
        }
    }

    /// Fixed values for integration tests; outbound services point nowhere.
    pub fn for_tests(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            port: 0,
            public_base_url: "http://localhost:3000".to_string(),
            admin_password: "test-admin-password".to_string(),
            jwt_secret: "test-jwt-secret-with-enough-entropy".to_string(),
            auth_issuer: "https://api.tutoring.test".to_string(),
            mail_service_url: "http://127.0.0.1:9/send".to_string(),
            mail_service_token: String::new(),
            marketing_api_url: "http://127.0.0.1:9".to_string(),
            marketing_api_key: String::new(),
            marketing_list_id: "list".to_string(),
            stripe_api_url: "http://127.0.0.1:9".to_string(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: "whsec_test".to_string(),
            maturity_sweep_secs: 300,
        }
    }
}
