use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use sqlx::{postgres::{PgPoolOptions, PgConnectOptions}, sqlite::{SqlitePoolOptions, SqliteJournalMode, SqliteConnectOptions}};
use sqlx::{PgPool, SqlitePool, ConnectOptions};
use tracing::info;
use tracing::log::LevelFilter;

use crate::config::Config;
use crate::state::AppState;
use crate::domain::ports::{EmailService, MarketingService, PaymentGateway};
use crate::domain::services::auth_service::AuthService;
use crate::infra::billing::stripe_gateway::StripeGateway;
use crate::infra::email::http_email_service::HttpEmailService;
use crate::infra::marketing::klaviyo_service::KlaviyoService;
use crate::infra::repositories::{
    postgres_ambassador_repo::PostgresAmbassadorRepo, postgres_commission_repo::PostgresCommissionRepo,
    postgres_receipt_repo::PostgresReceiptRepo, postgres_referral_repo::PostgresReferralRepo,
    postgres_student_repo::PostgresStudentRepo, postgres_waitlist_repo::PostgresWaitlistRepo,
    sqlite_ambassador_repo::SqliteAmbassadorRepo, sqlite_commission_repo::SqliteCommissionRepo,
    sqlite_receipt_repo::SqliteReceiptRepo, sqlite_referral_repo::SqliteReferralRepo,
    sqlite_student_repo::SqliteStudentRepo, sqlite_waitlist_repo::SqliteWaitlistRepo,
};

/// Outbound HTTP integrations, swappable in tests.
pub struct Integrations {
    pub email_service: Arc<dyn EmailService>,
    pub marketing_service: Arc<dyn MarketingService>,
    pub payment_gateway: Arc<dyn PaymentGateway>,
}

impl Integrations {
    pub fn from_config(config: &Config) -> Self {
        Self {
            email_service: Arc::new(HttpEmailService::new(
                config.mail_service_url.clone(),
                config.mail_service_token.clone(),
            )),
            marketing_service: Arc::new(KlaviyoService::new(
                config.marketing_api_url.clone(),
                config.marketing_api_key.clone(),
                config.marketing_list_id.clone(),
            )),
            payment_gateway: Arc::new(StripeGateway::new(
                config.stripe_api_url.clone(),
                config.stripe_secret_key.clone(),
            )),
        }
    }
}

pub async fn bootstrap_state(config: &Config) -> AppState {
    let database_url = &config.database_url;
    let integrations = Integrations::from_config(config);

    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        info!("Initializing PostgreSQL connection...");

        let mut opts: PgConnectOptions = database_url.parse().expect("Invalid Postgres URL");
        opts = opts.log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_with(opts)
            .await
            .expect("Failed to connect to Postgres");

        run_postgres_migrations(&pool).await;
        postgres_state(config, pool, integrations)
    } else {
        info!("Initializing SQLite connection with WAL Mode...");

        let opts = SqliteConnectOptions::from_str(database_url)
            .expect("Invalid SQLite connection string")
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .log_statements(LevelFilter::Debug)
            .log_slow_statements(LevelFilter::Warn, Duration::from_millis(500));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await
            .expect("Failed to connect to SQLite");

        run_sqlite_migrations(&pool).await;
        sqlite_state(config, pool, integrations)
    }
}

pub fn postgres_state(config: &Config, pool: PgPool, integrations: Integrations) -> AppState {
    AppState {
        config: config.clone(),
        ambassador_repo: Arc::new(PostgresAmbassadorRepo::new(pool.clone())),
        waitlist_repo: Arc::new(PostgresWaitlistRepo::new(pool.clone())),
        commission_repo: Arc::new(PostgresCommissionRepo::new(pool.clone())),
        referral_repo: Arc::new(PostgresReferralRepo::new(pool.clone())),
        student_repo: Arc::new(PostgresStudentRepo::new(pool.clone())),
        receipt_repo: Arc::new(PostgresReceiptRepo::new(pool)),
        auth_service: Arc::new(AuthService::new(config)),
        email_service: integrations.email_service,
        marketing_service: integrations.marketing_service,
        payment_gateway: integrations.payment_gateway,
    }
}

pub fn sqlite_state(config: &Config, pool: SqlitePool, integrations: Integrations) -> AppState {
    AppState {
        config: config.clone(),
        ambassador_repo: Arc::new(SqliteAmbassadorRepo::new(pool.clone())),
        waitlist_repo: Arc::new(SqliteWaitlistRepo::new(pool.clone())),
        commission_repo: Arc::new(SqliteCommissionRepo::new(pool.clone())),
        referral_repo: Arc::new(SqliteReferralRepo::new(pool.clone())),
        student_repo: Arc::new(SqliteStudentRepo::new(pool.clone())),
        receipt_repo: Arc::new(SqliteReceiptRepo::new(pool)),
        auth_service: Arc::new(AuthService::new(config)),
        email_service: integrations.email_service,
        marketing_service: integrations.marketing_service,
        payment_gateway: integrations.payment_gateway,
    }
}

async fn run_postgres_migrations(pool: &PgPool) {
    sqlx::migrate!("./migrations/postgres")
        .run(pool)
        .await
        .expect("Failed to run Postgres migrations");
}

async fn run_sqlite_migrations(pool: &SqlitePool) {
    sqlx::migrate!("./migrations/sqlite")
        .run(pool)
        .await
        .expect("Failed to run SQLite migrations");
}
