use crate::domain::models::auth::{Claims, ROLE_ADMIN, ROLE_AMBASSADOR, TOKEN_AUDIENCE};
use crate::error::AppError;
use crate::config::Config;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;
use chrono::{Utc, Duration};
use hmac::{Hmac, Mac};
use rand::{distributions::Alphanumeric, Rng};
use sha2::Sha256;

pub const SESSION_TTL_HOURS: i64 = 12;

pub struct IssuedSession {
    pub access_token: String,
    pub csrf_token: String,
    pub claims: Claims,
}

pub struct AuthService {
    issuer: String,
    admin_password: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(config: &Config) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            issuer: config.auth_issuer.clone(),
            admin_password: config.admin_password.clone(),
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Constant-time comparison: both sides are MACed under the session key and
    /// the tags compared with `verify_slice`.
    pub fn verify_admin_password(&self, candidate: &str) -> bool {
        if self.admin_password.is_empty() {
            return false;
        }
        let Ok(mut expected) = Hmac::<Sha256>::new_from_slice(self.issuer.as_bytes()) else {
            return false;
        };
        expected.update(self.admin_password.as_bytes());
        let expected = expected.finalize().into_bytes();

        let Ok(mut given) = Hmac::<Sha256>::new_from_slice(self.issuer.as_bytes()) else {
            return false;
        };
        given.update(candidate.as_bytes());
        given.verify_slice(&expected).is_ok()
    }

    pub fn admin_session(&self) -> Result<IssuedSession, AppError> {
        self.issue("admin", ROLE_ADMIN)
    }

    pub fn ambassador_session(&self, ambassador_id: &str) -> Result<IssuedSession, AppError> {
        self.issue(ambassador_id, ROLE_AMBASSADOR)
    }

    fn issue(&self, subject: &str, role: &str) -> Result<IssuedSession, AppError> {
        let csrf_token: String = rand::thread_rng().sample_iter(&Alphanumeric).take(32).map(char::from).collect();
        let now = Utc::now();

        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            exp: (now + Duration::hours(SESSION_TTL_HOURS)).timestamp() as usize,
            iat: now.timestamp() as usize,
            jti: Uuid::new_v4().to_string(),
            role: role.to_string(),
            csrf_token: csrf_token.clone(),
        };

        let access_token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| {
                tracing::error!("JWT encoding failed: {}", e);
                AppError::Internal
            })?;

        Ok(IssuedSession { access_token, csrf_token, claims })
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);
        validation.set_issuer(&[self.issuer.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT rejected: {}", e);
                AppError::Unauthorized
            })
    }
}
