use serde::{Deserialize, Serialize};

pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_AMBASSADOR: &str = "AMBASSADOR";
pub const TOKEN_AUDIENCE: &str = "tutoring-frontend";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub iss: String,
    pub sub: String,
    pub aud: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
    pub role: String,
    pub csrf_token: String,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// Admins see every ambassador; ambassadors only themselves.
    pub fn can_access_ambassador(&self, ambassador_id: &str) -> bool {
        self.is_admin() || (self.role == ROLE_AMBASSADOR && self.sub == ambassador_id)
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub csrf_token: String,
    pub subject: String,
    pub role: String,
}
