//! HS256 token minting and verification for the auth endpoints and the
//! gateway filter.

use crate::config::AuthConfig;
use crate::types::auth::Role;
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username; doubles as the `X-User-Id` value injected on proxied requests.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl_secs: i64,
}

impl TokenService {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            ttl_secs,
        }
    }

    pub fn from_config(cfg: &AuthConfig) -> Self {
        Self::new(&cfg.jwt_secret, cfg.issuer.clone(), cfg.token_ttl_secs)
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    pub fn issue(&self, username: &str, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            role,
            iat: now.timestamp(),
            exp: now.timestamp() + self.ttl_secs,
            iss: self.issuer.clone(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Verify signature, expiry and issuer, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);
        decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }
}
