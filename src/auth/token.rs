//! Stateless signed bearer tokens (JWT, HS256).
//!
//! Tokens are not stored server-side: validity is signature + expiry only.
//! Expired and tampered tokens collapse into one outward error kind.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Claims carried by every issued token.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// Authenticated user id.
    sub: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// Malformed, tampered, or expired. Callers get no finer signal.
    #[error("token inválido ou expirado")]
    Invalid,
}

/// Issues and verifies tokens against a single process-wide secret.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Sign a token whose subject is `subject`, expiring `ttl` from now.
    pub fn issue(&self, subject: &str) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = Utc::now().timestamp().max(0) as u64;
        let claims = Claims {
            sub: subject.to_owned(),
            iat,
            exp: iat + self.ttl.as_secs(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
    }

    /// Check signature and expiry; return the subject on success.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is exact; no clock-skew leeway.
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims.sub)
            .map_err(|_| TokenError::Invalid)
    }
}
