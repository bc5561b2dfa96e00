//! JWT Token Handler
//! Mission: Issue and verify signed, time-bounded identity tokens

use crate::auth::models::{Claims, TokenSubject};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
    #[error("signing secret must not be empty")]
    EmptySecret,
    #[error("token expiry out of range")]
    InvalidExpiry,
    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// HS256 token issuer/verifier.
///
/// The secret is fixed for the lifetime of the handler; keys are derived once here.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expires_in: chrono::Duration,
}

impl JwtHandler {
    /// Create a handler from the process secret and the configured validity window
    pub fn new(secret: &str, expires_in: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let expires_in = chrono::Duration::from_std(expires_in)
            .ok()
            .filter(|d| *d > chrono::Duration::zero())
            .ok_or(TokenError::InvalidExpiry)?;

        // Pin the algorithm so a token signed any other way is rejected outright.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            expires_in,
        })
    }

    /// Seconds a freshly issued token stays valid
    pub fn expires_in_secs(&self) -> i64 {
        self.expires_in.num_seconds()
    }

    /// Issue a token for `subject`, valid for the configured window from now
    pub fn issue(&self, subject: &TokenSubject) -> Result<String, TokenError> {
        self.issue_at(subject, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`
    pub fn issue_at(
        &self,
        subject: &TokenSubject,
        issued_at: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let expiration = issued_at
            .checked_add_signed(self.expires_in)
            .ok_or(TokenError::InvalidExpiry)?;

        let claims = Claims {
            user_id: subject.user_id,
            email: subject.email.clone(),
            role: subject.role,
            iat: issued_at.timestamp(),
            exp: expiration.timestamp(),
        };

        debug!(
            "Issuing JWT for {} ({}), expires {}",
            subject.email,
            subject.role,
            expiration.to_rfc3339()
        );

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Signing)
    }

    /// Validate signature and expiry, returning the embedded claims
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let decoded =
            decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                }
            })?;

        debug!("Verified JWT for user {}", decoded.claims.user_id);

        Ok(decoded.claims)
    }
}
