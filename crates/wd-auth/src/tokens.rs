//! JWT tokens
//!
//! Every token carries a `type` claim and is only accepted where that type is
//! expected: a refresh token never authenticates a request and an access token
//! never refreshes a session.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use wd_core::config::AuthConfig;
use wd_core::{Role, WdError};
use wd_models::User;

/// Purpose of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Access,
    Refresh,
    PasswordReset,
    EmailVerification,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
            TokenKind::PasswordReset => "password_reset",
            TokenKind::EmailVerification => "email_verification",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id for access/refresh tokens, email for reset/verification tokens
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Parse `sub` as a user id
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        self.sub
            .parse()
            .map_err(|_| TokenError::Invalid("Invalid user ID in token".to_string()))
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is expired")]
    Expired,
    #[error("Expected a {expected} token, got {actual}")]
    WrongType { expected: TokenKind, actual: TokenKind },
    #[error("Invalid token: {0}")]
    Invalid(String),
    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),
}

impl From<TokenError> for WdError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::EncodingFailed(msg) => WdError::Internal(msg),
            _ => WdError::Unauthorized("Could not validate credentials".to_string()),
        }
    }
}

/// Issues and validates tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    issuer: String,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
    password_reset_lifetime: Duration,
    email_verification_lifetime: Duration,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("access_lifetime", &self.access_lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> Result<Self, TokenError> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .map_err(|e| TokenError::Invalid(format!("unsupported algorithm: {}", e)))?;
        let secret = config.secret_key.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm,
            issuer: config.issuer.clone(),
            access_lifetime: Duration::minutes(config.access_token_expire_minutes),
            refresh_lifetime: Duration::days(config.refresh_token_expire_days),
            password_reset_lifetime: Duration::hours(config.password_reset_token_expire_hours),
            email_verification_lifetime: Duration::days(
                config.email_verification_token_expire_days,
            ),
        })
    }

    pub fn access_lifetime(&self) -> Duration {
        self.access_lifetime
    }

    pub fn refresh_lifetime(&self) -> Duration {
        self.refresh_lifetime
    }

    pub fn password_reset_lifetime(&self) -> Duration {
        self.password_reset_lifetime
    }

    /// Access token lifetime in seconds, as reported to clients
    pub fn expires_in(&self) -> i64 {
        self.access_lifetime.num_seconds()
    }

    pub fn create_access_token(&self, user: &User, session_id: Uuid) -> Result<String, TokenError> {
        let mut claims = self.claims(user.id.to_string(), TokenKind::Access, self.access_lifetime);
        claims.email = Some(user.email.clone());
        claims.role = Some(user.role);
        claims.session_id = Some(session_id);
        self.sign(&claims)
    }

    /// Refresh token with a random `jti` so no two tokens are alike
    pub fn create_refresh_token(&self, user_id: Uuid, lifetime: Duration) -> Result<String, TokenError> {
        let mut claims = self.claims(user_id.to_string(), TokenKind::Refresh, lifetime);
        claims.jti = Some(random_token_id());
        self.sign(&claims)
    }

    pub fn create_password_reset_token(&self, email: &str) -> Result<String, TokenError> {
        let mut claims = self.claims(email.to_string(), TokenKind::PasswordReset, self.password_reset_lifetime);
        claims.jti = Some(random_token_id());
        self.sign(&claims)
    }

    pub fn create_email_verification_token(&self, email: &str) -> Result<String, TokenError> {
        let claims = self.claims(
            email.to_string(),
            TokenKind::EmailVerification,
            self.email_verification_lifetime,
        );
        self.sign(&claims)
    }

    /// Validate signature, expiry, issuer and token type
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.kind != expected {
            return Err(TokenError::WrongType {
                expected,
                actual: data.claims.kind,
            });
        }
        Ok(data.claims)
    }

    fn claims(&self, sub: String, kind: TokenKind, lifetime: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            sub,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
            kind,
            jti: None,
            email: None,
            role: None,
            session_id: None,
            iss: Some(self.issuer.clone()),
        }
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))
    }
}

fn random_token_id() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// SHA-256 hex digest of a token, the only form in which tokens are stored
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
