use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use alerta_gateway::TokenVerifier;
use alerta_types::api::Claims;
use alerta_types::models::{Principal, Role, User};

/// Fixed session lifetime. There is no refresh; clients log in again.
pub const SESSION_TTL_HOURS: i64 = 2;

/// Why a presented token was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("authorization token missing")]
    Missing,
    #[error("authorization token malformed")]
    Malformed,
    #[error("authorization token expired")]
    Expired,
    #[error("authorization token signature invalid")]
    BadSignature,
}

impl SessionError {
    pub fn code(self) -> &'static str {
        match self {
            Self::Missing => "token_missing",
            Self::Malformed => "token_malformed",
            Self::Expired => "token_expired",
            Self::BadSignature => "token_bad_signature",
        }
    }
}

/// Issues and verifies HS256 session tokens. The server keeps no session
/// table: a token is valid exactly while its signature checks out and it
/// has not expired.
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(SESSION_TTL_HOURS),
        }
    }

    pub fn issue(&self, user: &User) -> anyhow::Result<String> {
        self.issue_at(user.id, user.role, Utc::now())
    }

    /// Issue a token as if at `issued_at`. Expiry is `issued_at` plus the
    /// session lifetime.
    pub fn issue_at(
        &self,
        subject_id: Uuid,
        role: Role,
        issued_at: DateTime<Utc>,
    ) -> anyhow::Result<String> {
        let claims = Claims {
            sub: subject_id,
            role,
            iat: issued_at.timestamp() as usize,
            exp: (issued_at + self.ttl).timestamp() as usize,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Principal, SessionError> {
        if token.is_empty() {
            return Err(SessionError::Missing);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                ErrorKind::InvalidSignature => SessionError::BadSignature,
                _ => SessionError::Malformed,
            }
        })?;

        Ok(Principal {
            subject_id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

impl TokenVerifier for SessionIssuer {
    fn verify_token(&self, token: &str) -> Option<Principal> {
        self.verify(token).ok()
    }
}
