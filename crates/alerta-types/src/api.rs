use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CredentialKind, Report, Role, User};

// -- JWT Claims --

/// Session token claims shared by the REST middleware and the WebSocket
/// gateway handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub first_name: String,
    pub last_name: String,
    pub national_id: String,
    pub phone: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub credential: String,
    pub kind: CredentialKind,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub display_name: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            display_name: user.display_name.clone(),
            role: user.role,
        }
    }
}

/// Returned by both login and register.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserSummary,
}

// -- Reports --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStatusRequest {
    /// Parsed at the handler so unknown literals surface as `invalid_status`.
    pub status: String,
}

/// Admin listing row: the report plus its owner's display name.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    pub owner_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteReportResponse {
    pub success: bool,
    pub id: Uuid,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
