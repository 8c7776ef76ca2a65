use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use alerta_db::NewUser;
use alerta_types::api::{AuthResponse, LoginRequest, RegisterRequest, UserSummary};
use alerta_types::models::User;

use crate::error::ApiError;
use crate::state::AppState;

/// Shortest password accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    // Validate input
    for (field, value) in [("first_name", &req.first_name), ("last_name", &req.last_name)] {
        if value.trim().is_empty() {
            return Err(ApiError::Validation(format!("missing required field: {field}")));
        }
    }
    if !req.email.trim().is_empty() && !req.email.contains('@') {
        return Err(ApiError::Validation("email address is malformed".into()));
    }
    if !req.password.is_empty() && req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let profile = NewUser {
        email: req.email,
        phone: req.phone,
        national_id: req.national_id,
        display_name: format!("{} {}", req.first_name.trim(), req.last_name.trim()),
    };

    // Argon2 hashing is CPU-bound; keep it off the async runtime
    let store = state.clone();
    let password = req.password;
    let user = tokio::task::spawn_blocking(move || store.identities.register(profile, &password))
        .await??;

    let token = state
        .sessions
        .issue(&user)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

    info!("{} ({}) registered", user.display_name, user.id);
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: UserSummary::from(&user),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    if req.credential.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("credential and password are required".into()));
    }

    let store = state.clone();
    // Unknown accounts and wrong passwords cost the same Argon2 work
    let user = tokio::task::spawn_blocking(move || -> Result<Option<User>, ApiError> {
        Ok(store
            .identities
            .authenticate(&req.credential, req.kind, &req.password)?)
    })
    .await??
    .ok_or(ApiError::InvalidCredentials)?;

    let token = state
        .sessions
        .issue(&user)
        .map_err(|e| ApiError::Internal(format!("token signing failed: {e}")))?;

    info!("{} ({}) logged in as {}", user.display_name, user.id, user.role);
    Ok(Json(AuthResponse {
        token,
        user: UserSummary::from(&user),
    }))
}
