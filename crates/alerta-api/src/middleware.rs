use axum::{
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::Response,
};

use alerta_types::models::{Principal, Role};

use crate::error::ApiError;
use crate::session::{SessionError, SessionIssuer};
use crate::state::AppState;

/// Resolve the `Authorization` header to a principal.
///
/// A missing header is `Missing`; anything that is not `Bearer <token>` is
/// `Malformed`; the token itself is checked by the session issuer.
pub fn authenticate(
    raw_header: Option<&HeaderValue>,
    sessions: &SessionIssuer,
) -> Result<Principal, SessionError> {
    let value = raw_header.ok_or(SessionError::Missing)?;
    let value = value.to_str().map_err(|_| SessionError::Malformed)?;
    // The scheme name is case-insensitive
    let (scheme, token) = value.split_once(' ').ok_or(SessionError::Malformed)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(SessionError::Malformed);
    }

    sessions.verify(token.trim())
}

/// Reject callers whose role is not `role`.
pub fn require_role(principal: &Principal, role: Role) -> Result<(), ApiError> {
    if principal.role == role {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

/// Extract and validate the session token, then attach the `Principal` to
/// the request for handlers to take as `Extension<Principal>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = authenticate(req.headers().get(header::AUTHORIZATION), &state.sessions)?;

    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
