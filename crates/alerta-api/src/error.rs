use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use alerta_db::{IdentityError, StoreError};
use alerta_types::api::ErrorBody;
use alerta_types::models::{LocationError, ReportStatus, StatusParseError};

use crate::media::MediaError;
use crate::session::SessionError;

/// API error type mapping to HTTP status codes.
///
/// The response body is `{"error": <code>, "message": <text>}` so clients
/// can branch on the code and show the message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    UnknownStatus(#[from] StatusParseError),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("email already registered")]
    DuplicateEmail,
    #[error("phone already registered")]
    DuplicatePhone,
    #[error("national id already registered")]
    DuplicateNationalId,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Unauthorized(#[from] SessionError),
    #[error("operation requires the admin role")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("cannot move report from {from} to {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownStatus(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::DuplicateEmail | Self::DuplicatePhone | Self::DuplicateNationalId => {
                StatusCode::CONFLICT
            }
            Self::InvalidCredentials | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnknownStatus(_) => "invalid_status",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::DuplicateEmail => "duplicate_email",
            Self::DuplicatePhone => "duplicate_phone",
            Self::DuplicateNationalId => "duplicate_national_id",
            Self::InvalidCredentials => "invalid_credentials",
            Self::Unauthorized(reason) => reason.code(),
            Self::Forbidden => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::InvalidTransition { .. } => "invalid_status_transition",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                error!("Internal error: {}", detail);
                "internal server error".to_string()
            }
            other => {
                warn!("Request rejected ({}): {}", other.code(), other);
                other.to_string()
            }
        };

        let body = ErrorBody {
            error: self.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::MissingField(field) => {
                Self::Validation(format!("missing required field: {field}"))
            }
            IdentityError::DuplicateEmail => Self::DuplicateEmail,
            IdentityError::DuplicatePhone => Self::DuplicatePhone,
            IdentityError::DuplicateNationalId => Self::DuplicateNationalId,
            other @ (IdentityError::Hash(_) | IdentityError::LockPoisoned) => {
                Self::Internal(other.to_string())
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(format!("report {id} not found")),
            StoreError::InvalidStatus { from, to } => Self::InvalidTransition { from, to },
            e @ (StoreError::MissingCategory | StoreError::TooManyMedia(_)) => {
                Self::Validation(e.to_string())
            }
            StoreError::LockPoisoned => Self::Internal(e.to_string()),
        }
    }
}

impl From<LocationError> for ApiError {
    fn from(e: LocationError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::TooLarge { .. } => Self::PayloadTooLarge(e.to_string()),
            MediaError::Empty => Self::Validation(e.to_string()),
            MediaError::Io(io) => Self::Internal(format!("media storage: {io}")),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::Validation(e.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        Self::Validation(e.body_text())
    }
}

/// Report ids that do not parse cannot name a stored report.
impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::NotFound(e.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("spawn_blocking join error: {e}"))
    }
}
