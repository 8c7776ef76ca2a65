use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Upper bound on media attachments per report.
pub const MAX_MEDIA_PER_REPORT: usize = 5;

/// Conventional category tags. Any non-empty tag is accepted; these are the
/// ones the clients offer by default.
pub mod categories {
    pub const ROBBERY: &str = "robbery";
    pub const ASSAULT: &str = "assault";
    pub const VANDALISM: &str = "vandalism";
    pub const ACCIDENT: &str = "accident";
    pub const SUSPICIOUS_ACTIVITY: &str = "suspicious_activity";
    pub const OTHER: &str = "other";

    pub const ALL: &[&str] = &[
        ROBBERY,
        ASSAULT,
        VANDALISM,
        ACCIDENT,
        SUSPICIOUS_ACTIVITY,
        OTHER,
    ];
}

// -- Users --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Citizen => f.write_str("citizen"),
            Self::Admin => f.write_str("admin"),
        }
    }
}

/// Which credential a login attempt identifies the user by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Email,
    Phone,
}

/// A registered account. The credential hash is kept by the identity store
/// and never appears on this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub national_id: String,
    pub role: Role,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity attached to a request or gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub subject_id: Uuid,
    pub role: Role,
}

// -- Reports --

/// Lifecycle state of a report.
///
/// `pending` is initial and `resolved` is terminal. Admins may move a
/// pending report straight to `resolved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [Self::Pending, Self::InProgress, Self::Resolved];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }

    /// Whether `self -> next` is an edge of the lifecycle. Same-status
    /// requests are not edges; callers treat them as no-ops.
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::Pending, Self::Resolved)
                | (Self::InProgress, Self::Resolved)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Resolved
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown report status: {0:?}")]
pub struct StatusParseError(pub String);

impl FromStr for ReportStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            other => Err(StatusParseError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("latitude and longitude must be supplied together")]
    HalfSpecified,
    #[error("coordinates must be finite numbers")]
    NotFinite,
    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// A geographic point. Both coordinates are always present.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Result<Self, LocationError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(LocationError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(LocationError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(LocationError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    /// Build an optional location from independently supplied coordinates.
    /// Neither present is `None`; exactly one present is an error.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Self>, LocationError> {
        match (lat, lng) {
            (None, None) => Ok(None),
            (Some(lat), Some(lng)) => Self::new(lat, lng).map(Some),
            _ => Err(LocationError::HalfSpecified),
        }
    }
}

/// An incident report as held by the report store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub category: String,
    pub description: String,
    pub location: Option<Location>,
    /// Relative paths of stored attachments, in upload order.
    pub media: Vec<String>,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}
