//! HTTP surface for accounts and reports.
//!
//! Handlers compose the authorization gate ([`middleware`]), the stores from
//! `alerta-db` and the gateway dispatcher. Every handler returns
//! [`error::ApiError`] on failure.

pub mod auth;
pub mod error;
pub mod media;
pub mod middleware;
pub mod reports;
pub mod session;
pub mod state;

pub use error::ApiError;
pub use state::{AppState, AppStateInner};
