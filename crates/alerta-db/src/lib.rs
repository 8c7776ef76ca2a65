//! In-process stores for accounts and incident reports.
//!
//! State lives in process memory only. Each store owns its collection behind
//! a lock and exposes operations, never the collection itself.

pub mod models;
pub mod reports;
pub mod users;

pub use reports::{NewReport, ReportStore, StoreError};
pub use users::{IdentityError, IdentityStore, NewUser};
