//! Real-time fan-out of report lifecycle events.
//!
//! [`dispatcher::Dispatcher`] is the in-process bus the report store
//! publishes into; [`connection`] relays it to WebSocket clients.

pub mod connection;
pub mod dispatcher;

pub use connection::{ConnectionSettings, TokenVerifier};
pub use dispatcher::{Dispatcher, Subscription};
