//! Shared domain types for the Alerta workspace.
//!
//! Models, lifecycle events and HTTP request/response bodies live here so the
//! stores, the gateway and the API agree on one wire format.

pub mod api;
pub mod events;
pub mod models;
