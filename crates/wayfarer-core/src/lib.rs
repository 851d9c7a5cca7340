//! Client core for the wayfarer travel-booking API.
//!
//! Provides an authenticated API client with persisted credentials, preemptive
//! and reactive token refresh, and escalation to the matching login surface
//! when a session cannot be recovered.

pub mod api;
pub mod auth;
pub mod config;

pub use api::{ApiClient, ApiError};
pub use auth::{Navigator, SessionKind};
pub use config::Config;

#[cfg(test)]
pub(crate) mod test_support;
