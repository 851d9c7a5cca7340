//! REST API access for the booking backend.
//!
//! This module provides the `ApiClient` used by every page and form, and the
//! `RequestPipeline` underneath it that attaches bearer tokens, refreshes
//! them, retries on 401 and escalates dead sessions.
//!
//! Tokens come from the `token/` endpoint and are renewed through
//! `token/refresh/`.

pub mod client;
pub mod error;
pub mod pipeline;

pub use client::ApiClient;
pub use error::ApiError;
pub use pipeline::{ApiRequest, RequestPipeline};
