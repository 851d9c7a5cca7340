use reqwest::StatusCode;
use thiserror::Error;

use crate::auth::SessionKind;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Credentials missing, unrefreshable, or the retry budget ran out.
    /// The store has already been cleared when this is returned from a request.
    #[error("Authentication required - sign in again at {login_route}")]
    AuthenticationRequired {
        kind: SessionKind,
        login_route: String,
    },

    #[error("Access denied. You do not have permission to perform this action: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    /// The server answered with a 5xx.
    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed: {status}: {body}")]
    RequestFailed { status: StatusCode, body: String },

    /// No response was received; the request may or may not have taken effect.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Classify a non-2xx, non-401 response. 401 never reaches here from the
    /// pipeline; it is handled by refresh or escalation first.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            403 => ApiError::PermissionDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::RequestFailed {
                status,
                body: truncated,
            },
        }
    }

    pub fn is_auth_required(&self) -> bool {
        matches!(self, ApiError::AuthenticationRequired { .. })
    }
}
