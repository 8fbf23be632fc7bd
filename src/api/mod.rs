//! External API clients
//!
//! Thin async wrappers around the two HTTP services the tool servers front.
//! Each client sits behind a trait so tool handlers can be exercised with
//! in-memory fakes.

pub mod coingecko;
pub mod github;

use serde_json::Value;
use thiserror::Error;

/// Classified failure of an outbound API call.
///
/// Formatting for the calling agent happens in the tool layer; this type only
/// records what went wrong.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The service could not be reached (DNS, connect, timeout, TLS).
    #[error("{0}")]
    Network(String),

    /// The service answered but the body was not what we expected.
    #[error("invalid response: {0}")]
    Decode(String),

    /// Nothing matched the lookup.
    #[error("{0}")]
    NotFound(String),

    /// The service answered with a non-success status.
    #[error("{message}")]
    RemoteRejected {
        status: u16,
        message: String,
        /// Sub-errors reported by the service, if any.
        details: Option<Value>,
    },
}

impl ApiError {
    /// HTTP status for rejected requests.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::RemoteRejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Sub-error payload for rejected requests.
    pub fn details(&self) -> Option<&Value> {
        match self {
            ApiError::RemoteRejected { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
