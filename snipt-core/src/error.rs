//! Typed errors for adapters and the multiplexing client.
//!
//! Every backend failure carries the platform label it came from so callers
//! can report which backend failed. A routing lookup with no match is never
//! an error: the client returns `None` or an empty collection instead.

use thiserror::Error;

/// Coarse error classification shared by all backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad or missing credential, surfaced while establishing identity.
    Auth,
    /// Any failed remote call: network, HTTP status or decoding.
    Backend,
    /// Malformed connection settings.
    Config,
}

/// Errors raised by a single [`PlatformAdapter`](crate::contract::PlatformAdapter).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{platform}: authentication failed: {message}")]
    Auth { platform: String, message: String },

    #[error("{platform}: request failed: {source}")]
    Request {
        platform: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{platform}: {method} {url} returned {status}: {body}")]
    Status {
        platform: String,
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("{platform}: invalid response: {message}")]
    Decode { platform: String, message: String },

    #[error("{platform}: invalid snippet id {id:?}")]
    InvalidId { platform: String, id: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl AdapterError {
    /// Label of the backend that produced the error, when known.
    pub fn platform(&self) -> Option<&str> {
        match self {
            AdapterError::Auth { platform, .. }
            | AdapterError::Request { platform, .. }
            | AdapterError::Status { platform, .. }
            | AdapterError::Decode { platform, .. }
            | AdapterError::InvalidId { platform, .. } => Some(platform),
            AdapterError::Config(_) => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AdapterError::Auth { .. } => ErrorKind::Auth,
            AdapterError::Config(_) => ErrorKind::Config,
            _ => ErrorKind::Backend,
        }
    }
}

/// Errors returned by the multiplexing [`Client`](crate::client::Client).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// One entry per adapter whose platform discovery failed.
    #[error("platform discovery failed: {}", join_messages(.0))]
    Discovery(Vec<AdapterError>),

    #[error("discovery task failed: {0}")]
    Task(String),
}

fn join_messages(errors: &[AdapterError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
