//! Error types for the Splunk client.
//!
//! # Design
//! `ResponseError` is a value, not just a failure: it is stored on
//! `CompleteResponse::error` so callers that inspect raw responses still see
//! what splunkd complained about. `Context` methods lift it into
//! `SplunkError::Response` so ordinary callers can use `?`.

use serde::{Deserialize, Serialize};

/// A single entry of splunkd's `messages` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplunkMessage {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// A completed request whose status was 400 or above.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("HTTP {status}: {}", summary(.messages))]
pub struct ResponseError {
    pub status: u16,
    pub messages: Vec<SplunkMessage>,
}

fn summary(messages: &[SplunkMessage]) -> String {
    if messages.is_empty() {
        return "request failed".to_string();
    }
    messages
        .iter()
        .map(|m| m.text.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors returned by the transport, `Context` and `Service`.
#[derive(Debug, thiserror::Error)]
pub enum SplunkError {
    /// The `Http` implementation could not complete the round-trip.
    #[error("transport error: {0}")]
    Transport(String),

    /// splunkd answered with status >= 400.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// Login succeeded at the HTTP level but no session key came back.
    #[error("no session key available")]
    NoSessionKey,

    /// The request arguments contradict each other.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration value for {key}: {message}")]
    Config { key: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SplunkError {
    /// HTTP status of a `Response` error, if that is what this is.
    pub fn status(&self) -> Option<u16> {
        match self {
            SplunkError::Response(err) => Some(err.status),
            _ => None,
        }
    }
}

pub type Result<T, E = SplunkError> = std::result::Result<T, E>;
