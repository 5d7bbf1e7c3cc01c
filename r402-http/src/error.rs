//! Error types for the HTTP transport layer.

use r402::error::ServerError;
use r402::proto::{ProtocolError, SettleResponse};

use crate::types::RouteValidationError;

/// Failure to decode an x402 header.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The header is not valid Base64.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The decoded bytes are not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The JSON is not a complete message of a supported version.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Failure to encode an x402 header.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure while settling after a successful protected response.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// The facilitator answered `success: false`.
    #[error("{reason}")]
    Failed {
        /// Facilitator error reason.
        reason: String,
        /// The full facilitator answer.
        response: Box<SettleResponse>,
    },

    /// The settle call itself failed.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// The receipt could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl SettlementError {
    /// Reason suitable for the `error` field of a 402 body.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Failed { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

/// Route table problems detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum RouteConfigurationError {
    /// A route pattern could not be compiled.
    #[error("invalid route pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },

    /// Facilitator discovery failed.
    #[error("failed to initialize resource server: {0}")]
    Initialize(#[source] ServerError),

    /// One or more payment options cannot be served.
    #[error("invalid route configuration: {}", format_validation(.0))]
    Validation(Vec<RouteValidationError>),
}

fn format_validation(errors: &[RouteValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
