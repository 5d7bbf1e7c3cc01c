//! Wire format types for the x402 payment protocol.
//!
//! This crate defines the serialization-level data structures used by the
//! x402 protocol, covering both V1 (legacy) and V2 (current) formats.
//! It has minimal dependencies (only `serde` and `serde_json`) and is
//! shared by the core resource server and the HTTP transport layer.
//!
//! # Modules
//!
//! - [`v2`]: Current protocol types (`PaymentRequirements`, `PaymentPayload`, etc.)
//! - [`v1`]: Legacy protocol types (`PaymentRequirementsV1`, `PaymentPayloadV1`, etc.)
//! - [`responses`]: Facilitator responses (`VerifyResponse`, `SettleResponse`, etc.)
//! - [`versioned`]: Version detection and the version-tagged wrappers used by the engine

pub mod responses;
pub mod v1;
pub mod v2;
pub mod versioned;

pub use responses::{SettleResponse, SupportedKind, SupportedResponse, VerifyResponse};
pub use v1::{PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1};
pub use v2::{PaymentPayload, PaymentRequired, PaymentRequirements, ResourceInfo};
pub use versioned::{
    ProtocolVersion, VersionedPayload, VersionedPaymentRequired, VersionedRequirements,
};

/// Network identifier: CAIP-2 (`"eip155:8453"`) for V2, flat name (`"base"`) for V1.
pub type Network = String;

/// Extra key that carries the fully-qualified URL of the paid resource.
pub const RESOURCE_URL_EXTRA_KEY: &str = "resourceUrl";

/// Errors that can occur when parsing x402 protocol messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The `x402Version` field is missing from the JSON data.
    #[error("missing x402Version field")]
    MissingVersion,

    /// The `x402Version` field has an unsupported value.
    #[error("invalid x402Version: {0}")]
    InvalidVersion(u64),

    /// JSON deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
