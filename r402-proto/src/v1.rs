//! V1 legacy payment types for the x402 protocol.
//!
//! V1 identifies networks by flat names (`"base-sepolia"`), carries the
//! amount as `maxAmountRequired` and inlines resource information into each
//! requirement.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Network;

/// V1 payment requirements (legacy).
///
/// # JSON Format
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "base-sepolia",
///   "maxAmountRequired": "100000",
///   "resource": "https://api.example.com/api/data",
///   "payTo": "0x...",
///   "maxTimeoutSeconds": 300,
///   "asset": "0x...",
///   "extra": { "resourceUrl": "https://api.example.com/api/data" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirementsV1 {
    /// Payment scheme identifier (e.g., "exact").
    pub scheme: String,

    /// Network identifier (legacy format, e.g., "base-sepolia").
    pub network: Network,

    /// Maximum amount in the asset's smallest unit.
    pub max_amount_required: String,

    /// Resource URL.
    pub resource: String,

    /// Resource description.
    #[serde(default)]
    pub description: String,

    /// MIME type of the resource.
    #[serde(default)]
    pub mime_type: String,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,

    /// Asset address/identifier.
    pub asset: String,

    /// Optional output schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<Value>,

    /// Additional scheme-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl PaymentRequirementsV1 {
    /// Returns the payment amount (V1 uses `maxAmountRequired`).
    #[must_use]
    pub fn amount(&self) -> &str {
        &self.max_amount_required
    }
}

/// V1 402 response (legacy). Travels in the JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredV1 {
    /// Protocol version (always 1 for V1).
    #[serde(default = "default_v1")]
    pub x402_version: u32,

    /// Optional error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// List of accepted payment requirements.
    pub accepts: Vec<PaymentRequirementsV1>,
}

/// V1 payment payload (legacy).
///
/// In V1, `scheme` and `network` are at the top level rather than nested
/// inside an `accepted` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayloadV1 {
    /// Protocol version (always 1 for V1).
    pub x402_version: u32,

    /// Payment scheme identifier.
    pub scheme: String,

    /// Network identifier.
    pub network: Network,

    /// Scheme-specific payload data.
    pub payload: Value,
}

const fn default_v1() -> u32 {
    1
}
