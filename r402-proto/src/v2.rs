//! V2 payment types for the x402 protocol.
//!
//! V2 identifies networks by CAIP-2 chain IDs and carries resource
//! information once per 402 response instead of once per requirement.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Network;

/// Describes the resource being accessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// The URL of the resource.
    pub url: String,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// V2 payment requirements structure.
///
/// # JSON Format
///
/// ```json
/// {
///   "scheme": "exact",
///   "network": "eip155:8453",
///   "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
///   "amount": "1000000",
///   "payTo": "0x...",
///   "maxTimeoutSeconds": 300,
///   "extra": { "resourceUrl": "https://api.example.com/weather" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme identifier (e.g., "exact").
    pub scheme: String,

    /// CAIP-2 network identifier (e.g., "eip155:8453").
    pub network: Network,

    /// Asset address/identifier (e.g., USDC contract address).
    pub asset: String,

    /// Amount in smallest unit (e.g., "1000000" for 1 USDC).
    pub amount: String,

    /// Recipient address.
    pub pay_to: String,

    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,

    /// Additional scheme-specific data (e.g., EIP-712 domain params).
    #[serde(default = "default_empty_object")]
    pub extra: Value,
}

/// V2 402 response structure, sent base64-encoded in `PAYMENT-REQUIRED`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 2 for V2).
    #[serde(default = "default_v2")]
    pub x402_version: u32,

    /// Optional error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Resource information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Accepted payment requirements, in the resource owner's preference order.
    pub accepts: Vec<PaymentRequirements>,

    /// Optional extension data (e.g., bazaar).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

/// V2 payment payload structure.
///
/// # JSON Format
///
/// ```json
/// {
///   "x402Version": 2,
///   "payload": { "authorization": {...}, "signature": "0x..." },
///   "accepted": { "scheme": "exact", "network": "eip155:8453", ... }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version (always 2 for V2).
    pub x402_version: u32,

    /// Scheme-specific payload data.
    pub payload: Value,

    /// The payment requirements the client chose to fulfil.
    pub accepted: PaymentRequirements,

    /// Optional resource information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceInfo>,

    /// Optional extension data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl PaymentPayload {
    /// Returns the payment scheme from accepted requirements.
    #[must_use]
    pub fn scheme(&self) -> &str {
        &self.accepted.scheme
    }

    /// Returns the network from accepted requirements.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.accepted.network
    }
}

const fn default_v2() -> u32 {
    2
}

fn default_empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
