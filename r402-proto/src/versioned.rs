//! Version detection and version-tagged wrappers.
//!
//! V1 and V2 messages differ structurally. The engine handles them through
//! the enums in this module, which are the single place where the
//! `x402Version` field is inspected.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::v1::{PaymentPayloadV1, PaymentRequiredV1, PaymentRequirementsV1};
use crate::v2::{PaymentPayload, PaymentRequired, PaymentRequirements};
use crate::{ProtocolError, RESOURCE_URL_EXTRA_KEY};

/// The x402 protocol version a message is shaped for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Legacy flat-network format; 402 data travels in the JSON body.
    V1,
    /// CAIP-2 format; 402 data travels in the `PAYMENT-REQUIRED` header.
    V2,
}

impl ProtocolVersion {
    /// Returns the numeric `x402Version` value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Converts a numeric `x402Version` value.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidVersion`] for anything other than 1 or 2.
    pub const fn from_number(version: u64) -> Result<Self, ProtocolError> {
        match version {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(ProtocolError::InvalidVersion(other)),
        }
    }

    /// Infers the version from the form of a network identifier:
    /// `namespace:reference` is V2, anything else is a V1 flat name.
    #[must_use]
    pub fn for_network(network: &str) -> Self {
        if is_caip2(network) { Self::V2 } else { Self::V1 }
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Returns `true` if `network` has the CAIP-2 `namespace:reference` shape.
#[must_use]
pub fn is_caip2(network: &str) -> bool {
    network
        .split_once(':')
        .is_some_and(|(namespace, reference)| !namespace.is_empty() && !reference.is_empty())
}

/// Checks if a network matches a pattern. Patterns ending with `*` match
/// any network sharing the prefix (`eip155:*`).
#[must_use]
pub fn matches_network_pattern(network: &str, pattern: &str) -> bool {
    pattern
        .strip_suffix('*')
        .map_or_else(|| pattern == network, |prefix| network.starts_with(prefix))
}

/// Extracts the `x402Version` field from JSON data.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingVersion`] if the field is absent and
/// [`ProtocolError::InvalidVersion`] if it is not 1 or 2.
pub fn detect_version(data: &Value) -> Result<ProtocolVersion, ProtocolError> {
    let version = data
        .get("x402Version")
        .ok_or(ProtocolError::MissingVersion)?;
    let version = version.as_u64().ok_or(ProtocolError::InvalidVersion(0))?;
    ProtocolVersion::from_number(version)
}

/// A payment payload of either protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VersionedPayload {
    /// V1 format.
    V1(Box<PaymentPayloadV1>),
    /// V2 format.
    V2(Box<PaymentPayload>),
}

impl VersionedPayload {
    /// Parses a payload, dispatching on its `x402Version`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the version is missing or unsupported, or
    /// if the payload is structurally incomplete for its version.
    pub fn from_json(data: Value) -> Result<Self, ProtocolError> {
        match detect_version(&data)? {
            ProtocolVersion::V1 => Ok(Self::V1(Box::new(serde_json::from_value(data)?))),
            ProtocolVersion::V2 => Ok(Self::V2(Box::new(serde_json::from_value(data)?))),
        }
    }

    /// Returns the protocol version.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        match self {
            Self::V1(_) => ProtocolVersion::V1,
            Self::V2(_) => ProtocolVersion::V2,
        }
    }

    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::V1(p) => &p.scheme,
            Self::V2(p) => p.scheme(),
        }
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &str {
        match self {
            Self::V1(p) => &p.network,
            Self::V2(p) => p.network(),
        }
    }

    /// Returns the opaque scheme-specific payload bundle.
    #[must_use]
    pub fn payload(&self) -> &Value {
        match self {
            Self::V1(p) => &p.payload,
            Self::V2(p) => &p.payload,
        }
    }
}

impl<'de> Deserialize<'de> for VersionedPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(serde::de::Error::custom)
    }
}

impl From<PaymentPayloadV1> for VersionedPayload {
    fn from(payload: PaymentPayloadV1) -> Self {
        Self::V1(Box::new(payload))
    }
}

impl From<PaymentPayload> for VersionedPayload {
    fn from(payload: PaymentPayload) -> Self {
        Self::V2(Box::new(payload))
    }
}

/// Payment requirements of either protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VersionedRequirements {
    /// V1 format.
    V1(Box<PaymentRequirementsV1>),
    /// V2 format.
    V2(Box<PaymentRequirements>),
}

impl VersionedRequirements {
    /// Returns the protocol version these requirements are shaped for.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        match self {
            Self::V1(_) => ProtocolVersion::V1,
            Self::V2(_) => ProtocolVersion::V2,
        }
    }

    /// Returns the payment scheme.
    #[must_use]
    pub fn scheme(&self) -> &str {
        match self {
            Self::V1(r) => &r.scheme,
            Self::V2(r) => &r.scheme,
        }
    }

    /// Returns the network.
    #[must_use]
    pub fn network(&self) -> &str {
        match self {
            Self::V1(r) => &r.network,
            Self::V2(r) => &r.network,
        }
    }

    /// Returns the amount in base units.
    #[must_use]
    pub fn amount(&self) -> &str {
        match self {
            Self::V1(r) => r.amount(),
            Self::V2(r) => &r.amount,
        }
    }

    /// Returns the asset identifier.
    #[must_use]
    pub fn asset(&self) -> &str {
        match self {
            Self::V1(r) => &r.asset,
            Self::V2(r) => &r.asset,
        }
    }

    /// Returns the recipient address.
    #[must_use]
    pub fn pay_to(&self) -> &str {
        match self {
            Self::V1(r) => &r.pay_to,
            Self::V2(r) => &r.pay_to,
        }
    }

    /// Returns the scheme-specific extra data, if any.
    #[must_use]
    pub fn extra(&self) -> Option<&Value> {
        match self {
            Self::V1(r) => r.extra.as_ref(),
            Self::V2(r) => Some(&r.extra).filter(|extra| !extra.is_null()),
        }
    }

    /// Returns `extra.resourceUrl`, if set.
    #[must_use]
    pub fn resource_url(&self) -> Option<&str> {
        self.extra()?.get(RESOURCE_URL_EXTRA_KEY)?.as_str()
    }

    /// Returns `true` if `payload` targets these requirements: same protocol
    /// version, same scheme and same network.
    #[must_use]
    pub fn matches(&self, payload: &VersionedPayload) -> bool {
        self.version() == payload.version()
            && self.scheme() == payload.scheme()
            && self.network() == payload.network()
    }
}

impl From<PaymentRequirementsV1> for VersionedRequirements {
    fn from(requirements: PaymentRequirementsV1) -> Self {
        Self::V1(Box::new(requirements))
    }
}

impl From<PaymentRequirements> for VersionedRequirements {
    fn from(requirements: PaymentRequirements) -> Self {
        Self::V2(Box::new(requirements))
    }
}

/// A 402 negotiation response of either protocol version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum VersionedPaymentRequired {
    /// V1 format.
    V1(Box<PaymentRequiredV1>),
    /// V2 format.
    V2(Box<PaymentRequired>),
}

impl VersionedPaymentRequired {
    /// Parses a 402 response, dispatching on its `x402Version`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] on a missing/unsupported version or a
    /// structurally incomplete document.
    pub fn from_json(data: Value) -> Result<Self, ProtocolError> {
        match detect_version(&data)? {
            ProtocolVersion::V1 => Ok(Self::V1(Box::new(serde_json::from_value(data)?))),
            ProtocolVersion::V2 => Ok(Self::V2(Box::new(serde_json::from_value(data)?))),
        }
    }

    /// Returns the protocol version.
    #[must_use]
    pub const fn version(&self) -> ProtocolVersion {
        match self {
            Self::V1(_) => ProtocolVersion::V1,
            Self::V2(_) => ProtocolVersion::V2,
        }
    }

    /// Returns the error reason, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::V1(p) => p.error.as_deref(),
            Self::V2(p) => p.error.as_deref(),
        }
    }

    /// Returns the accepted requirements in preference order.
    #[must_use]
    pub fn accepts(&self) -> Vec<VersionedRequirements> {
        match self {
            Self::V1(p) => p.accepts.iter().cloned().map(Into::into).collect(),
            Self::V2(p) => p.accepts.iter().cloned().map(Into::into).collect(),
        }
    }

    /// Returns the resource URL: the V2 resource info, or the first V1
    /// requirement's `resource`.
    #[must_use]
    pub fn resource_url(&self) -> Option<&str> {
        match self {
            Self::V1(p) => p.accepts.first().map(|r| r.resource.as_str()),
            Self::V2(p) => p.resource.as_ref().map(|r| r.url.as_str()),
        }
    }
}

impl<'de> Deserialize<'de> for VersionedPaymentRequired {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_json(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_version_follows_network_form() {
        assert_eq!(ProtocolVersion::for_network("eip155:8453"), ProtocolVersion::V2);
        assert_eq!(ProtocolVersion::for_network("base-sepolia"), ProtocolVersion::V1);
        assert_eq!(ProtocolVersion::for_network("eip155:"), ProtocolVersion::V1);
    }

    #[test]
    fn test_parses_v1_payload_with_top_level_fields() {
        let payload = VersionedPayload::from_json(json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "base-sepolia",
            "payload": { "signature": "0xdead" }
        }))
        .unwrap();
        assert_eq!(payload.version(), ProtocolVersion::V1);
        assert_eq!(payload.scheme(), "exact");
        assert_eq!(payload.network(), "base-sepolia");
    }

    #[test]
    fn test_parses_v2_payload_with_accepted() {
        let payload = VersionedPayload::from_json(json!({
            "x402Version": 2,
            "payload": { "signature": "0xdead" },
            "accepted": {
                "scheme": "exact",
                "network": "eip155:84532",
                "asset": "0xusdc",
                "amount": "100000",
                "payTo": "0xrecipient",
                "maxTimeoutSeconds": 300
            }
        }))
        .unwrap();
        assert_eq!(payload.version(), ProtocolVersion::V2);
        assert_eq!(payload.network(), "eip155:84532");
    }

    #[test]
    fn test_rejects_incomplete_and_unknown_versions() {
        let missing_scheme = json!({ "x402Version": 1, "network": "base", "payload": {} });
        assert!(VersionedPayload::from_json(missing_scheme).is_err());
        let future = json!({ "x402Version": 3, "scheme": "exact" });
        assert!(matches!(
            VersionedPayload::from_json(future),
            Err(ProtocolError::InvalidVersion(3))
        ));
        assert!(matches!(
            VersionedPayload::from_json(json!({})),
            Err(ProtocolError::MissingVersion)
        ));
    }

    #[test]
    fn test_requirements_match_on_version_scheme_and_network() {
        let requirements = VersionedRequirements::from(PaymentRequirementsV1 {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: "100000".into(),
            resource: "https://example.com/api/data".into(),
            description: String::new(),
            mime_type: String::new(),
            pay_to: "0xrecipient".into(),
            max_timeout_seconds: 60,
            asset: "0xusdc".into(),
            output_schema: None,
            extra: Some(json!({ "resourceUrl": "https://example.com/api/data" })),
        });
        let matching = VersionedPayload::from(PaymentPayloadV1 {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            payload: json!({}),
        });
        let other_network = VersionedPayload::from(PaymentPayloadV1 {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base".into(),
            payload: json!({}),
        });
        assert!(requirements.matches(&matching));
        assert!(!requirements.matches(&other_network));
        assert_eq!(
            requirements.resource_url(),
            Some("https://example.com/api/data")
        );
    }
}
