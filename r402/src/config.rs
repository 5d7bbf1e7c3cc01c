//! Configuration types for protected resources.

use r402_proto::Network;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default payment validity window, in seconds.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// A price already expressed in a concrete asset and base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAmount {
    /// Token contract address or mint.
    pub asset: String,
    /// Amount in the token's smallest unit (e.g., "10000" for 0.01 USDC).
    pub amount: String,
    /// Scheme-specific data (e.g., EIP-712 domain params).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// What a resource costs.
///
/// Money prices are display strings (`"$0.10"`) that a
/// [`SchemeServer`](crate::scheme::SchemeServer) resolves into base units of
/// a default asset. Asset prices are used verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    /// A display money amount such as `"$0.10"` or `"1.50"`.
    Money(String),
    /// An explicit asset and base-unit amount.
    Asset(AssetAmount),
}

impl From<&str> for Price {
    fn from(value: &str) -> Self {
        Self::Money(value.to_owned())
    }
}

impl From<String> for Price {
    fn from(value: String) -> Self {
        Self::Money(value)
    }
}

impl From<AssetAmount> for Price {
    fn from(value: AssetAmount) -> Self {
        Self::Asset(value)
    }
}

/// One accepted way to pay for a resource.
///
/// # Example
///
/// ```rust
/// use r402::config::ResourceConfig;
///
/// let config = ResourceConfig::new("exact", "0xRecipient", "$0.10", "base-sepolia");
/// assert_eq!(config.timeout(), 300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
    /// Payment scheme identifier (e.g., `"exact"`).
    pub scheme: String,

    /// Recipient address.
    pub pay_to: String,

    /// Price for the resource.
    pub price: Price,

    /// CAIP-2 identifier (`"eip155:8453"`) or V1 name (`"base"`).
    pub network: Network,

    /// Maximum time in seconds for payment validity (300 if unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,

    /// Extra data merged into the requirement's `extra` object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

impl ResourceConfig {
    /// Creates a payment option with the default timeout.
    #[must_use]
    pub fn new(
        scheme: impl Into<String>,
        pay_to: impl Into<String>,
        price: impl Into<Price>,
        network: impl Into<Network>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            pay_to: pay_to.into(),
            price: price.into(),
            network: network.into(),
            max_timeout_seconds: None,
            extra: None,
        }
    }

    /// Sets the payment validity window.
    #[must_use]
    pub const fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = Some(seconds);
        self
    }

    /// Sets extra data.
    #[must_use]
    pub fn with_extra(mut self, extra: Value) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Effective validity window.
    #[must_use]
    pub fn timeout(&self) -> u64 {
        self.max_timeout_seconds.unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS)
    }
}
