//! Server-side scheme abstractions.
//!
//! A [`SchemeServer`] converts a configured [`Price`] into an asset amount
//! for a network and may enrich the requirement's `extra` object with
//! scheme-specific data.

use r402_proto::SupportedKind;
use serde_json::{Map, Value, json};

use crate::amount::{MoneyAmount, is_base_unit_amount};
use crate::config::{AssetAmount, Price};
use crate::error::PriceError;
use crate::networks::usdc_deployment;

/// Trait for server-side scheme processing.
pub trait SchemeServer: Send + Sync {
    /// Scheme identifier (e.g., `"exact"`).
    fn scheme(&self) -> &str;

    /// Resolves `price` into an asset amount on `network` (CAIP-2 form when
    /// the network is known, otherwise as configured).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] if the price cannot be represented exactly.
    fn parse_price(&self, price: &Price, network: &str) -> Result<AssetAmount, PriceError>;

    /// Enriches the requirement's `extra` object.
    ///
    /// The default copies the facilitator's advertised `extra` fields (such
    /// as `feePayer`) that are not already set.
    fn enhance_extra(&self, extra: &mut Map<String, Value>, kind: &SupportedKind) {
        if let Some(Value::Object(advertised)) = &kind.extra {
            for (key, value) in advertised {
                extra.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
}

/// The `exact` scheme priced in USDC.
///
/// Money prices resolve to the USDC deployment of the network with exact
/// decimal arithmetic. EVM requirements carry the token's EIP-712 domain
/// (`name`, `version`) in `extra`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactUsdcServer;

impl SchemeServer for ExactUsdcServer {
    fn scheme(&self) -> &str {
        "exact"
    }

    fn parse_price(&self, price: &Price, network: &str) -> Result<AssetAmount, PriceError> {
        match price {
            Price::Asset(asset) => {
                if !is_base_unit_amount(&asset.amount) {
                    return Err(PriceError::InvalidAmount(asset.amount.clone()));
                }
                Ok(asset.clone())
            }
            Price::Money(money) => {
                let usdc = usdc_deployment(network)
                    .ok_or_else(|| PriceError::NoDefaultAsset(network.to_owned()))?;
                let amount = MoneyAmount::parse(money)?.to_base_units(usdc.decimals)?;
                let extra = usdc
                    .eip712
                    .map(|(name, version)| json!({ "name": name, "version": version }));
                Ok(AssetAmount {
                    asset: usdc.address.to_owned(),
                    amount,
                    extra,
                })
            }
        }
    }
}
