//! Error types for the x402 resource server.

use crate::amount::MoneyAmountParseError;

/// Failure to turn a configured [`Price`](crate::config::Price) into an
/// asset amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The money string could not be converted into base units.
    #[error("invalid money amount: {0}")]
    Money(#[from] MoneyAmountParseError),

    /// No default asset is known for the network.
    #[error("no default asset for network '{0}'")]
    NoDefaultAsset(String),

    /// An explicit asset amount is not a base-unit integer string.
    #[error("amount must be an integer string in base units, got '{0}'")]
    InvalidAmount(String),
}

/// Failure reported by a facilitator collaborator.
///
/// A facilitator that answers with `isValid: false` is not an error; this
/// type covers transport, status and decoding problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FacilitatorError {
    /// The request could not be sent or timed out.
    #[error("facilitator {endpoint} request failed: {message}")]
    Transport {
        /// Endpoint name (`verify`, `settle`, `supported`).
        endpoint: &'static str,
        /// Transport error description.
        message: String,
    },

    /// The facilitator answered with a non-success status.
    #[error("facilitator {endpoint} failed ({status}): {body}")]
    Status {
        /// Endpoint name.
        endpoint: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The facilitator response could not be decoded.
    #[error("facilitator {endpoint} response parse error: {message}")]
    Decode {
        /// Endpoint name.
        endpoint: &'static str,
        /// Decoder error description.
        message: String,
    },

    /// Any other collaborator-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Errors returned by [`X402ResourceServer`](crate::server::X402ResourceServer).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    /// [`initialize`](crate::server::X402ResourceServer::initialize) was not called.
    #[error("Server not initialized. Call initialize() first.")]
    NotInitialized,

    /// The network cannot be expressed in the requested protocol version.
    #[error("network '{network}' has no V{version} form")]
    UnknownNetwork {
        /// Network as configured.
        network: String,
        /// Target protocol version.
        version: u32,
    },

    /// No scheme server registered for the scheme/network pair.
    #[error("No scheme '{scheme}' registered for network '{network}'")]
    SchemeNotFound {
        /// Requested scheme.
        scheme: String,
        /// Requested network.
        network: String,
    },

    /// No facilitator supports the version/scheme/network combination.
    #[error("No facilitator supports scheme '{scheme}' on network '{network}' (v{version})")]
    UnsupportedKind {
        /// Protocol version.
        version: u32,
        /// Requested scheme.
        scheme: String,
        /// Requested network.
        network: String,
    },

    /// Price resolution failed.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// A before-hook aborted the operation.
    #[error("Payment aborted: {0}")]
    Aborted(String),

    /// The facilitator call failed.
    #[error(transparent)]
    Facilitator(#[from] FacilitatorError),
}
