//! The verification and settlement collaborator.

use std::future::Future;
use std::pin::Pin;

use r402_proto::{
    SettleResponse, SupportedResponse, VerifyResponse, VersionedPayload, VersionedRequirements,
};

use crate::error::FacilitatorError;

/// A boxed, `Send` future, used to keep collaborator traits dyn-compatible.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Async facilitator client.
///
/// Resource servers delegate verify/settle to a facilitator through this
/// trait. Implementations typically make HTTP calls to a remote service
/// (see `r402_http::facilitator::HttpFacilitatorClient`); tests use
/// in-process fakes.
pub trait FacilitatorClient: Send + Sync {
    /// Verifies a payment against the requirements it targets.
    fn verify<'a>(
        &'a self,
        payload: &'a VersionedPayload,
        requirements: &'a VersionedRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, FacilitatorError>>;

    /// Settles a previously verified payment.
    fn settle<'a>(
        &'a self,
        payload: &'a VersionedPayload,
        requirements: &'a VersionedRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, FacilitatorError>>;

    /// Returns the payment kinds this facilitator handles.
    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, FacilitatorError>>;
}
