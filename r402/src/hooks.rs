//! Lifecycle hooks for resource-server verify and settle operations.
//!
//! Hooks intercept verify and settle at three points:
//!
//! - **Before**: inspect or abort the operation before it executes
//! - **After**: observe the result of a successful operation
//! - **On failure**: observe or recover from a failed operation
//!
//! Hooks run in registration order. The first before-hook that aborts wins
//! and the remaining ones are skipped; likewise the first failure-hook that
//! recovers wins. All after-hooks run.

use r402_proto::{SettleResponse, VerifyResponse, VersionedPayload, VersionedRequirements};

use crate::facilitator::BoxFuture;

/// Returned by a before-hook to abort the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortResult {
    /// Machine-readable reason (e.g., `"kyt_blocked"`).
    pub reason: String,
}

impl AbortResult {
    /// Creates an abort with the given reason.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Substitute verification result returned by a failure-hook.
#[derive(Debug, Clone)]
pub struct RecoveredVerifyResult {
    /// The result to use instead of the failure.
    pub result: VerifyResponse,
}

/// Substitute settlement result returned by a failure-hook.
#[derive(Debug, Clone)]
pub struct RecoveredSettleResult {
    /// The result to use instead of the failure.
    pub result: SettleResponse,
}

/// Context passed to before-verify and before-settle hooks.
#[derive(Debug, Clone)]
pub struct PaymentContext {
    /// The payload presented by the client.
    pub payload: VersionedPayload,
    /// The requirements it was matched against.
    pub requirements: VersionedRequirements,
}

/// Context passed to after-verify hooks.
#[derive(Debug, Clone)]
pub struct VerifyResultContext {
    /// The payload and requirements.
    pub payment: PaymentContext,
    /// The successful verification result.
    pub result: VerifyResponse,
}

/// Context passed to after-settle hooks.
#[derive(Debug, Clone)]
pub struct SettleResultContext {
    /// The payload and requirements.
    pub payment: PaymentContext,
    /// The successful settlement result.
    pub result: SettleResponse,
}

/// Context passed to failure hooks.
#[derive(Debug, Clone)]
pub struct FailureContext {
    /// The payload and requirements.
    pub payment: PaymentContext,
    /// Reason reported by the facilitator, or the error text.
    pub error: String,
}

/// Async hook called before verification. Return `Some(AbortResult)` to abort.
pub type BeforeVerifyHook =
    Box<dyn Fn(&PaymentContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Async hook called after successful verification.
pub type AfterVerifyHook = Box<dyn Fn(&VerifyResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Async hook called on verification failure. Return a result to recover.
pub type OnVerifyFailureHook =
    Box<dyn Fn(&FailureContext) -> BoxFuture<'_, Option<RecoveredVerifyResult>> + Send + Sync>;

/// Async hook called before settlement. Return `Some(AbortResult)` to abort.
pub type BeforeSettleHook =
    Box<dyn Fn(&PaymentContext) -> BoxFuture<'_, Option<AbortResult>> + Send + Sync>;

/// Async hook called after successful settlement.
pub type AfterSettleHook = Box<dyn Fn(&SettleResultContext) -> BoxFuture<'_, ()> + Send + Sync>;

/// Async hook called on settlement failure. Return a result to recover.
pub type OnSettleFailureHook =
    Box<dyn Fn(&FailureContext) -> BoxFuture<'_, Option<RecoveredSettleResult>> + Send + Sync>;
