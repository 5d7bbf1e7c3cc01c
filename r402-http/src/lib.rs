//! HTTP payment gating for the x402 protocol.
//!
//! Sits between an HTTP framework and an
//! [`X402ResourceServer`](r402::server::X402ResourceServer): it decides which
//! requests need payment, answers them with 402 negotiation responses,
//! verifies submitted payments and settles them once the protected handler
//! has succeeded.
//!
//! # Modules
//!
//! - [`constants`]: header names, media types, error strings
//! - [`headers`]: Base64/JSON codec for the x402 headers
//! - [`routes`]: route pattern compilation and matching
//! - [`types`]: route configuration, request adapter, processor results
//! - [`processor`]: the request and settlement processors ([`X402HttpServer`])
//! - [`paywall`]: browser paywall selection and rendering
//! - [`error`]: error types
//! - [`facilitator`]: remote facilitator client (feature: `client`)
//! - [`server`]: tower/axum layer (feature: `server`)

pub mod constants;
pub mod error;
pub mod headers;
pub mod paywall;
pub mod processor;
pub mod routes;
pub mod types;

#[cfg(feature = "client")]
pub mod facilitator;

#[cfg(feature = "server")]
pub mod server;

pub use processor::X402HttpServer;
pub use types::{HttpAdapter, HttpRequestContext, ProcessResult, RouteConfig, Routes};
