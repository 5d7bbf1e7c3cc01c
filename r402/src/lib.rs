#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core resource-server logic for the x402 payment protocol.
//!
//! This crate is transport-agnostic. It turns configured prices into
//! protocol requirements, matches client payloads against them and
//! delegates verification and settlement to a facilitator. HTTP concerns
//! live in `r402-http`.
//!
//! # Modules
//!
//! - [`amount`]: human-readable currency amount parsing
//! - [`config`]: priced payment options for protected resources
//! - [`error`]: error types
//! - [`facilitator`]: the verify/settle collaborator trait
//! - [`hooks`]: lifecycle hooks around verify and settle
//! - [`networks`]: V1 name and CAIP-2 translation, known USDC deployments
//! - [`scheme`]: price resolution per payment scheme
//! - [`server`]: the [`X402ResourceServer`](server::X402ResourceServer)
//!
//! # Feature Flags
//!
//! - `telemetry`: enables tracing instrumentation

pub mod amount;
pub mod config;
pub mod error;
pub mod facilitator;
pub mod hooks;
pub mod networks;
pub mod scheme;
pub mod server;

pub use r402_proto as proto;
pub use r402_proto::ProtocolError;
