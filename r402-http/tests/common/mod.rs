//! Shared fixtures: an in-process facilitator that records its calls.

#![allow(dead_code, missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use r402::config::ResourceConfig;
use r402::error::FacilitatorError;
use r402::facilitator::{BoxFuture, FacilitatorClient};
use r402::proto::{
    PaymentPayload, PaymentPayloadV1, PaymentRequirements, SettleResponse, SupportedKind,
    SupportedResponse, VerifyResponse, VersionedPayload, VersionedRequirements,
};
use r402::scheme::ExactUsdcServer;
use r402::server::X402ResourceServer;
use r402_http::X402HttpServer;
use r402_http::headers::encode_payment_payload;
use r402_http::types::{HttpRequestContext, RouteConfig, Routes};
use serde_json::json;

pub const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

#[derive(Debug, Clone, Default)]
pub struct Calls {
    verify: Arc<AtomicUsize>,
    settle: Arc<AtomicUsize>,
}

impl Calls {
    pub fn verify(&self) -> usize {
        self.verify.load(Ordering::SeqCst)
    }

    pub fn settle(&self) -> usize {
        self.settle.load(Ordering::SeqCst)
    }
}

pub struct SpyFacilitator {
    verify: VerifyResponse,
    settle: SettleResponse,
    calls: Calls,
}

impl FacilitatorClient for SpyFacilitator {
    fn verify<'a>(
        &'a self,
        _payload: &'a VersionedPayload,
        _requirements: &'a VersionedRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, FacilitatorError>> {
        self.calls.verify.fetch_add(1, Ordering::SeqCst);
        let response = self.verify.clone();
        Box::pin(async move { Ok(response) })
    }

    fn settle<'a>(
        &'a self,
        _payload: &'a VersionedPayload,
        _requirements: &'a VersionedRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, FacilitatorError>> {
        self.calls.settle.fetch_add(1, Ordering::SeqCst);
        let response = self.settle.clone();
        Box::pin(async move { Ok(response) })
    }

    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, FacilitatorError>> {
        let kind = |version: u32, network: &str| SupportedKind {
            x402_version: version,
            scheme: "exact".into(),
            network: network.into(),
            extra: None,
        };
        let supported = SupportedResponse {
            kinds: vec![
                kind(1, "base-sepolia"),
                kind(1, "base"),
                kind(2, "eip155:*"),
                kind(2, "solana:*"),
            ],
            ..SupportedResponse::default()
        };
        Box::pin(async move { Ok(supported) })
    }
}

pub fn accepting() -> VerifyResponse {
    VerifyResponse::valid("0xpayer")
}

pub fn settled() -> SettleResponse {
    SettleResponse::success("0xtxhash", "base-sepolia", "0xpayer")
}

/// An initialized resource server backed by a spy.
pub async fn resource_server(
    verify: VerifyResponse,
    settle: SettleResponse,
) -> (X402ResourceServer, Calls) {
    let calls = Calls::default();
    let spy = SpyFacilitator {
        verify,
        settle,
        calls: calls.clone(),
    };
    let mut server = X402ResourceServer::with_facilitator(Box::new(spy));
    server.register("eip155:*", Box::new(ExactUsdcServer));
    server.register("solana:*", Box::new(ExactUsdcServer));
    server.initialize().await.unwrap();
    (server, calls)
}

/// An HTTP engine over an initialized spy-backed server, without route
/// validation.
pub async fn http_server(
    verify: VerifyResponse,
    settle: SettleResponse,
    routes: impl Into<Routes>,
) -> (X402HttpServer, Calls) {
    let (server, calls) = resource_server(verify, settle).await;
    let http = X402HttpServer::new(Arc::new(server), routes).unwrap();
    (http, calls)
}

/// `/api/data` priced at $0.10 on Base Sepolia.
pub fn api_data_routes() -> Routes {
    Routes::new().route(
        "/api/data",
        RouteConfig::single(ResourceConfig::new("exact", PAY_TO, "$0.10", "base-sepolia"))
            .with_description("Premium data"),
    )
}

pub fn request(path: &str) -> HttpRequestContext {
    HttpRequestContext::new("GET", path, format!("http://localhost{path}"))
}

pub fn v1_payment_header(network: &str) -> String {
    let payload: VersionedPayload = PaymentPayloadV1 {
        x402_version: 1,
        scheme: "exact".into(),
        network: network.into(),
        payload: json!({
            "signature": "0xsig",
            "authorization": { "from": "0xpayer", "to": PAY_TO, "value": "100000" }
        }),
    }
    .into();
    encode_payment_payload(&payload).unwrap()
}

/// What a V2 client accepts when paying $0.10 in USDC on `network`.
pub fn v2_accepted(network: &str) -> PaymentRequirements {
    PaymentRequirements {
        scheme: "exact".into(),
        network: network.into(),
        asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
        amount: "100000".into(),
        pay_to: PAY_TO.into(),
        max_timeout_seconds: 60,
        extra: json!({ "name": "USDC", "version": "2" }),
    }
}

pub fn v2_payment_header(accepted: PaymentRequirements) -> String {
    let payload: VersionedPayload = PaymentPayload {
        x402_version: 2,
        payload: json!({
            "signature": "0xsig",
            "authorization": { "from": "0xpayer", "to": PAY_TO, "value": "100000" }
        }),
        accepted,
        resource: None,
        extensions: None,
    }
    .into();
    encode_payment_payload(&payload).unwrap()
}
