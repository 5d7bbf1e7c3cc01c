//! Tower middleware for x402 payment gating.
//!
//! [`PaymentGateLayer`] wraps an inner service (typically an axum router)
//! and drives an [`X402HttpServer`] around it:
//!
//! 1. the request is matched and its payment verified;
//! 2. the inner service produces a response, which is held back;
//! 3. settlement runs and either decorates or replaces that response.
//!
//! Because the response is not sent until step 3 completes, a settlement
//! failure always turns into a 402.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use r402::config::ResourceConfig;
//! use r402::scheme::ExactUsdcServer;
//! use r402::server::X402ResourceServer;
//! use r402_http::facilitator::{FacilitatorConfig, HttpFacilitatorClient};
//! use r402_http::processor::X402HttpServer;
//! use r402_http::server::PaymentGateLayer;
//! use r402_http::types::{RouteConfig, Routes};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let facilitator = HttpFacilitatorClient::new(FacilitatorConfig::default())?;
//! let mut server = X402ResourceServer::with_facilitator(Box::new(facilitator));
//! server.register("eip155:*", Box::new(ExactUsdcServer));
//!
//! let routes = Routes::new().route(
//!     "GET /weather",
//!     RouteConfig::single(ResourceConfig::new("exact", "0xRecipient", "$0.01", "eip155:8453")),
//! );
//! let http = X402HttpServer::initialize(server, routes).await?;
//! let layer = PaymentGateLayer::new(Arc::new(http));
//! // app.layer(layer)
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::Response;
use http::header::HOST;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tower::{Layer, Service};
use url::Url;

#[cfg(feature = "telemetry")]
use tracing::Instrument;

use crate::processor::X402HttpServer;
use crate::types::{
    Finalization, HttpRequestContext, PaymentErrorResponse, ProcessResult, ResponseBody,
};

/// Tower [`Layer`] adding x402 payment gating to an inner service.
#[derive(Debug, Clone)]
pub struct PaymentGateLayer {
    http: Arc<X402HttpServer>,
    base_url: Option<Arc<Url>>,
}

impl PaymentGateLayer {
    /// Creates a layer around `http`.
    #[must_use]
    pub const fn new(http: Arc<X402HttpServer>) -> Self {
        Self {
            http,
            base_url: None,
        }
    }

    /// Sets the origin used to build fully-qualified resource URLs.
    ///
    /// A path on `base_url` is kept as a prefix of every request path, for
    /// services mounted below the root. Without it, the `Host` header is
    /// used, then `http://localhost`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(Arc::new(base_url));
        self
    }
}

impl<S> Layer<S> for PaymentGateLayer {
    type Service = PaymentGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentGateService {
            inner,
            http: Arc::clone(&self.http),
            base_url: self.base_url.clone(),
        }
    }
}

/// Tower [`Service`] enforcing x402 payments. Built by [`PaymentGateLayer`].
#[derive(Clone)]
pub struct PaymentGateService<S> {
    inner: S,
    http: Arc<X402HttpServer>,
    base_url: Option<Arc<Url>>,
}

impl<S> std::fmt::Debug for PaymentGateService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGateService")
            .field("http", &self.http)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl<S> Service<Request> for PaymentGateService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let http = Arc::clone(&self.http);
        let ctx = request_context(&req, self.base_url.as_deref());
        // Take the service that was driven to readiness, leave a clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match http.process_request(&ctx).await {
                ProcessResult::NoPaymentRequired => inner.call(req).await,
                ProcessResult::PaymentError { response } => Ok(into_response(response)),
                ProcessResult::PaymentVerified {
                    payload,
                    requirements,
                } => {
                    let mut response = call_inner(&mut inner, req).await?;
                    let result = http
                        .process_settlement(&payload, &requirements, response.status().as_u16())
                        .await;
                    match http.finalize_settlement(result, &requirements, false) {
                        Finalization::Unchanged | Finalization::KeepCommitted => {}
                        Finalization::AttachHeaders(headers) => {
                            append_headers(response.headers_mut(), &headers);
                        }
                        Finalization::Replace(replacement) => {
                            response = into_response(replacement);
                        }
                    }
                    Ok(response)
                }
            }
        })
    }
}

/// Calls the protected handler, in its own span when telemetry is on.
async fn call_inner<S>(inner: &mut S, req: Request) -> Result<Response, S::Error>
where
    S: Service<Request, Response = Response>,
{
    #[cfg(feature = "telemetry")]
    {
        inner
            .call(req)
            .instrument(tracing::info_span!("x402.protected_handler"))
            .await
    }
    #[cfg(not(feature = "telemetry"))]
    {
        inner.call(req).await
    }
}

/// Snapshots what the processor needs, so no borrow of the request is held
/// across an await.
fn request_context(req: &Request, base_url: Option<&Url>) -> HttpRequestContext {
    let uri = req.uri();
    let path = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_owned(), ToString::to_string);

    let origin = base_url.cloned().or_else(|| origin_from_host(req.headers()));
    let url = match origin {
        Some(mut url) => {
            let joined = format!("{}{}", url.path().trim_end_matches('/'), uri.path());
            url.set_path(&joined);
            url.set_query(uri.query());
            url.to_string()
        }
        None => format!("http://localhost{path}"),
    };

    HttpRequestContext::new(req.method().as_str(), path, url).with_headers(req.headers().clone())
}

fn origin_from_host(headers: &HeaderMap) -> Option<Url> {
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    #[cfg(feature = "telemetry")]
    tracing::debug!(host, "base_url is not configured; using Host header as origin");
    Url::parse(&format!("http://{host}")).ok()
}

/// Writes a [`PaymentErrorResponse`] out as an HTTP response.
fn into_response(error: PaymentErrorResponse) -> Response {
    let body = match error.body {
        ResponseBody::Json(value) => Body::from(value.to_string()),
        ResponseBody::Html(html) => Body::from(html),
    };
    let mut response = Response::new(body);
    *response.status_mut() =
        StatusCode::from_u16(error.status).unwrap_or(StatusCode::PAYMENT_REQUIRED);
    append_headers(response.headers_mut(), &error.headers);
    response
}

/// Appends headers, skipping any that are not valid HTTP.
fn append_headers(map: &mut HeaderMap, headers: &[(String, String)]) {
    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => {
                #[cfg(feature = "telemetry")]
                tracing::warn!(header = %name, "skipping invalid response header");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpAdapter;

    #[test]
    fn test_url_from_base_url() {
        let req = Request::builder()
            .uri("/api/data?page=2")
            .body(Body::empty())
            .unwrap();
        let base = Url::parse("https://api.example.com").unwrap();
        let ctx = request_context(&req, Some(&base));
        assert_eq!(ctx.url(), "https://api.example.com/api/data?page=2");
        assert_eq!(ctx.path(), "/api/data?page=2");
    }

    #[test]
    fn test_url_keeps_base_path_prefix() {
        let req = Request::builder()
            .uri("/data?page=2")
            .body(Body::empty())
            .unwrap();
        for base in ["https://api.example.com/v1/", "https://api.example.com/v1"] {
            let base = Url::parse(base).unwrap();
            let ctx = request_context(&req, Some(&base));
            assert_eq!(ctx.url(), "https://api.example.com/v1/data?page=2");
        }
    }

    #[test]
    fn test_url_from_host_header() {
        let req = Request::builder()
            .uri("/api/data")
            .header("host", "shop.test:8080")
            .body(Body::empty())
            .unwrap();
        let ctx = request_context(&req, None);
        assert_eq!(ctx.url(), "http://shop.test:8080/api/data");
    }

    #[test]
    fn test_url_defaults_to_localhost() {
        let req = Request::builder().uri("/x").body(Body::empty()).unwrap();
        let ctx = request_context(&req, None);
        assert_eq!(ctx.url(), "http://localhost/x");
    }

    #[test]
    fn test_invalid_headers_are_skipped() {
        let mut map = HeaderMap::new();
        append_headers(
            &mut map,
            &[
                ("bad header".to_owned(), "v".to_owned()),
                ("x-ok".to_owned(), "fine".to_owned()),
            ],
        );
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("x-ok").unwrap(), "fine");
    }
}
