//! HTTP-specific types for the x402 request and settlement processors.

use http::{HeaderMap, HeaderName, HeaderValue};
use r402::proto::{ProtocolVersion, VersionedPayload, VersionedRequirements};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A payment option accepted by a protected route.
pub use r402::config::ResourceConfig as PaymentOption;

/// Configuration for a payment-protected route.
///
/// Built once at startup and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    /// Accepted payment options, in preference order.
    pub accepts: Vec<PaymentOption>,

    /// Override resource URL (defaults to the request URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Human-readable description of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// HTML served to browsers instead of the generated paywall.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_paywall_html: Option<String>,

    /// Extension declarations copied into V2 402 responses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,

    /// Forces the protocol version instead of inferring it from the
    /// first option's network.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x402_version: Option<u32>,
}

impl RouteConfig {
    /// Creates a route config with a single payment option.
    #[must_use]
    pub fn single(option: PaymentOption) -> Self {
        Self::multi(vec![option])
    }

    /// Creates a route config with multiple payment options.
    #[must_use]
    pub fn multi(options: Vec<PaymentOption>) -> Self {
        Self {
            accepts: options,
            ..Self::default()
        }
    }

    /// Sets the resource URL override.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the resource description.
    #[must_use]
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Sets custom paywall HTML.
    #[must_use]
    pub fn with_custom_paywall_html(mut self, html: impl Into<String>) -> Self {
        self.custom_paywall_html = Some(html.into());
        self
    }

    /// Sets extension declarations.
    #[must_use]
    pub fn with_extensions(mut self, extensions: Value) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// Forces the protocol version.
    #[must_use]
    pub const fn with_version(mut self, version: ProtocolVersion) -> Self {
        self.x402_version = Some(version.as_u32());
        self
    }

    /// Resolves the protocol version this route speaks.
    ///
    /// A forced `x402Version` wins. Otherwise a CAIP-2 network on the first
    /// option selects V2 and a flat name selects V1; a route without options
    /// defaults to V2.
    ///
    /// # Errors
    ///
    /// Returns [`r402::ProtocolError::InvalidVersion`] for a forced version
    /// other than 1 or 2.
    pub fn protocol_version(&self) -> Result<ProtocolVersion, r402::ProtocolError> {
        if let Some(version) = self.x402_version {
            return ProtocolVersion::from_number(u64::from(version));
        }
        Ok(self
            .accepts
            .first()
            .map_or(ProtocolVersion::V2, |option| {
                ProtocolVersion::for_network(&option.network)
            }))
    }
}

/// Ordered route table: pattern → [`RouteConfig`].
///
/// Patterns look like `"GET /weather"`, `"/api/*"` or `"/items/[id]"`.
/// Insertion order is lookup order; the first matching route wins.
#[derive(Debug, Clone, Default)]
pub struct Routes {
    entries: Vec<(String, RouteConfig)>,
}

impl Routes {
    /// Creates an empty route table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a route.
    #[must_use]
    pub fn route(mut self, pattern: impl Into<String>, config: RouteConfig) -> Self {
        self.entries.push((pattern.into(), config));
        self
    }

    /// Appends a catch-all route, equivalent to pattern `"*"`.
    #[must_use]
    pub fn any(self, config: RouteConfig) -> Self {
        self.route("*", config)
    }

    /// Iterates routes in lookup order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteConfig)> {
        self.entries
            .iter()
            .map(|(pattern, config)| (pattern.as_str(), config))
    }

    /// Number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no routes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single config protects every path.
impl From<RouteConfig> for Routes {
    fn from(config: RouteConfig) -> Self {
        Self::new().any(config)
    }
}

impl<P: Into<String>> FromIterator<(P, RouteConfig)> for Routes {
    fn from_iter<I: IntoIterator<Item = (P, RouteConfig)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(pattern, config)| (pattern.into(), config))
                .collect(),
        }
    }
}

/// Request data the processor reads.
///
/// Implemented for [`HttpRequestContext`]; framework integrations can
/// implement it over their own request types.
pub trait HttpAdapter: Sync {
    /// Header value by name, compared case-insensitively.
    fn header(&self, name: &str) -> Option<&str>;

    /// HTTP method.
    fn method(&self) -> &str;

    /// Request path, possibly with query string.
    fn path(&self) -> &str;

    /// Fully-qualified request URL.
    fn url(&self) -> &str;

    /// The `Accept` header.
    fn accept_header(&self) -> Option<&str> {
        self.header("accept")
    }

    /// The `User-Agent` header.
    fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }
}

/// Owned request snapshot implementing [`HttpAdapter`].
#[derive(Debug, Clone, Default)]
pub struct HttpRequestContext {
    method: String,
    path: String,
    url: String,
    headers: HeaderMap,
}

impl HttpRequestContext {
    /// Creates a context with no headers.
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            url: url.into(),
            headers: HeaderMap::new(),
        }
    }

    /// Replaces all headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Adds a header. Names or values that are not valid HTTP are ignored.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }
}

impl HttpAdapter for HttpRequestContext {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    fn method(&self) -> &str {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn url(&self) -> &str {
        &self.url
    }
}

/// Body of a payment error response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    /// Machine-readable negotiation payload.
    Json(Value),
    /// Paywall page for browsers.
    Html(String),
}

/// A fully-formed 402 response the framework adapter writes out verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentErrorResponse {
    /// HTTP status code (always 402).
    pub status: u16,
    /// Response headers.
    pub headers: Vec<(String, String)>,
    /// Response body.
    pub body: ResponseBody,
}

impl PaymentErrorResponse {
    /// Returns a header value by name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Returns the JSON body, if this is not an HTML response.
    #[must_use]
    pub const fn json(&self) -> Option<&Value> {
        match &self.body {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Html(_) => None,
        }
    }
}

/// Outcome of
/// [`X402HttpServer::process_request`](crate::processor::X402HttpServer::process_request).
#[derive(Debug, Clone)]
pub enum ProcessResult {
    /// Route does not require payment; forward the request untouched.
    NoPaymentRequired,

    /// Payment missing, unmatched or rejected; send `response` instead of
    /// calling the protected handler.
    PaymentError {
        /// The 402 response to send.
        response: PaymentErrorResponse,
    },

    /// Payment verified; call the protected handler, then settle.
    PaymentVerified {
        /// The verified payment payload.
        payload: VersionedPayload,
        /// The requirements it matched.
        requirements: VersionedRequirements,
    },
}

/// A successful settlement and the headers announcing it.
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// The facilitator's receipt.
    pub response: r402::proto::SettleResponse,
    /// Headers to add to the protected response (`PAYMENT-RESPONSE`).
    pub headers: Vec<(String, String)>,
}

/// What the framework adapter does with the protected response after
/// settlement.
#[derive(Debug, Clone)]
pub enum Finalization {
    /// Nothing to settle (e.g., the handler failed); send the response as is.
    Unchanged,
    /// Settlement succeeded; add these headers.
    AttachHeaders(Vec<(String, String)>),
    /// Settlement failed after the response was committed; the original
    /// response stands.
    KeepCommitted,
    /// Settlement failed before the response was committed; send this 402
    /// instead.
    Replace(PaymentErrorResponse),
}

/// Paywall UI configuration for browser-based 402 responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaywallConfig {
    /// Application name to display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// URL to application logo.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_logo: Option<String>,

    /// Whether this is a testnet deployment.
    #[serde(default)]
    pub testnet: bool,
}

/// A validation error for one payment option of a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteValidationError {
    /// The route pattern (e.g., `"GET /weather"`).
    pub route_pattern: String,
    /// Scheme identifier (e.g., `"exact"`).
    pub scheme: String,
    /// Network identifier as configured.
    pub network: String,
    /// Reason code (`"invalid_version"`, `"unknown_network"`,
    /// `"missing_scheme"`, `"missing_facilitator"`, `"invalid_price"`).
    pub reason: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for RouteValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.route_pattern, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_inferred_from_first_network() {
        let v1 = RouteConfig::single(PaymentOption::new("exact", "0xr", "$1", "base"));
        assert_eq!(v1.protocol_version().unwrap(), ProtocolVersion::V1);

        let v2 = RouteConfig::single(PaymentOption::new("exact", "0xr", "$1", "eip155:8453"));
        assert_eq!(v2.protocol_version().unwrap(), ProtocolVersion::V2);

        let forced = v1.with_version(ProtocolVersion::V2);
        assert_eq!(forced.protocol_version().unwrap(), ProtocolVersion::V2);
    }

    #[test]
    fn test_single_config_protects_everything() {
        let routes = Routes::from(RouteConfig::default());
        let patterns: Vec<_> = routes.iter().map(|(pattern, _)| pattern).collect();
        assert_eq!(patterns, ["*"]);
    }

    #[test]
    fn test_context_headers_are_case_insensitive() {
        let ctx = HttpRequestContext::new("GET", "/", "http://localhost/")
            .with_header("Payment-Signature", "abc");
        assert_eq!(ctx.header("PAYMENT-SIGNATURE"), Some("abc"));
        assert_eq!(ctx.header("payment-signature"), Some("abc"));
    }
}
