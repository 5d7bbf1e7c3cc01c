//! HTTP facilitator client.
//!
//! [`HttpFacilitatorClient`] implements [`FacilitatorClient`] against a
//! remote facilitator service exposing `POST /verify`, `POST /settle` and
//! `GET /supported`. Authentication headers can be supplied per endpoint
//! through an [`AuthProvider`].

use std::time::Duration;

use r402::error::FacilitatorError;
use r402::facilitator::{BoxFuture, FacilitatorClient};
use r402::proto::{
    SettleResponse, SupportedResponse, VerifyResponse, VersionedPayload, VersionedRequirements,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, InvalidHeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::constants::{APPLICATION_JSON, DEFAULT_FACILITATOR_URL};

/// Per-endpoint authentication headers.
#[derive(Debug, Clone, Default)]
pub struct AuthHeaders {
    /// Headers to include in verify requests.
    pub verify: HeaderMap,
    /// Headers to include in settle requests.
    pub settle: HeaderMap,
    /// Headers to include in supported requests.
    pub supported: HeaderMap,
}

/// Generates authentication headers for facilitator requests.
pub trait AuthProvider: Send + Sync {
    /// Returns authentication headers for each facilitator endpoint.
    fn get_auth_headers(&self) -> AuthHeaders;
}

/// [`AuthProvider`] sending the same headers to every endpoint.
#[derive(Debug, Clone)]
pub struct StaticAuthProvider {
    headers: HeaderMap,
}

impl StaticAuthProvider {
    /// Creates a provider from a fixed header map.
    #[must_use]
    pub const fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    /// Creates a provider sending `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidHeaderValue`] if `token` contains characters not
    /// allowed in a header.
    pub fn bearer(token: &str) -> Result<Self, InvalidHeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))?;
        value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(Self { headers })
    }
}

impl AuthProvider for StaticAuthProvider {
    fn get_auth_headers(&self) -> AuthHeaders {
        AuthHeaders {
            verify: self.headers.clone(),
            settle: self.headers.clone(),
            supported: self.headers.clone(),
        }
    }
}

/// [`AuthProvider`] backed by a callback, for tokens that rotate.
pub struct CallbackAuthProvider<F> {
    create_headers: F,
}

impl<F> std::fmt::Debug for CallbackAuthProvider<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackAuthProvider").finish_non_exhaustive()
    }
}

impl<F> CallbackAuthProvider<F>
where
    F: Fn() -> AuthHeaders + Send + Sync,
{
    /// Creates a provider that calls `create_headers` before every request.
    pub const fn new(create_headers: F) -> Self {
        Self { create_headers }
    }
}

impl<F> AuthProvider for CallbackAuthProvider<F>
where
    F: Fn() -> AuthHeaders + Send + Sync,
{
    fn get_auth_headers(&self) -> AuthHeaders {
        (self.create_headers)()
    }
}

/// Configuration for [`HttpFacilitatorClient`].
pub struct FacilitatorConfig {
    /// Facilitator base URL.
    pub url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Optional authentication provider.
    pub auth_provider: Option<Box<dyn AuthProvider>>,

    /// Pre-configured reqwest client; `timeout` is ignored when set.
    pub http_client: Option<reqwest::Client>,

    /// Human-readable identifier (defaults to the URL).
    pub identifier: Option<String>,
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FACILITATOR_URL.to_owned(),
            timeout: Duration::from_secs(30),
            auth_provider: None,
            http_client: None,
            identifier: None,
        }
    }
}

impl FacilitatorConfig {
    /// Creates a config with the given facilitator URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the authentication provider.
    #[must_use]
    pub fn with_auth(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.auth_provider = Some(Box::new(provider));
        self
    }

    /// Sets a pre-configured reqwest client.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the identifier.
    #[must_use]
    pub fn with_identifier(mut self, id: impl Into<String>) -> Self {
        self.identifier = Some(id.into());
        self
    }
}

impl std::fmt::Debug for FacilitatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorConfig")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .field("has_auth_provider", &self.auth_provider.is_some())
            .field("has_http_client", &self.http_client.is_some())
            .field("identifier", &self.identifier)
            .finish()
    }
}

/// Body of `/verify` and `/settle` requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FacilitatorRequestBody<'a> {
    x402_version: u32,
    payment_payload: &'a VersionedPayload,
    payment_requirements: &'a VersionedRequirements,
}

#[derive(Debug, Clone, Copy)]
enum Endpoint {
    Verify,
    Settle,
    Supported,
}

impl Endpoint {
    const fn name(self) -> &'static str {
        match self {
            Self::Verify => "verify",
            Self::Settle => "settle",
            Self::Supported => "supported",
        }
    }
}

/// Remote facilitator reached over HTTP.
///
/// # Example
///
/// ```no_run
/// use r402::server::X402ResourceServer;
/// use r402_http::facilitator::{FacilitatorConfig, HttpFacilitatorClient};
///
/// let client = HttpFacilitatorClient::new(FacilitatorConfig::default()).unwrap();
/// let server = X402ResourceServer::with_facilitator(Box::new(client));
/// ```
pub struct HttpFacilitatorClient {
    url: String,
    identifier: String,
    auth_provider: Option<Box<dyn AuthProvider>>,
    client: reqwest::Client,
}

impl HttpFacilitatorClient {
    /// Creates a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`reqwest::Error`] if the HTTP client cannot be built.
    pub fn new(config: FacilitatorConfig) -> Result<Self, reqwest::Error> {
        let url = config.url.trim_end_matches('/').to_owned();
        let identifier = config.identifier.unwrap_or_else(|| url.clone());
        let client = match config.http_client {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(config.timeout)
                .redirect(reqwest::redirect::Policy::limited(10))
                .build()?,
        };

        Ok(Self {
            url,
            identifier,
            auth_provider: config.auth_provider,
            client,
        })
    }

    /// Returns the facilitator base URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the effective identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    fn headers_for(&self, endpoint: Endpoint) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        if let Some(auth) = &self.auth_provider {
            let auth_headers = auth.get_auth_headers();
            headers.extend(match endpoint {
                Endpoint::Verify => auth_headers.verify,
                Endpoint::Settle => auth_headers.settle,
                Endpoint::Supported => auth_headers.supported,
            });
        }
        headers
    }

    async fn post<R: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        payload: &VersionedPayload,
        requirements: &VersionedRequirements,
    ) -> Result<R, FacilitatorError> {
        let body = FacilitatorRequestBody {
            x402_version: payload.version().as_u32(),
            payment_payload: payload,
            payment_requirements: requirements,
        };
        let request = self
            .client
            .post(format!("{}/{}", self.url, endpoint.name()))
            .headers(self.headers_for(endpoint))
            .json(&body);
        let result = send(endpoint, request).await;
        record_result(endpoint, &result);
        result
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.verify", skip_all, fields(url = %self.url))
    )]
    async fn verify_http(
        &self,
        payload: &VersionedPayload,
        requirements: &VersionedRequirements,
    ) -> Result<VerifyResponse, FacilitatorError> {
        self.post(Endpoint::Verify, payload, requirements).await
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.settle", skip_all, fields(url = %self.url))
    )]
    async fn settle_http(
        &self,
        payload: &VersionedPayload,
        requirements: &VersionedRequirements,
    ) -> Result<SettleResponse, FacilitatorError> {
        self.post(Endpoint::Settle, payload, requirements).await
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.supported", skip_all, fields(url = %self.url))
    )]
    async fn supported_http(&self) -> Result<SupportedResponse, FacilitatorError> {
        let request = self
            .client
            .get(format!("{}/{}", self.url, Endpoint::Supported.name()))
            .headers(self.headers_for(Endpoint::Supported));
        let result = send(Endpoint::Supported, request).await;
        record_result(Endpoint::Supported, &result);
        result
    }
}

async fn send<R: DeserializeOwned>(
    endpoint: Endpoint,
    request: reqwest::RequestBuilder,
) -> Result<R, FacilitatorError> {
    let response = request
        .send()
        .await
        .map_err(|e| FacilitatorError::Transport {
            endpoint: endpoint.name(),
            message: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(FacilitatorError::Status {
            endpoint: endpoint.name(),
            status: status.as_u16(),
            body,
        });
    }

    response.json().await.map_err(|e| FacilitatorError::Decode {
        endpoint: endpoint.name(),
        message: e.to_string(),
    })
}

#[cfg(feature = "telemetry")]
fn record_result<R>(endpoint: Endpoint, result: &Result<R, FacilitatorError>) {
    if let Err(err) = result {
        tracing::error!(endpoint = endpoint.name(), error = %err, "Request to facilitator failed");
    }
}

#[cfg(not(feature = "telemetry"))]
const fn record_result<R>(_endpoint: Endpoint, _result: &Result<R, FacilitatorError>) {}

impl std::fmt::Debug for HttpFacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFacilitatorClient")
            .field("url", &self.url)
            .field("identifier", &self.identifier)
            .field("has_auth_provider", &self.auth_provider.is_some())
            .finish_non_exhaustive()
    }
}

impl FacilitatorClient for HttpFacilitatorClient {
    fn verify<'a>(
        &'a self,
        payload: &'a VersionedPayload,
        requirements: &'a VersionedRequirements,
    ) -> BoxFuture<'a, Result<VerifyResponse, FacilitatorError>> {
        Box::pin(self.verify_http(payload, requirements))
    }

    fn settle<'a>(
        &'a self,
        payload: &'a VersionedPayload,
        requirements: &'a VersionedRequirements,
    ) -> BoxFuture<'a, Result<SettleResponse, FacilitatorError>> {
        Box::pin(self.settle_http(payload, requirements))
    }

    fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, FacilitatorError>> {
        Box::pin(self.supported_http())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use r402::proto::{PaymentPayloadV1, PaymentRequirementsV1, SupportedKind};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpFacilitatorClient {
        HttpFacilitatorClient::new(FacilitatorConfig::new(format!("{}/", server.uri()))).unwrap()
    }

    fn payment() -> (VersionedPayload, VersionedRequirements) {
        let payload = PaymentPayloadV1 {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            payload: json!({ "signature": "0xsig" }),
        };
        let requirements = PaymentRequirementsV1 {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: "100000".into(),
            resource: "http://localhost/api/data".into(),
            description: String::new(),
            mime_type: String::new(),
            pay_to: "0xpayee".into(),
            max_timeout_seconds: 300,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            output_schema: None,
            extra: None,
        };
        (payload.into(), requirements.into())
    }

    #[tokio::test]
    async fn test_verify_posts_versioned_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(body_partial_json(json!({
                "x402Version": 1,
                "paymentPayload": { "network": "base-sepolia" },
                "paymentRequirements": { "maxAmountRequired": "100000" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isValid": false,
                "invalidReason": "expired"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (payload, requirements) = payment();
        let response = client_for(&server)
            .verify(&payload, &requirements)
            .await
            .unwrap();
        assert!(!response.is_valid);
        assert_eq!(response.invalid_reason.as_deref(), Some("expired"));
    }

    #[tokio::test]
    async fn test_settle_sends_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(SettleResponse::success("0xtx", "base-sepolia", "0xpayer")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let config = FacilitatorConfig::new(server.uri())
            .with_auth(StaticAuthProvider::bearer("secret").unwrap());
        let client = HttpFacilitatorClient::new(config).unwrap();
        let (payload, requirements) = payment();
        let response = client.settle(&payload, &requirements).await.unwrap();
        assert!(response.success);
        assert_eq!(response.transaction, "0xtx");
    }

    #[tokio::test]
    async fn test_supported_is_decoded() {
        let server = MockServer::start().await;
        let supported = SupportedResponse {
            kinds: vec![SupportedKind {
                x402_version: 2,
                scheme: "exact".into(),
                network: "eip155:*".into(),
                extra: None,
            }],
            ..SupportedResponse::default()
        };
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(ResponseTemplate::new(200).set_body_json(&supported))
            .mount(&server)
            .await;

        let response = client_for(&server).get_supported().await.unwrap();
        assert_eq!(response, supported);
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let (payload, requirements) = payment();
        let err = client_for(&server)
            .settle(&payload, &requirements)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FacilitatorError::Status {
                endpoint: "settle",
                status: 503,
                body: "busy".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_unparseable_body_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/supported"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_supported().await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Decode { endpoint: "supported", .. }));
    }

    #[test]
    fn test_bearer_rejects_invalid_token() {
        assert!(StaticAuthProvider::bearer("bad\ntoken").is_err());
    }
}
