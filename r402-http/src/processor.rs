//! Request and Settlement Processors.
//!
//! [`X402HttpServer`] is framework-agnostic: it reads requests through
//! [`HttpAdapter`] and answers with a [`ProcessResult`]. After the protected
//! handler has produced its response, the adapter calls
//! [`process_settlement`](X402HttpServer::process_settlement) and applies
//! the [`Finalization`] returned by
//! [`finalize_settlement`](X402HttpServer::finalize_settlement).

use std::sync::Arc;

use r402::error::ServerError;
use r402::proto::{
    ProtocolVersion, ResourceInfo, VersionedPayload, VersionedPaymentRequired,
    VersionedRequirements,
};
use r402::server::X402ResourceServer;
use serde_json::{Value, json};

#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::constants::{
    ACCESS_CONTROL_EXPOSE_HEADERS, APPLICATION_JSON, BROWSER_USER_AGENT_MARKER,
    CONTENT_TYPE_HEADER, ERROR_NO_MATCHING_REQUIREMENTS, ERROR_PAYMENT_REQUIRED,
    ERROR_SETTLEMENT_FAILED, ERROR_VERIFICATION_FAILED, HTTP_STATUS_PAYMENT_REQUIRED,
    PAYMENT_REQUIRED_HEADER, PAYMENT_RESPONSE_HEADER, PAYMENT_SIGNATURE_HEADER, TEXT_HTML,
    X_PAYMENT_HEADER,
};
use crate::error::{RouteConfigurationError, SettlementError};
use crate::headers::{decode_payment_payload, encode_payment_required, encode_settle_response};
use crate::paywall::{PaywallProvider, PaywallRegistry};
use crate::routes::RouteTable;
use crate::types::{
    Finalization, HttpAdapter, PaymentErrorResponse, PaywallConfig, ProcessResult,
    ResponseBody, RouteConfig, RouteValidationError, Routes, SettlementOutcome,
};

/// HTTP-level x402 engine: route matching, payment verification and
/// settlement, on top of an [`X402ResourceServer`].
///
/// Immutable after construction; share it behind an [`Arc`].
pub struct X402HttpServer {
    server: Arc<X402ResourceServer>,
    routes: RouteTable,
    paywall: Box<dyn PaywallProvider>,
    paywall_config: PaywallConfig,
}

impl std::fmt::Debug for X402HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402HttpServer")
            .field("server", &self.server)
            .field("routes", &self.routes.len())
            .field("paywall_config", &self.paywall_config)
            .finish_non_exhaustive()
    }
}

impl X402HttpServer {
    /// Compiles `routes` against an already-initialized resource server.
    ///
    /// Routes are not validated here; see
    /// [`validate_routes`](Self::validate_routes).
    ///
    /// # Errors
    ///
    /// Returns [`RouteConfigurationError::InvalidPattern`] if a pattern does
    /// not compile.
    pub fn new(
        server: Arc<X402ResourceServer>,
        routes: impl Into<Routes>,
    ) -> Result<Self, RouteConfigurationError> {
        Ok(Self {
            server,
            routes: RouteTable::compile(&routes.into())?,
            paywall: Box::new(PaywallRegistry::with_defaults()),
            paywall_config: PaywallConfig::default(),
        })
    }

    /// Initializes `server` against its facilitators, compiles `routes` and
    /// checks that every payment option can be served.
    ///
    /// # Errors
    ///
    /// Returns [`RouteConfigurationError`] if discovery fails, a pattern
    /// does not compile, or any option fails validation.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.http.initialize", skip_all, err)
    )]
    pub async fn initialize(
        mut server: X402ResourceServer,
        routes: impl Into<Routes>,
    ) -> Result<Self, RouteConfigurationError> {
        server
            .initialize()
            .await
            .map_err(RouteConfigurationError::Initialize)?;
        let http = Self::new(Arc::new(server), routes)?;
        http.validate_routes()?;
        Ok(http)
    }

    /// Replaces the paywall renderer used for browser requests.
    #[must_use]
    pub fn with_paywall_provider(mut self, provider: impl PaywallProvider + 'static) -> Self {
        self.paywall = Box::new(provider);
        self
    }

    /// Sets the paywall UI configuration.
    #[must_use]
    pub fn with_paywall_config(mut self, config: PaywallConfig) -> Self {
        self.paywall_config = config;
        self
    }

    /// The underlying resource server.
    #[must_use]
    pub fn server(&self) -> &X402ResourceServer {
        &self.server
    }

    /// The compiled route table.
    #[must_use]
    pub const fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Returns `true` if `method` and `path` hit a protected route.
    #[must_use]
    pub fn requires_payment(&self, method: &str, path: &str) -> bool {
        self.routes.find(method, path).is_some()
    }

    /// Checks that every payment option of every route has a known network,
    /// a registered scheme server, facilitator support and a resolvable
    /// price.
    ///
    /// # Errors
    ///
    /// Returns [`RouteConfigurationError::Validation`] listing every
    /// problem found.
    pub fn validate_routes(&self) -> Result<(), RouteConfigurationError> {
        let mut errors = Vec::new();

        for route in self.routes.iter() {
            let config = route.config();
            let version = match config.protocol_version() {
                Ok(version) => version,
                Err(e) => {
                    errors.push(RouteValidationError {
                        route_pattern: route.pattern().to_owned(),
                        scheme: String::new(),
                        network: String::new(),
                        reason: "invalid_version".to_owned(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };

            let probe = ResourceInfo {
                url: route.pattern().to_owned(),
                description: None,
                mime_type: None,
            };
            for option in &config.accepts {
                if let Err(e) = self
                    .server
                    .build_payment_requirements(option, &probe, version)
                {
                    errors.push(RouteValidationError {
                        route_pattern: route.pattern().to_owned(),
                        scheme: option.scheme.clone(),
                        network: option.network.clone(),
                        reason: validation_reason(&e).to_owned(),
                        message: e.to_string(),
                    });
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }

        #[cfg(feature = "telemetry")]
        {
            for error in &errors {
                tracing::error!(
                    route = %error.route_pattern,
                    scheme = %error.scheme,
                    network = %error.network,
                    reason = %error.reason,
                    "{}",
                    error.message
                );
            }
        }

        Err(RouteConfigurationError::Validation(errors))
    }

    /// Runs the request state machine.
    ///
    /// Unprotected requests yield [`ProcessResult::NoPaymentRequired`]. A
    /// missing, unmatched or rejected payment yields
    /// [`ProcessResult::PaymentError`] with a ready-to-send 402. A payment
    /// the facilitator accepts yields [`ProcessResult::PaymentVerified`].
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "x402.http.process_request",
            skip_all,
            fields(method = ctx.method(), path = ctx.path())
        )
    )]
    pub async fn process_request<A: HttpAdapter + ?Sized>(&self, ctx: &A) -> ProcessResult {
        let Some(route) = self.routes.find(ctx.method(), ctx.path()) else {
            return ProcessResult::NoPaymentRequired;
        };
        let config = route.config();

        let resource = ResourceInfo {
            url: config
                .resource
                .clone()
                .unwrap_or_else(|| ctx.url().to_owned()),
            description: config.description.clone(),
            mime_type: config.mime_type.clone(),
        };
        let extensions = self.route_extensions(config, ctx);

        let (version, requirements) = match self.build_requirements(config, &resource) {
            Ok(built) => built,
            Err(message) => {
                let required = self.server.create_payment_required(
                    ProtocolVersion::V2,
                    &[],
                    resource,
                    Some(format!("Failed to build payment requirements: {message}")),
                    extensions,
                );
                return payment_error(&required, None);
            }
        };

        let Some(payload) = extract_payment(ctx) else {
            let required = self.server.create_payment_required(
                version,
                &requirements,
                resource,
                Some(ERROR_PAYMENT_REQUIRED.to_owned()),
                extensions,
            );
            let html = is_browser(ctx).then(|| {
                config
                    .custom_paywall_html
                    .clone()
                    .unwrap_or_else(|| self.paywall.generate_html(&required, &self.paywall_config))
            });
            return payment_error(&required, html);
        };

        let Some(matched) = self
            .server
            .find_matching_requirements(&requirements, &payload)
            .cloned()
        else {
            #[cfg(feature = "telemetry")]
            tracing::debug!(
                scheme = payload.scheme(),
                network = payload.network(),
                "payload matches no offered requirement"
            );
            let required = self.server.create_payment_required(
                version,
                &requirements,
                resource,
                Some(ERROR_NO_MATCHING_REQUIREMENTS.to_owned()),
                extensions,
            );
            return payment_error(&required, None);
        };

        let reason = match self.server.verify_payment(&payload, &matched).await {
            Ok(response) if response.is_valid => {
                return ProcessResult::PaymentVerified {
                    payload,
                    requirements: matched,
                };
            }
            Ok(response) => response
                .invalid_reason
                .unwrap_or_else(|| ERROR_VERIFICATION_FAILED.to_owned()),
            Err(e) => e.to_string(),
        };

        #[cfg(feature = "telemetry")]
        tracing::debug!(reason = %reason, "payment verification rejected");

        let required = self.server.create_payment_required(
            version,
            &requirements,
            resource,
            Some(reason),
            extensions,
        );
        payment_error(&required, None)
    }

    /// Settles a verified payment once the protected handler has answered
    /// with `status`.
    ///
    /// Returns `Ok(None)` without contacting the facilitator when `status`
    /// is 400 or above.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError`] if the facilitator rejects the settlement
    /// or cannot be reached.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.http.process_settlement", skip_all, err, fields(status = status))
    )]
    pub async fn process_settlement(
        &self,
        payload: &VersionedPayload,
        requirements: &VersionedRequirements,
        status: u16,
    ) -> Result<Option<SettlementOutcome>, SettlementError> {
        if status >= 400 {
            #[cfg(feature = "telemetry")]
            tracing::debug!("protected response failed, skipping settlement");
            return Ok(None);
        }

        let response = self.server.settle_payment(payload, requirements).await?;
        if !response.success {
            let reason = response
                .error_reason
                .clone()
                .unwrap_or_else(|| ERROR_SETTLEMENT_FAILED.to_owned());
            return Err(SettlementError::Failed {
                reason,
                response: Box::new(response),
            });
        }

        let encoded = encode_settle_response(&response)?;
        Ok(Some(SettlementOutcome {
            response,
            headers: vec![
                (PAYMENT_RESPONSE_HEADER.to_owned(), encoded),
                (
                    ACCESS_CONTROL_EXPOSE_HEADERS.to_owned(),
                    PAYMENT_RESPONSE_HEADER.to_owned(),
                ),
            ],
        }))
    }

    /// Decides what happens to the protected response given the settlement
    /// outcome and whether the response has already been sent.
    #[must_use]
    pub fn finalize_settlement(
        &self,
        result: Result<Option<SettlementOutcome>, SettlementError>,
        requirements: &VersionedRequirements,
        committed: bool,
    ) -> Finalization {
        match result {
            Ok(None) => Finalization::Unchanged,
            Ok(Some(outcome)) => Finalization::AttachHeaders(outcome.headers),
            Err(e) if committed => {
                report("settlement failed after the response was sent", &e);
                Finalization::KeepCommitted
            }
            Err(e) => {
                report("settlement failed, replacing the response", &e);
                Finalization::Replace(self.settlement_failure_response(&e, requirements))
            }
        }
    }

    /// The 402 that replaces an uncommitted response whose settlement
    /// failed.
    fn settlement_failure_response(
        &self,
        error: &SettlementError,
        requirements: &VersionedRequirements,
    ) -> PaymentErrorResponse {
        let resource = ResourceInfo {
            url: requirements.resource_url().unwrap_or_default().to_owned(),
            description: None,
            mime_type: None,
        };
        let required = self.server.create_payment_required(
            requirements.version(),
            std::slice::from_ref(requirements),
            resource,
            Some(error.reason()),
            None,
        );

        let mut response = build_json_response(&required);
        if let SettlementError::Failed { response: receipt, .. } = error {
            if let Ok(encoded) = encode_settle_response(receipt) {
                response
                    .headers
                    .push((PAYMENT_RESPONSE_HEADER.to_owned(), encoded));
                expose_header(&mut response, PAYMENT_RESPONSE_HEADER);
            }
        }
        response
    }

    /// Builds every option of `config` at the route's protocol version.
    ///
    /// When the version is inferred rather than forced, each option is also
    /// built at the other version, so a client may pay with either payload
    /// shape. Those extra requirements only take part in matching; options
    /// the other version cannot serve are skipped.
    fn build_requirements(
        &self,
        config: &RouteConfig,
        resource: &ResourceInfo,
    ) -> Result<(ProtocolVersion, Vec<VersionedRequirements>), String> {
        let version = config.protocol_version().map_err(|e| e.to_string())?;
        let mut requirements = config
            .accepts
            .iter()
            .map(|option| {
                self.server
                    .build_payment_requirements(option, resource, version)
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                #[cfg(feature = "telemetry")]
                tracing::error!(error = %e, "failed to build payment requirements");
                e.to_string()
            })?;

        if config.x402_version.is_none() {
            let other = match version {
                ProtocolVersion::V1 => ProtocolVersion::V2,
                ProtocolVersion::V2 => ProtocolVersion::V1,
            };
            requirements.extend(config.accepts.iter().filter_map(|option| {
                self.server
                    .build_payment_requirements(option, resource, other)
                    .ok()
            }));
        }
        Ok((version, requirements))
    }

    fn route_extensions<A: HttpAdapter + ?Sized>(
        &self,
        config: &RouteConfig,
        ctx: &A,
    ) -> Option<Value> {
        let declarations = config.extensions.as_ref()?;
        let transport = json!({ "method": ctx.method(), "url": ctx.url() });
        Some(self.server.enrich_extensions(declarations, &transport))
    }
}

/// Wraps a 402 as a [`ProcessResult`]; `html` replaces the JSON body for
/// browsers.
fn payment_error(required: &VersionedPaymentRequired, html: Option<String>) -> ProcessResult {
    let response = match html {
        Some(html) => PaymentErrorResponse {
            status: HTTP_STATUS_PAYMENT_REQUIRED,
            headers: vec![(CONTENT_TYPE_HEADER.to_owned(), TEXT_HTML.to_owned())],
            body: ResponseBody::Html(html),
        },
        None => build_json_response(required),
    };
    ProcessResult::PaymentError { response }
}

fn validation_reason(error: &ServerError) -> &'static str {
    match error {
        ServerError::UnknownNetwork { .. } => "unknown_network",
        ServerError::SchemeNotFound { .. } => "missing_scheme",
        ServerError::UnsupportedKind { .. } | ServerError::NotInitialized => {
            "missing_facilitator"
        }
        ServerError::Price(_) => "invalid_price",
        ServerError::Aborted(_) | ServerError::Facilitator(_) => "facilitator_error",
    }
}

/// JSON 402; V2 additionally carries the `PAYMENT-REQUIRED` header.
fn build_json_response(required: &VersionedPaymentRequired) -> PaymentErrorResponse {
    let body = serde_json::to_value(required).unwrap_or_default();
    let mut response = PaymentErrorResponse {
        status: HTTP_STATUS_PAYMENT_REQUIRED,
        headers: vec![(CONTENT_TYPE_HEADER.to_owned(), APPLICATION_JSON.to_owned())],
        body: ResponseBody::Json(body),
    };

    if required.version() == ProtocolVersion::V2 {
        match encode_payment_required(required) {
            Ok(encoded) => {
                response
                    .headers
                    .push((PAYMENT_REQUIRED_HEADER.to_owned(), encoded));
                expose_header(&mut response, PAYMENT_REQUIRED_HEADER);
            }
            Err(e) => report("failed to encode PAYMENT-REQUIRED header", &e),
        }
    }
    response
}

#[cfg(feature = "telemetry")]
fn report<E: std::fmt::Display>(context: &str, error: &E) {
    tracing::warn!(error = %error, "{context}");
}

#[cfg(not(feature = "telemetry"))]
fn report<E: std::fmt::Display>(_context: &str, _error: &E) {}

fn expose_header(response: &mut PaymentErrorResponse, name: &str) {
    if let Some((_, value)) = response
        .headers
        .iter_mut()
        .find(|(key, _)| key.eq_ignore_ascii_case(ACCESS_CONTROL_EXPOSE_HEADERS))
    {
        value.push_str(", ");
        value.push_str(name);
    } else {
        response
            .headers
            .push((ACCESS_CONTROL_EXPOSE_HEADERS.to_owned(), name.to_owned()));
    }
}

/// Reads the payment header; a malformed value counts as no payment.
fn extract_payment<A: HttpAdapter + ?Sized>(ctx: &A) -> Option<VersionedPayload> {
    let raw = ctx
        .header(PAYMENT_SIGNATURE_HEADER)
        .or_else(|| ctx.header(X_PAYMENT_HEADER))?;
    decode_payment_payload(raw)
        .map_err(|err| {
            #[cfg(feature = "telemetry")]
            tracing::warn!(error = %err, "ignoring malformed payment header");
            err
        })
        .ok()
}

/// A browser asks for HTML and identifies with a browser user agent.
fn is_browser<A: HttpAdapter + ?Sized>(ctx: &A) -> bool {
    let wants_html = ctx
        .accept_header()
        .is_some_and(|accept| accept.to_ascii_lowercase().contains(TEXT_HTML));
    let browser_agent = ctx
        .user_agent()
        .is_some_and(|agent| agent.contains(BROWSER_USER_AGENT_MARKER));
    wants_html && browser_agent
}
