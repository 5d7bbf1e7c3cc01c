//! x402 resource server.
//!
//! [`X402ResourceServer`] owns everything the transport layer needs to price
//! and collect payments: scheme servers that resolve prices, facilitator
//! clients that verify and settle, the network registry that translates
//! between V1 names and CAIP-2 identifiers, lifecycle hooks and extensions.
//!
//! It is built and [initialized](X402ResourceServer::initialize) once at
//! startup and only read afterwards, so a single instance can be shared
//! across concurrent requests behind an `Arc`.

use std::collections::HashMap;

use r402_proto::versioned::matches_network_pattern;
use r402_proto::{
    Network, PaymentRequired, PaymentRequiredV1, PaymentRequirements, PaymentRequirementsV1,
    ProtocolVersion, RESOURCE_URL_EXTRA_KEY, ResourceInfo, SettleResponse, SupportedKind,
    VerifyResponse, VersionedPayload, VersionedPaymentRequired, VersionedRequirements,
};
use serde_json::{Map, Value};
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::config::{AssetAmount, ResourceConfig};
use crate::error::ServerError;
use crate::facilitator::FacilitatorClient;
use crate::hooks::{
    AfterSettleHook, AfterVerifyHook, BeforeSettleHook, BeforeVerifyHook, FailureContext,
    OnSettleFailureHook, OnVerifyFailureHook, PaymentContext, SettleResultContext,
    VerifyResultContext,
};
use crate::networks::NetworkRegistry;
use crate::scheme::SchemeServer;

/// Extension interface for enriching payment declarations with
/// transport-specific data (e.g., HTTP request context).
pub trait ResourceServerExtension: Send + Sync {
    /// Unique extension key (e.g., `"bazaar"`).
    fn key(&self) -> &str;

    /// Enriches an extension declaration with transport-specific data.
    ///
    /// - `declaration`: the extension declaration from the route config.
    /// - `transport_context`: opaque transport context (e.g., HTTP method
    ///   and URL of the request being priced).
    fn enrich_declaration(&self, declaration: Value, transport_context: &Value) -> Value;
}

/// x402 resource server with scheme registration, facilitator discovery,
/// requirement building and verify/settle delegation.
pub struct X402ResourceServer {
    facilitator_clients: Vec<Box<dyn FacilitatorClient>>,
    schemes: Vec<(Network, Box<dyn SchemeServer>)>,
    supported: Vec<(usize, SupportedKind)>,
    networks: NetworkRegistry,
    extensions: HashMap<String, Box<dyn ResourceServerExtension>>,
    before_verify_hooks: Vec<BeforeVerifyHook>,
    after_verify_hooks: Vec<AfterVerifyHook>,
    on_verify_failure_hooks: Vec<OnVerifyFailureHook>,
    before_settle_hooks: Vec<BeforeSettleHook>,
    after_settle_hooks: Vec<AfterSettleHook>,
    on_settle_failure_hooks: Vec<OnSettleFailureHook>,
    initialized: bool,
}

impl std::fmt::Debug for X402ResourceServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402ResourceServer")
            .field("facilitator_clients_count", &self.facilitator_clients.len())
            .field(
                "schemes",
                &self
                    .schemes
                    .iter()
                    .map(|(network, server)| format!("{}@{network}", server.scheme()))
                    .collect::<Vec<_>>(),
            )
            .field("supported_kinds", &self.supported.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl Default for X402ResourceServer {
    fn default() -> Self {
        Self::new()
    }
}

impl X402ResourceServer {
    /// Creates a server with no facilitators and the built-in network registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            facilitator_clients: Vec::new(),
            schemes: Vec::new(),
            supported: Vec::new(),
            networks: NetworkRegistry::known(),
            extensions: HashMap::new(),
            before_verify_hooks: Vec::new(),
            after_verify_hooks: Vec::new(),
            on_verify_failure_hooks: Vec::new(),
            before_settle_hooks: Vec::new(),
            after_settle_hooks: Vec::new(),
            on_settle_failure_hooks: Vec::new(),
            initialized: false,
        }
    }

    /// Creates a server with one facilitator client.
    #[must_use]
    pub fn with_facilitator(client: Box<dyn FacilitatorClient>) -> Self {
        let mut server = Self::new();
        server.facilitator_clients.push(client);
        server
    }

    /// Adds a facilitator client. Earlier clients take precedence when
    /// several support the same kind.
    pub fn add_facilitator(&mut self, client: Box<dyn FacilitatorClient>) -> &mut Self {
        self.facilitator_clients.push(client);
        self
    }

    /// Replaces the network registry.
    pub fn set_networks(&mut self, networks: NetworkRegistry) -> &mut Self {
        self.networks = networks;
        self
    }

    /// Returns the network registry.
    #[must_use]
    pub const fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    /// Registers a scheme server for a network pattern (`"eip155:84532"`,
    /// `"eip155:*"`, `"base"` or `"*"`).
    pub fn register(
        &mut self,
        network: impl Into<Network>,
        server: Box<dyn SchemeServer>,
    ) -> &mut Self {
        self.schemes.push((network.into(), server));
        self
    }

    /// Checks if a scheme is registered for a network (with wildcard matching).
    #[must_use]
    pub fn has_registered_scheme(&self, network: &str, scheme: &str) -> bool {
        self.find_scheme_server(scheme, network).is_some()
    }

    /// Returns the first supported kind matching `version`, `network` and
    /// `scheme`, honoring wildcard kinds.
    #[must_use]
    pub fn get_supported_kind(
        &self,
        version: ProtocolVersion,
        network: &str,
        scheme: &str,
    ) -> Option<&SupportedKind> {
        self.find_supported(version, scheme, network)
            .map(|(_, kind)| kind)
    }

    /// Registers a before-verify hook.
    pub fn on_before_verify(&mut self, hook: BeforeVerifyHook) -> &mut Self {
        self.before_verify_hooks.push(hook);
        self
    }

    /// Registers an after-verify hook.
    pub fn on_after_verify(&mut self, hook: AfterVerifyHook) -> &mut Self {
        self.after_verify_hooks.push(hook);
        self
    }

    /// Registers a verify-failure hook.
    pub fn on_verify_failure(&mut self, hook: OnVerifyFailureHook) -> &mut Self {
        self.on_verify_failure_hooks.push(hook);
        self
    }

    /// Registers a before-settle hook.
    pub fn on_before_settle(&mut self, hook: BeforeSettleHook) -> &mut Self {
        self.before_settle_hooks.push(hook);
        self
    }

    /// Registers an after-settle hook.
    pub fn on_after_settle(&mut self, hook: AfterSettleHook) -> &mut Self {
        self.after_settle_hooks.push(hook);
        self
    }

    /// Registers a settle-failure hook.
    pub fn on_settle_failure(&mut self, hook: OnSettleFailureHook) -> &mut Self {
        self.on_settle_failure_hooks.push(hook);
        self
    }

    /// Registers a [`ResourceServerExtension`].
    pub fn register_extension(&mut self, ext: Box<dyn ResourceServerExtension>) -> &mut Self {
        self.extensions.insert(ext.key().to_owned(), ext);
        self
    }

    /// Enriches extension declarations using registered extensions.
    ///
    /// Keys without a registered extension are passed through unchanged.
    #[must_use]
    pub fn enrich_extensions(&self, declarations: &Value, transport_context: &Value) -> Value {
        let Some(obj) = declarations.as_object() else {
            return declarations.clone();
        };

        let mut result = obj.clone();
        for (key, value) in obj {
            if let Some(ext) = self.extensions.get(key) {
                result.insert(
                    key.clone(),
                    ext.enrich_declaration(value.clone(), transport_context),
                );
            }
        }

        Value::Object(result)
    }

    /// Fetches supported kinds from every facilitator client.
    ///
    /// Must be called before building requirements or verifying payments.
    ///
    /// # Errors
    ///
    /// Returns an error if any facilitator client fails to respond.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.resource_server.initialize", skip_all, err)
    )]
    pub async fn initialize(&mut self) -> Result<(), ServerError> {
        let mut supported = Vec::new();
        for (idx, client) in self.facilitator_clients.iter().enumerate() {
            let response = client.get_supported().await?;
            supported.extend(response.kinds.into_iter().map(|kind| (idx, kind)));
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!(kinds = supported.len(), "facilitator kinds discovered");

        self.supported = supported;
        self.initialized = true;
        Ok(())
    }

    /// Returns whether the server has been initialized.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Expresses `network` in the form used by `version`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::UnknownNetwork`] if the registry cannot
    /// translate it.
    pub fn wire_network(
        &self,
        network: &str,
        version: ProtocolVersion,
    ) -> Result<Network, ServerError> {
        let translated = match version {
            ProtocolVersion::V1 => self.networks.to_v1_name(network),
            ProtocolVersion::V2 => self.networks.to_caip2(network),
        };
        translated.ok_or_else(|| ServerError::UnknownNetwork {
            network: network.to_owned(),
            version: version.as_u32(),
        })
    }

    /// Checks that a payment option can be served at `version`: its network
    /// translates, a scheme server is registered and a facilitator supports
    /// it.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn check_support(
        &self,
        config: &ResourceConfig,
        version: ProtocolVersion,
    ) -> Result<(), ServerError> {
        let network = self.wire_network(&config.network, version)?;
        self.find_scheme_server(&config.scheme, &config.network)
            .ok_or_else(|| ServerError::SchemeNotFound {
                scheme: config.scheme.clone(),
                network: config.network.clone(),
            })?;
        self.find_supported(version, &config.scheme, &network)
            .ok_or_else(|| ServerError::UnsupportedKind {
                version: version.as_u32(),
                scheme: config.scheme.clone(),
                network,
            })?;
        Ok(())
    }

    /// Builds the payment requirements for one payment option.
    ///
    /// The resulting `extra` merges, in increasing priority: facilitator
    /// advertised data, the resolved asset's data, the option's `extra`, and
    /// finally `resourceUrl` set to `resource.url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, the network or
    /// scheme is unknown, no facilitator supports the kind, or the price
    /// cannot be resolved.
    pub fn build_payment_requirements(
        &self,
        config: &ResourceConfig,
        resource: &ResourceInfo,
        version: ProtocolVersion,
    ) -> Result<VersionedRequirements, ServerError> {
        if !self.initialized {
            return Err(ServerError::NotInitialized);
        }

        let network = self.wire_network(&config.network, version)?;
        let server = self
            .find_scheme_server(&config.scheme, &config.network)
            .ok_or_else(|| ServerError::SchemeNotFound {
                scheme: config.scheme.clone(),
                network: config.network.clone(),
            })?;
        let (_, kind) = self
            .find_supported(version, &config.scheme, &network)
            .ok_or_else(|| ServerError::UnsupportedKind {
                version: version.as_u32(),
                scheme: config.scheme.clone(),
                network: network.clone(),
            })?;

        let canonical = self
            .networks
            .to_caip2(&config.network)
            .unwrap_or_else(|| config.network.clone());
        let AssetAmount {
            asset,
            amount,
            extra: asset_extra,
        } = server.parse_price(&config.price, &canonical)?;

        let mut extra = Map::new();
        merge_object(&mut extra, asset_extra.as_ref());
        merge_object(&mut extra, config.extra.as_ref());
        server.enhance_extra(&mut extra, kind);
        extra.insert(
            RESOURCE_URL_EXTRA_KEY.to_owned(),
            Value::String(resource.url.clone()),
        );

        let requirements = match version {
            ProtocolVersion::V1 => PaymentRequirementsV1 {
                scheme: config.scheme.clone(),
                network,
                max_amount_required: amount,
                resource: resource.url.clone(),
                description: resource.description.clone().unwrap_or_default(),
                mime_type: resource.mime_type.clone().unwrap_or_default(),
                pay_to: config.pay_to.clone(),
                max_timeout_seconds: config.timeout(),
                asset,
                output_schema: None,
                extra: Some(Value::Object(extra)),
            }
            .into(),
            ProtocolVersion::V2 => PaymentRequirements {
                scheme: config.scheme.clone(),
                network,
                asset,
                amount,
                pay_to: config.pay_to.clone(),
                max_timeout_seconds: config.timeout(),
                extra: Value::Object(extra),
            }
            .into(),
        };
        Ok(requirements)
    }

    /// Creates a 402 negotiation response.
    ///
    /// Requirements shaped for another version than `version` are dropped.
    /// V1 responses carry neither resource info nor extensions.
    #[must_use]
    pub fn create_payment_required(
        &self,
        version: ProtocolVersion,
        requirements: &[VersionedRequirements],
        resource: ResourceInfo,
        error: Option<String>,
        extensions: Option<Value>,
    ) -> VersionedPaymentRequired {
        match version {
            ProtocolVersion::V1 => VersionedPaymentRequired::V1(Box::new(PaymentRequiredV1 {
                x402_version: 1,
                error,
                accepts: requirements
                    .iter()
                    .filter_map(|r| match r {
                        VersionedRequirements::V1(r) => Some((**r).clone()),
                        VersionedRequirements::V2(_) => None,
                    })
                    .collect(),
            })),
            ProtocolVersion::V2 => VersionedPaymentRequired::V2(Box::new(PaymentRequired {
                x402_version: 2,
                error,
                resource: Some(resource),
                accepts: requirements
                    .iter()
                    .filter_map(|r| match r {
                        VersionedRequirements::V2(r) => Some((**r).clone()),
                        VersionedRequirements::V1(_) => None,
                    })
                    .collect(),
                extensions,
            })),
        }
    }

    /// Finds the first requirement whose scheme and network equal the
    /// payload's.
    #[must_use]
    pub fn find_matching_requirements<'a>(
        &self,
        available: &'a [VersionedRequirements],
        payload: &VersionedPayload,
    ) -> Option<&'a VersionedRequirements> {
        available.iter().find(|req| req.matches(payload))
    }

    /// Verifies a payment via the facilitator supporting its requirements,
    /// with the full hook lifecycle.
    ///
    /// An `isValid: false` answer is returned as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, no facilitator
    /// supports the requirements, a hook aborts, or the facilitator call
    /// fails and no failure hook recovers.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "x402.resource_server.verify",
            skip_all,
            err,
            fields(scheme = requirements.scheme(), network = requirements.network())
        )
    )]
    pub async fn verify_payment(
        &self,
        payload: &VersionedPayload,
        requirements: &VersionedRequirements,
    ) -> Result<VerifyResponse, ServerError> {
        if !self.initialized {
            return Err(ServerError::NotInitialized);
        }

        let ctx = PaymentContext {
            payload: payload.clone(),
            requirements: requirements.clone(),
        };

        for hook in &self.before_verify_hooks {
            if let Some(abort) = hook(&ctx).await {
                return Err(ServerError::Aborted(abort.reason));
            }
        }

        let result = match self.find_facilitator_client(requirements) {
            Ok(client) => client
                .verify(payload, requirements)
                .await
                .map_err(ServerError::from),
            Err(e) => Err(e),
        };

        let error = match &result {
            Ok(response) if response.is_valid => {
                let result_ctx = VerifyResultContext {
                    payment: ctx,
                    result: response.clone(),
                };
                for hook in &self.after_verify_hooks {
                    hook(&result_ctx).await;
                }
                return result;
            }
            Ok(response) => response.invalid_reason.clone().unwrap_or_default(),
            Err(e) => e.to_string(),
        };

        let failure_ctx = FailureContext {
            payment: ctx,
            error,
        };
        for hook in &self.on_verify_failure_hooks {
            if let Some(recovered) = hook(&failure_ctx).await {
                return Ok(recovered.result);
            }
        }
        result
    }

    /// Settles a payment via the facilitator supporting its requirements,
    /// with the full hook lifecycle.
    ///
    /// A `success: false` answer is returned as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is not initialized, no facilitator
    /// supports the requirements, a hook aborts, or the facilitator call
    /// fails and no failure hook recovers.
    #[cfg_attr(
        feature = "telemetry",
        instrument(
            name = "x402.resource_server.settle",
            skip_all,
            err,
            fields(scheme = requirements.scheme(), network = requirements.network())
        )
    )]
    pub async fn settle_payment(
        &self,
        payload: &VersionedPayload,
        requirements: &VersionedRequirements,
    ) -> Result<SettleResponse, ServerError> {
        if !self.initialized {
            return Err(ServerError::NotInitialized);
        }

        let ctx = PaymentContext {
            payload: payload.clone(),
            requirements: requirements.clone(),
        };

        for hook in &self.before_settle_hooks {
            if let Some(abort) = hook(&ctx).await {
                return Err(ServerError::Aborted(abort.reason));
            }
        }

        let result = match self.find_facilitator_client(requirements) {
            Ok(client) => client
                .settle(payload, requirements)
                .await
                .map_err(ServerError::from),
            Err(e) => Err(e),
        };

        let error = match &result {
            Ok(response) if response.success => {
                let result_ctx = SettleResultContext {
                    payment: ctx,
                    result: response.clone(),
                };
                for hook in &self.after_settle_hooks {
                    hook(&result_ctx).await;
                }
                return result;
            }
            Ok(response) => response.error_reason.clone().unwrap_or_default(),
            Err(e) => e.to_string(),
        };

        let failure_ctx = FailureContext {
            payment: ctx,
            error,
        };
        for hook in &self.on_settle_failure_hooks {
            if let Some(recovered) = hook(&failure_ctx).await {
                return Ok(recovered.result);
            }
        }
        result
    }

    /// Finds the scheme server for `scheme` whose pattern matches `network`
    /// in either of its forms.
    fn find_scheme_server(&self, scheme: &str, network: &str) -> Option<&dyn SchemeServer> {
        let canonical = self.networks.to_caip2(network);
        self.schemes
            .iter()
            .find(|(pattern, server)| {
                server.scheme() == scheme
                    && (matches_network_pattern(network, pattern)
                        || canonical
                            .as_deref()
                            .is_some_and(|c| matches_network_pattern(c, pattern)))
            })
            .map(|(_, server)| server.as_ref())
    }

    fn find_supported(
        &self,
        version: ProtocolVersion,
        scheme: &str,
        network: &str,
    ) -> Option<&(usize, SupportedKind)> {
        self.supported.iter().find(|(_, kind)| {
            kind.x402_version == version.as_u32()
                && kind.scheme == scheme
                && matches_network_pattern(network, &kind.network)
        })
    }

    fn find_facilitator_client(
        &self,
        requirements: &VersionedRequirements,
    ) -> Result<&dyn FacilitatorClient, ServerError> {
        let unsupported = || ServerError::UnsupportedKind {
            version: requirements.version().as_u32(),
            scheme: requirements.scheme().to_owned(),
            network: requirements.network().to_owned(),
        };
        let (idx, _) = self
            .find_supported(
                requirements.version(),
                requirements.scheme(),
                requirements.network(),
            )
            .ok_or_else(unsupported)?;
        self.facilitator_clients
            .get(*idx)
            .map(AsRef::as_ref)
            .ok_or_else(unsupported)
    }
}

fn merge_object(target: &mut Map<String, Value>, source: Option<&Value>) {
    if let Some(Value::Object(source)) = source {
        for (key, value) in source {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use r402_proto::{PaymentPayloadV1, SupportedResponse};
    use serde_json::json;

    use super::*;
    use crate::error::FacilitatorError;
    use crate::facilitator::BoxFuture;
    use crate::hooks::{AbortResult, RecoveredVerifyResult};
    use crate::scheme::ExactUsdcServer;

    struct FakeFacilitator {
        kinds: Vec<SupportedKind>,
        verify: VerifyResponse,
        verify_calls: Arc<AtomicUsize>,
    }

    impl FacilitatorClient for FakeFacilitator {
        fn verify<'a>(
            &'a self,
            _payload: &'a VersionedPayload,
            _requirements: &'a VersionedRequirements,
        ) -> BoxFuture<'a, Result<VerifyResponse, FacilitatorError>> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            let response = self.verify.clone();
            Box::pin(async move { Ok(response) })
        }

        fn settle<'a>(
            &'a self,
            _payload: &'a VersionedPayload,
            _requirements: &'a VersionedRequirements,
        ) -> BoxFuture<'a, Result<SettleResponse, FacilitatorError>> {
            Box::pin(async { Err(FacilitatorError::Other("settle unavailable".into())) })
        }

        fn get_supported(&self) -> BoxFuture<'_, Result<SupportedResponse, FacilitatorError>> {
            let kinds = self.kinds.clone();
            Box::pin(async move {
                Ok(SupportedResponse {
                    kinds,
                    ..SupportedResponse::default()
                })
            })
        }
    }

    fn kind(version: u32, network: &str) -> SupportedKind {
        SupportedKind {
            x402_version: version,
            scheme: "exact".into(),
            network: network.into(),
            extra: None,
        }
    }

    async fn server_with(verify: VerifyResponse) -> (X402ResourceServer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut server = X402ResourceServer::with_facilitator(Box::new(FakeFacilitator {
            kinds: vec![kind(1, "base-sepolia"), kind(2, "eip155:*")],
            verify,
            verify_calls: Arc::clone(&calls),
        }));
        server.register("*", Box::new(ExactUsdcServer));
        server.initialize().await.unwrap();
        (server, calls)
    }

    fn abort_blocked(_ctx: &PaymentContext) -> BoxFuture<'_, Option<AbortResult>> {
        Box::pin(async { Some(AbortResult::new("blocked")) })
    }

    fn recover_expired(ctx: &FailureContext) -> BoxFuture<'_, Option<RecoveredVerifyResult>> {
        Box::pin(async move {
            (ctx.error == "expired").then(|| RecoveredVerifyResult {
                result: VerifyResponse::valid("0xrecovered"),
            })
        })
    }

    fn resource() -> ResourceInfo {
        ResourceInfo {
            url: "https://api.example.com/api/data".into(),
            description: Some("data".into()),
            mime_type: None,
        }
    }

    fn v1_payload() -> VersionedPayload {
        PaymentPayloadV1 {
            x402_version: 1,
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            payload: json!({}),
        }
        .into()
    }

    #[tokio::test]
    async fn test_builds_v1_requirements_from_money_price() {
        let (server, _) = server_with(VerifyResponse::valid("0xpayer")).await;
        let config = ResourceConfig::new("exact", "0xrecipient", "$0.10", "base-sepolia");
        let built = server
            .build_payment_requirements(&config, &resource(), ProtocolVersion::V1)
            .unwrap();

        assert_eq!(built.version(), ProtocolVersion::V1);
        assert_eq!(built.network(), "base-sepolia");
        assert_eq!(built.amount(), "100000");
        assert_eq!(built.resource_url(), Some("https://api.example.com/api/data"));
    }

    #[tokio::test]
    async fn test_v2_translates_flat_network_and_honors_wildcard_kind() {
        let (server, _) = server_with(VerifyResponse::valid("0xpayer")).await;
        let config = ResourceConfig::new("exact", "0xrecipient", "$1", "base-sepolia");
        let built = server
            .build_payment_requirements(&config, &resource(), ProtocolVersion::V2)
            .unwrap();

        assert_eq!(built.network(), "eip155:84532");
        assert_eq!(built.amount(), "1000000");
        assert_eq!(built.extra().unwrap()["version"], "2");
    }

    #[tokio::test]
    async fn test_building_requires_initialize() {
        let server = X402ResourceServer::new();
        let config = ResourceConfig::new("exact", "0xrecipient", "$1", "base");
        assert_eq!(
            server.build_payment_requirements(&config, &resource(), ProtocolVersion::V1),
            Err(ServerError::NotInitialized)
        );
    }

    #[tokio::test]
    async fn test_unsupported_kind_is_reported() {
        let (server, _) = server_with(VerifyResponse::valid("0xpayer")).await;
        let config = ResourceConfig::new("exact", "0xrecipient", "$1", "solana-devnet");
        assert!(matches!(
            server.check_support(&config, ProtocolVersion::V1),
            Err(ServerError::UnsupportedKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_before_hook_abort_skips_facilitator() {
        let (mut server, calls) = server_with(VerifyResponse::valid("0xpayer")).await;
        server.on_before_verify(Box::new(abort_blocked));
        let config = ResourceConfig::new("exact", "0xrecipient", "$1", "base-sepolia");
        let requirements = server
            .build_payment_requirements(&config, &resource(), ProtocolVersion::V1)
            .unwrap();

        let result = server.verify_payment(&v1_payload(), &requirements).await;
        assert_eq!(result, Err(ServerError::Aborted("blocked".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_hook_can_recover_invalid_verification() {
        let (mut server, calls) = server_with(VerifyResponse::invalid("expired")).await;
        server.on_verify_failure(Box::new(recover_expired));
        let config = ResourceConfig::new("exact", "0xrecipient", "$1", "base-sepolia");
        let requirements = server
            .build_payment_requirements(&config, &resource(), ProtocolVersion::V1)
            .unwrap();

        let result = server
            .verify_payment(&v1_payload(), &requirements)
            .await
            .unwrap();
        assert!(result.is_valid);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settle_error_is_surfaced() {
        let (server, _) = server_with(VerifyResponse::valid("0xpayer")).await;
        let config = ResourceConfig::new("exact", "0xrecipient", "$1", "base-sepolia");
        let requirements = server
            .build_payment_requirements(&config, &resource(), ProtocolVersion::V1)
            .unwrap();

        let result = server.settle_payment(&v1_payload(), &requirements).await;
        assert_eq!(
            result,
            Err(ServerError::Facilitator(FacilitatorError::Other(
                "settle unavailable".into()
            )))
        );
    }

    #[test]
    fn test_payment_required_keeps_only_matching_version() {
        let server = X402ResourceServer::new();
        let v2 = VersionedRequirements::from(PaymentRequirements {
            scheme: "exact".into(),
            network: "eip155:8453".into(),
            asset: "0xusdc".into(),
            amount: "1".into(),
            pay_to: "0xrecipient".into(),
            max_timeout_seconds: 60,
            extra: json!({}),
        });
        let required = server.create_payment_required(
            ProtocolVersion::V1,
            &[v2],
            resource(),
            Some("Payment required".into()),
            None,
        );
        assert!(required.accepts().is_empty());
        assert_eq!(required.error(), Some("Payment required"));
    }
}
