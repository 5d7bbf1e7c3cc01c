//! Paywall Selector: picks the page shown to browsers on a 402.
//!
//! Handlers are tried per requirement, in the order the resource owner
//! listed the requirements; for each requirement, handlers are tried in
//! registration order. The first handler that supports a requirement
//! renders the page. When nothing matches, a generic page embedding the
//! serialized `PaymentRequired` is rendered.

use r402::networks::{EVM_NETWORKS, SOLANA_NETWORKS};
use r402::proto::{VersionedPaymentRequired, VersionedRequirements};

use crate::types::PaywallConfig;

/// Renders the paywall page for one network family.
pub trait PaywallNetworkHandler: Send + Sync {
    /// Returns `true` if this handler can render `requirement`.
    fn supports(&self, requirement: &VersionedRequirements) -> bool;

    /// Renders the page for the selected requirement.
    fn generate_html(
        &self,
        requirement: &VersionedRequirements,
        payment_required: &VersionedPaymentRequired,
        config: &PaywallConfig,
    ) -> String;
}

/// Produces the HTML body of a browser 402 response.
pub trait PaywallProvider: Send + Sync {
    /// Renders the page for `payment_required`.
    fn generate_html(
        &self,
        payment_required: &VersionedPaymentRequired,
        config: &PaywallConfig,
    ) -> String;
}

/// Ordered list of network handlers with a generic fallback.
#[derive(Default)]
pub struct PaywallRegistry {
    handlers: Vec<Box<dyn PaywallNetworkHandler>>,
}

impl std::fmt::Debug for PaywallRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaywallRegistry")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl PaywallRegistry {
    /// Creates a registry with no handlers; every page uses the fallback.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the EVM and Solana handlers, in that order.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with_handler(EvmPaywallHandler)
            .with_handler(SolanaPaywallHandler)
    }

    /// Appends a handler.
    pub fn register(&mut self, handler: Box<dyn PaywallNetworkHandler>) -> &mut Self {
        self.handlers.push(handler);
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with_handler(mut self, handler: impl PaywallNetworkHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Finds the first (requirement, handler) pair, scanning requirements
    /// outer and handlers inner.
    #[must_use]
    pub fn select<'a>(
        &'a self,
        accepts: &'a [VersionedRequirements],
    ) -> Option<(&'a dyn PaywallNetworkHandler, &'a VersionedRequirements)> {
        accepts.iter().find_map(|requirement| {
            self.handlers
                .iter()
                .find(|handler| handler.supports(requirement))
                .map(|handler| (handler.as_ref(), requirement))
        })
    }
}

impl PaywallProvider for PaywallRegistry {
    fn generate_html(
        &self,
        payment_required: &VersionedPaymentRequired,
        config: &PaywallConfig,
    ) -> String {
        let accepts = payment_required.accepts();
        match self.select(&accepts) {
            Some((handler, requirement)) => {
                handler.generate_html(requirement, payment_required, config)
            }
            None => render_fallback(payment_required, config),
        }
    }
}

fn is_known_network(
    network: &str,
    namespace: &str,
    known: &[r402::networks::NetworkInfo],
) -> bool {
    network
        .split_once(':')
        .map_or_else(
            || known.iter().any(|info| info.name == network),
            |(ns, _)| ns == namespace,
        )
}

/// Handler for EVM (`eip155`) networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmPaywallHandler;

impl PaywallNetworkHandler for EvmPaywallHandler {
    fn supports(&self, requirement: &VersionedRequirements) -> bool {
        is_known_network(requirement.network(), "eip155", EVM_NETWORKS)
    }

    fn generate_html(
        &self,
        requirement: &VersionedRequirements,
        payment_required: &VersionedPaymentRequired,
        config: &PaywallConfig,
    ) -> String {
        render_page("evm", "Connect an Ethereum wallet", requirement, payment_required, config)
    }
}

/// Handler for Solana networks.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolanaPaywallHandler;

impl PaywallNetworkHandler for SolanaPaywallHandler {
    fn supports(&self, requirement: &VersionedRequirements) -> bool {
        is_known_network(requirement.network(), "solana", SOLANA_NETWORKS)
    }

    fn generate_html(
        &self,
        requirement: &VersionedRequirements,
        payment_required: &VersionedPaymentRequired,
        config: &PaywallConfig,
    ) -> String {
        render_page("solana", "Connect a Solana wallet", requirement, payment_required, config)
    }
}

fn serialized(payment_required: &VersionedPaymentRequired) -> String {
    serde_json::to_string(payment_required).unwrap_or_else(|_| "{}".to_owned())
}

fn header_block(config: &PaywallConfig) -> String {
    let title = config.app_name.as_deref().unwrap_or("Payment Required");
    let mut html = String::new();
    if let Some(logo) = &config.app_logo {
        html.push_str(&format!(
            "<img class=\"logo\" src=\"{}\" alt=\"\">",
            escape_html(logo)
        ));
    }
    html.push_str(&format!("<h1>{}</h1>", escape_html(title)));
    if config.testnet {
        html.push_str("<p class=\"testnet\">Testnet</p>");
    }
    html
}

const PAGE_HEAD: &str =
    "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Payment Required</title></head>";

fn render_page(
    family: &str,
    prompt: &str,
    requirement: &VersionedRequirements,
    payment_required: &VersionedPaymentRequired,
    config: &PaywallConfig,
) -> String {
    let resource = payment_required.resource_url().unwrap_or_default();
    format!(
        "{head}\
         <body data-network-family=\"{family}\" data-payment-required=\"{data}\">\
         {header}<p>{prompt} to pay {amount} of <code>{asset}</code> on <code>{network}</code> to \
         <code>{pay_to}</code> for access to <a href=\"{resource}\">{resource}</a>.</p>\
         </body></html>",
        head = PAGE_HEAD,
        data = escape_html(&serialized(payment_required)),
        header = header_block(config),
        amount = escape_html(requirement.amount()),
        asset = escape_html(requirement.asset()),
        network = escape_html(requirement.network()),
        pay_to = escape_html(requirement.pay_to()),
        resource = escape_html(resource),
    )
}

/// Generic page with no wallet integration. The `PaymentRequired` is
/// embedded in the `data-payment-required` attribute for client scripts.
#[must_use]
pub fn render_fallback(
    payment_required: &VersionedPaymentRequired,
    config: &PaywallConfig,
) -> String {
    let items: String = payment_required
        .accepts()
        .iter()
        .map(|req| {
            format!(
                "<li><code>{}</code> on <code>{}</code>: {} of \
                 <code>{}</code> to <code>{}</code></li>",
                escape_html(req.scheme()),
                escape_html(req.network()),
                escape_html(req.amount()),
                escape_html(req.asset()),
                escape_html(req.pay_to()),
            )
        })
        .collect();
    format!(
        "{head}\
         <body data-payment-required=\"{data}\">{header}<ul>{items}</ul></body></html>",
        head = PAGE_HEAD,
        data = escape_html(&serialized(payment_required)),
        header = header_block(config),
    )
}

/// Escapes text for HTML element content and double-quoted attributes.
#[must_use]
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use r402::proto::{PaymentRequired, PaymentRequirements};
    use serde_json::json;

    fn requirement(network: &str) -> VersionedRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: network.into(),
            asset: "asset".into(),
            amount: "100".into(),
            pay_to: "payee".into(),
            max_timeout_seconds: 60,
            extra: json!({}),
        }
        .into()
    }

    fn payment_required(accepts: &[VersionedRequirements]) -> VersionedPaymentRequired {
        let accepts = accepts
            .iter()
            .filter_map(|req| match req {
                VersionedRequirements::V2(req) => Some((**req).clone()),
                VersionedRequirements::V1(_) => None,
            })
            .collect();
        VersionedPaymentRequired::V2(Box::new(PaymentRequired {
            x402_version: 2,
            error: None,
            resource: None,
            accepts,
            extensions: None,
        }))
    }

    #[test]
    fn test_requirement_order_beats_registration_order() {
        let registry = PaywallRegistry::new()
            .with_handler(EvmPaywallHandler)
            .with_handler(SolanaPaywallHandler);
        let accepts = [
            requirement("solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1"),
            requirement("eip155:8453"),
        ];

        let (handler, selected) = registry.select(&accepts).unwrap();
        assert_eq!(selected.network(), "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1");
        assert!(handler.supports(&accepts[0]));
        assert!(!handler.supports(&accepts[1]));
    }

    #[test]
    fn test_v1_names_are_recognized() {
        assert!(EvmPaywallHandler.supports(&requirement("base-sepolia")));
        assert!(SolanaPaywallHandler.supports(&requirement("solana-devnet")));
        assert!(!EvmPaywallHandler.supports(&requirement("solana")));
    }

    #[test]
    fn test_fallback_embeds_escaped_payment_required() {
        let registry = PaywallRegistry::new();
        let accepts = [requirement("cosmos:hub")];
        let html = registry.generate_html(&payment_required(&accepts), &PaywallConfig::default());

        assert!(html.contains("data-payment-required=\"{&quot;x402Version&quot;:2"));
        assert!(html.contains("cosmos:hub"));
        assert!(!html.contains("data-network-family"));
    }

    #[test]
    fn test_app_name_is_escaped() {
        let config = PaywallConfig {
            app_name: Some("<script>".into()),
            ..PaywallConfig::default()
        };
        let accepts = [requirement("eip155:8453")];
        let html =
            PaywallRegistry::with_defaults().generate_html(&payment_required(&accepts), &config);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("data-network-family=\"evm\""));
    }
}
