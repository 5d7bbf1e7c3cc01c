//! Blockchain network identification and registry.
//!
//! V1 messages name networks with flat strings (`"base-sepolia"`), V2 uses
//! CAIP-2 chain identifiers (`"eip155:84532"`). [`NetworkRegistry`] is the
//! single place where the two forms are translated, and also knows the
//! USDC deployments used to resolve dollar prices.

use std::collections::HashMap;

use r402_proto::versioned::is_caip2;

/// A known network with its V1 name and CAIP-2 parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// Human-readable network name (e.g., "base-sepolia", "solana").
    pub name: &'static str,
    /// CAIP-2 namespace (e.g., "eip155", "solana").
    pub namespace: &'static str,
    /// Chain reference (e.g., "84532" for Base Sepolia).
    pub reference: &'static str,
}

impl NetworkInfo {
    /// Returns the CAIP-2 identifier.
    #[must_use]
    pub fn caip2(&self) -> String {
        format!("{}:{}", self.namespace, self.reference)
    }
}

/// A token deployed on a specific network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDeployment {
    /// CAIP-2 identifier of the hosting network.
    pub network: &'static str,
    /// Token contract address or mint.
    pub address: &'static str,
    /// Number of decimal places of the token.
    pub decimals: u32,
    /// EIP-712 domain name and version, for EVM tokens.
    pub eip712: Option<(&'static str, &'static str)>,
}

const fn evm(name: &'static str, reference: &'static str) -> NetworkInfo {
    NetworkInfo {
        name,
        namespace: "eip155",
        reference,
    }
}

/// Well-known EVM networks.
pub static EVM_NETWORKS: &[NetworkInfo] = &[
    evm("base", "8453"),
    evm("base-sepolia", "84532"),
    evm("ethereum", "1"),
    evm("polygon", "137"),
    evm("polygon-amoy", "80002"),
    evm("avalanche", "43114"),
    evm("avalanche-fuji", "43113"),
    evm("celo", "42220"),
];

/// Well-known Solana networks.
pub static SOLANA_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo {
        name: "solana",
        namespace: "solana",
        reference: "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
    },
    NetworkInfo {
        name: "solana-devnet",
        namespace: "solana",
        reference: "EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
    },
];

const USDC_EIP712: Option<(&str, &str)> = Some(("USD Coin", "2"));

/// Known USDC deployments (6 decimals everywhere).
pub static USDC_DEPLOYMENTS: &[TokenDeployment] = &[
    TokenDeployment {
        network: "eip155:8453",
        address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "eip155:84532",
        address: "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "eip155:1",
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "eip155:137",
        address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "eip155:80002",
        address: "0x41E94Eb71Ef8C9fAE0235d1e472b21E21B5a4dbF",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "eip155:43114",
        address: "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "eip155:43113",
        address: "0x5425890298aed601595a70AB815c96711a31Bc65",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "eip155:42220",
        address: "0xcebA9300f2b948710d2653dD7B07f33A8B32118C",
        decimals: 6,
        eip712: USDC_EIP712,
    },
    TokenDeployment {
        network: "solana:5eykt4UsFv8P8NJdTREpY1vzqKqZKvdp",
        address: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
        decimals: 6,
        eip712: None,
    },
    TokenDeployment {
        network: "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1",
        address: "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU",
        decimals: 6,
        eip712: None,
    },
];

/// Returns the USDC deployment on a CAIP-2 network, if known.
#[must_use]
pub fn usdc_deployment(caip2: &str) -> Option<&'static TokenDeployment> {
    USDC_DEPLOYMENTS.iter().find(|d| d.network == caip2)
}

/// Registry that maps V1 network names to CAIP-2 identifiers and back.
///
/// # Example
///
/// ```rust
/// use r402::networks::NetworkRegistry;
///
/// let registry = NetworkRegistry::known();
/// assert_eq!(registry.to_caip2("base-sepolia").as_deref(), Some("eip155:84532"));
/// assert_eq!(registry.to_v1_name("eip155:84532").as_deref(), Some("base-sepolia"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    name_to_caip2: HashMap<&'static str, String>,
    caip2_to_name: HashMap<String, &'static str>,
}

impl NetworkRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in EVM and Solana networks.
    #[must_use]
    pub fn known() -> Self {
        Self::from_networks(EVM_NETWORKS).with_networks(SOLANA_NETWORKS)
    }

    /// Creates a registry pre-populated from a network info slice.
    #[must_use]
    pub fn from_networks(networks: &[NetworkInfo]) -> Self {
        let mut registry = Self::new();
        registry.register(networks);
        registry
    }

    /// Registers additional networks into this registry.
    pub fn register(&mut self, networks: &[NetworkInfo]) {
        for info in networks {
            self.name_to_caip2.insert(info.name, info.caip2());
            self.caip2_to_name.insert(info.caip2(), info.name);
        }
    }

    /// Builder-style variant of [`register`](Self::register).
    #[must_use]
    pub fn with_networks(mut self, networks: &[NetworkInfo]) -> Self {
        self.register(networks);
        self
    }

    /// Returns the CAIP-2 form of `network`. CAIP-2 input is returned as is.
    #[must_use]
    pub fn to_caip2(&self, network: &str) -> Option<String> {
        if is_caip2(network) {
            return Some(network.to_owned());
        }
        self.name_to_caip2.get(network).cloned()
    }

    /// Returns the V1 name of `network`. Flat names are returned as is.
    #[must_use]
    pub fn to_v1_name(&self, network: &str) -> Option<String> {
        if !is_caip2(network) {
            return Some(network.to_owned());
        }
        self.caip2_to_name.get(network).map(|name| (*name).to_owned())
    }

    /// Returns the CAIP-2 namespace of `network` (`"eip155"`, `"solana"`).
    #[must_use]
    pub fn namespace(&self, network: &str) -> Option<String> {
        let caip2 = self.to_caip2(network)?;
        caip2.split_once(':').map(|(namespace, _)| namespace.to_owned())
    }

    /// Returns the number of registered networks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.name_to_caip2.len()
    }

    /// Returns `true` if no networks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name_to_caip2.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translates_both_ways() {
        let registry = NetworkRegistry::known();
        assert_eq!(registry.to_caip2("base").as_deref(), Some("eip155:8453"));
        assert_eq!(
            registry.to_v1_name("solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1").as_deref(),
            Some("solana-devnet")
        );
        assert_eq!(registry.to_caip2("unknown-net"), None);
        assert_eq!(registry.to_v1_name("eip155:999999"), None);
    }

    #[test]
    fn test_namespace_resolves_through_names() {
        let registry = NetworkRegistry::known();
        assert_eq!(registry.namespace("solana").as_deref(), Some("solana"));
        assert_eq!(registry.namespace("eip155:8453").as_deref(), Some("eip155"));
    }

    #[test]
    fn test_usdc_is_known_on_base_sepolia() {
        let usdc = usdc_deployment("eip155:84532").unwrap();
        assert_eq!(usdc.decimals, 6);
        assert_eq!(usdc.address, "0x036CbD53842c5426634e7929541eC2318f3dCF7e");
    }
}
