//! Network descriptors and the cross-network view of a wallet's configuration.

use crate::WalletConfig;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// A chain the wallet lives on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub chain_id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    /// Network used for requests that do not name a chain
    #[serde(default)]
    pub is_default_chain: bool,
    /// Network whose config registry is the source of truth for config history
    #[serde(default)]
    pub is_auth_chain: bool,
}

impl NetworkConfig {
    pub fn new(chain_id: u64, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
            rpc_url: None,
            is_default_chain: false,
            is_auth_chain: false,
        }
    }

    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    pub fn default_chain(mut self) -> Self {
        self.is_default_chain = true;
        self
    }

    pub fn auth_chain(mut self) -> Self {
        self.is_auth_chain = true;
        self
    }
}

/// Threshold of the config active on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainThreshold {
    pub chain_id: u64,
    pub weight: u16,
}

/// Weight a signer holds on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainWeight {
    pub chain_id: u64,
    pub weight: u8,
}

/// A signer and the weight it holds on every chain where it is a signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullConfigSigner {
    pub address: Address,
    pub networks: Vec<ChainWeight>,
}

/// Configuration of a wallet across all of its networks.
///
/// Built from freshly resolved configs every time, any network may have moved
/// on independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullConfig {
    pub threshold: Vec<ChainThreshold>,
    pub signers: Vec<FullConfigSigner>,
}

impl FullConfig {
    /// Aggregates per-chain configs, signers listed in order of first appearance.
    pub fn from_configs<'a>(configs: impl IntoIterator<Item = (u64, &'a WalletConfig)>) -> Self {
        let mut full = Self::default();
        for (chain_id, config) in configs {
            full.threshold.push(ChainThreshold {
                chain_id,
                weight: config.threshold(),
            });

            for signer in config.signers() {
                let entry = ChainWeight {
                    chain_id,
                    weight: signer.weight,
                };
                match full
                    .signers
                    .iter_mut()
                    .find(|known| known.address == signer.address)
                {
                    Some(known) => known.networks.push(entry),
                    None => full.signers.push(FullConfigSigner {
                        address: signer.address,
                        networks: vec![entry],
                    }),
                }
            }
        }
        full
    }
}
