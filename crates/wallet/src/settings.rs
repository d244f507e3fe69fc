//! Account settings loaded from TOML.

use crate::{Account, AccountOptions, KeySigner, LocalRelayer, Network, Relayer, RpcChainReader};
use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use eyre::{WrapErr, bail, eyre};
use quorum_primitives::{NetworkConfig, WalletConfig, WalletContext};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tracing::info;

/// What an [`Account`] is built from.
///
/// ```toml
/// [context]
/// factory = "0x..."
/// mainModule = "0x..."
/// mainModuleUpgradable = "0x..."
/// guestModule = "0x..."
/// requireUtils = "0x..."
///
/// [initialConfig]
/// threshold = 1
/// signers = [{ address = "0x...", weight = 1 }]
///
/// [[networks]]
/// chainId = 1
/// name = "mainnet"
/// rpcUrl = "http://localhost:8545"
/// isDefaultChain = true
/// isAuthChain = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSettings {
    pub context: WalletContext,
    pub initial_config: WalletConfig,
    /// Known account address, when the initial config does not derive it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub networks: Vec<NetworkConfig>,
}

impl AccountSettings {
    pub fn load(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed reading account settings from `{}`", path.display()))?;
        Self::from_toml(&content)
            .wrap_err_with(|| format!("invalid account settings in `{}`", path.display()))
    }

    pub fn from_toml(content: &str) -> eyre::Result<Self> {
        let settings: Self = toml::from_str(content).wrap_err("failed parsing account settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks the network list: at least one network, unique chain ids, at most
    /// one network per role and a parsable URL for every network.
    pub fn validate(&self) -> eyre::Result<()> {
        if self.networks.is_empty() {
            bail!("at least one network must be configured");
        }

        for (i, network) in self.networks.iter().enumerate() {
            if self.networks[..i]
                .iter()
                .any(|other| other.chain_id == network.chain_id)
            {
                bail!("network {} is configured twice", network.chain_id);
            }
            if let Some(rpc_url) = &network.rpc_url {
                url::Url::parse(rpc_url)
                    .wrap_err_with(|| format!("invalid rpc url for network {}", network.chain_id))?;
            }
        }

        if self.networks.iter().filter(|n| n.is_auth_chain).count() > 1 {
            bail!("more than one network is flagged as auth chain");
        }
        if self.networks.iter().filter(|n| n.is_default_chain).count() > 1 {
            bail!("more than one network is flagged as default chain");
        }
        Ok(())
    }

    /// Connects every network over HTTP and builds the account.
    ///
    /// With a `relayer_key` each network gets a [`LocalRelayer`] paying from
    /// that key.
    pub async fn connect(
        &self,
        signers: Vec<KeySigner>,
        relayer_key: Option<PrivateKeySigner>,
    ) -> eyre::Result<Account> {
        let mut networks = Vec::with_capacity(self.networks.len());
        for network in &self.networks {
            let rpc_url = network
                .rpc_url
                .as_deref()
                .ok_or_else(|| eyre!("network {} has no rpc url", network.chain_id))?;

            let provider = ProviderBuilder::new()
                .connect(rpc_url)
                .await
                .wrap_err_with(|| format!("failed connecting to network {}", network.chain_id))?;
            let reported = provider.get_chain_id().await?;
            if reported != network.chain_id {
                bail!(
                    "rpc for network {} reports chain id {reported}",
                    network.chain_id
                );
            }

            let relayer: Option<Arc<dyn Relayer>> = match &relayer_key {
                Some(key) => {
                    let provider = ProviderBuilder::new()
                        .wallet(EthereumWallet::from(key.clone()))
                        .connect(rpc_url)
                        .await?;
                    Some(Arc::new(LocalRelayer::new(provider)))
                }
                None => None,
            };

            info!(
                chain_id = network.chain_id,
                name = %network.name,
                relayer = relayer.is_some(),
                "Connected network"
            );

            networks.push(Network {
                config: network.clone(),
                chain: Arc::new(RpcChainReader::new(provider)),
                relayer,
            });
        }

        Ok(Account::new(AccountOptions {
            context: self.context,
            initial_config: self.initial_config.clone(),
            networks,
            signers,
            address: self.address,
        })?)
    }
}
