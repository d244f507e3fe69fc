//! The account coordinator: one logical wallet across several networks.

use crate::{ChainReader, KeySigner, LogQuery, NetworkWallet, Relayer, WalletError};
use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, B256, Bytes, Log},
    sol_types::SolEvent,
};
use futures::future::{try_join, try_join_all};
use quorum_contracts::{decode_members, registry::RequiredConfig};
use quorum_primitives::{
    FullConfig, NetworkConfig, RelayReceipt, SignedTransactions, Transaction, WalletConfig,
    WalletContext,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// A network the account lives on and the collaborators serving it.
#[derive(Debug, Clone)]
pub struct Network {
    pub config: NetworkConfig,
    pub chain: Arc<dyn ChainReader>,
    pub relayer: Option<Arc<dyn Relayer>>,
}

/// Everything needed to build an [`Account`].
#[derive(Debug, Clone)]
pub struct AccountOptions {
    pub context: WalletContext,
    /// Config the account address is derived from
    pub initial_config: WalletConfig,
    pub networks: Vec<Network>,
    pub signers: Vec<KeySigner>,
    /// Known account address, when `initial_config` does not derive it
    pub address: Option<Address>,
}

/// Snapshot of the wallet on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletState {
    pub context: WalletContext,
    pub config: WalletConfig,
    pub address: Address,
    pub chain_id: u64,
    pub deployed: bool,
    /// Fingerprint of the resolved config
    pub image_hash: B256,
    /// Fingerprint the wallet contract currently enforces
    pub current_image_hash: B256,
}

/// One account deployed, or deployable, on every configured network.
///
/// All per-network wallets start from the initial config and share the same
/// address. Configs are rotated on the auth chain only; the other networks
/// catch up the next time a transaction is sent on them.
#[derive(Debug)]
pub struct Account {
    address: Address,
    context: WalletContext,
    initial_config: WalletConfig,
    wallets: Vec<NetworkWallet>,
}

impl Account {
    pub fn new(options: AccountOptions) -> Result<Self, WalletError> {
        let AccountOptions {
            context,
            initial_config,
            networks,
            signers,
            address,
        } = options;

        if networks.is_empty() {
            return Err(WalletError::NoNetworks);
        }

        let address = address.unwrap_or_else(|| context.derive_address(&initial_config));
        let signers: Arc<[KeySigner]> = signers.into();
        let wallets = networks
            .into_iter()
            .map(|network| {
                NetworkWallet::new(
                    network.config,
                    initial_config.clone(),
                    context,
                    network.chain,
                    network.relayer,
                    signers.clone(),
                )
                .with_address(address)
            })
            .collect();

        Ok(Self {
            address,
            context,
            initial_config,
            wallets,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn context(&self) -> &WalletContext {
        &self.context
    }

    pub fn initial_config(&self) -> &WalletConfig {
        &self.initial_config
    }

    pub fn wallets(&self) -> &[NetworkWallet] {
        &self.wallets
    }

    pub fn networks(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.wallets.iter().map(NetworkWallet::network)
    }

    /// Addresses of the keys held locally.
    pub fn signers(&self) -> Vec<Address> {
        self.wallets
            .first()
            .map(NetworkWallet::signer_addresses)
            .unwrap_or_default()
    }

    pub fn network_wallet(&self, chain_id: u64) -> Result<&NetworkWallet, WalletError> {
        self.wallets
            .iter()
            .find(|wallet| wallet.chain_id() == chain_id)
            .ok_or(WalletError::NetworkNotConfigured(chain_id))
    }

    /// Wallet on the network flagged as default chain.
    pub fn main_wallet(&self) -> Result<&NetworkWallet, WalletError> {
        self.wallets
            .iter()
            .find(|wallet| wallet.network().is_default_chain)
            .ok_or(WalletError::MissingMainChain)
    }

    /// Wallet on the network flagged as auth chain.
    pub fn auth_wallet(&self) -> Result<&NetworkWallet, WalletError> {
        self.wallets
            .iter()
            .find(|wallet| wallet.network().is_auth_chain)
            .ok_or(WalletError::MissingAuthChain)
    }

    /// `chain_id` or the main chain.
    pub fn target_wallet(&self, chain_id: Option<u64>) -> Result<&NetworkWallet, WalletError> {
        match chain_id {
            Some(chain_id) => self.network_wallet(chain_id),
            None => self.main_wallet(),
        }
    }

    /// Config enforced on `chain_id`, the auth chain when `None`.
    pub async fn current_config(&self, chain_id: Option<u64>) -> Result<WalletConfig, WalletError> {
        let wallet = match chain_id {
            Some(chain_id) => self.network_wallet(chain_id)?,
            None => self.auth_wallet()?,
        };
        self.resolve_config(wallet).await
    }

    /// Reconstructs the config `wallet` enforces from chain state and the
    /// auth chain's registry history.
    async fn resolve_config(&self, wallet: &NetworkWallet) -> Result<WalletConfig, WalletError> {
        let stored = self.stored_image_hash(wallet).await?;
        self.config_for(wallet, stored).await
    }

    /// Image hash kept in storage, `None` while the wallet is not on the
    /// upgradable module.
    async fn stored_image_hash(&self, wallet: &NetworkWallet) -> Result<Option<B256>, WalletError> {
        if wallet.implementation().await? != self.context.main_module_upgradable {
            return Ok(None);
        }
        wallet.image_hash().await.map(Some)
    }

    /// Config behind `stored`, or behind the wallet address when the wallet
    /// still runs on the config it was derived from.
    async fn config_for(
        &self,
        wallet: &NetworkWallet,
        stored: Option<B256>,
    ) -> Result<WalletConfig, WalletError> {
        if let Some(image_hash) = stored {
            if image_hash == self.initial_config.fingerprint() {
                return Ok(self.initial_config.clone());
            }

            debug!(
                chain_id = wallet.chain_id(),
                %image_hash,
                "Wallet config rotated, scanning registry"
            );
            let query = LogQuery::new(self.context.require_utils, RequiredConfig::SIGNATURE_HASH)
                .topic2(image_hash);
            let logs = self.auth_wallet()?.chain().get_logs(&query).await?;
            let log = logs.last().ok_or(WalletError::ConfigNotFound {
                address: self.address,
                image_hash: Some(image_hash),
            })?;

            let (config, published) = decode_required_config(log)?;
            if published != image_hash {
                return Err(WalletError::ConfigMismatch {
                    expected: image_hash,
                    actual: published,
                });
            }
            return Ok(config);
        }

        if self.context.derive_address(&self.initial_config) == self.address {
            return Ok(self.initial_config.clone());
        }

        debug!(
            chain_id = wallet.chain_id(),
            address = %self.address,
            "Initial config unknown, scanning registry for counterfactual config"
        );
        let query = LogQuery::new(self.context.require_utils, RequiredConfig::SIGNATURE_HASH)
            .topic1(self.address.into_word());
        let logs = self.auth_wallet()?.chain().get_logs(&query).await?;
        let log = logs.first().ok_or(WalletError::ConfigNotFound {
            address: self.address,
            image_hash: None,
        })?;

        let (config, _) = decode_required_config(log)?;
        let derived = self.context.derive_address(&config);
        if derived != self.address {
            return Err(WalletError::AddressMismatch {
                expected: self.address,
                actual: derived,
            });
        }
        Ok(config)
    }

    /// Resolved configs of every network.
    pub async fn full_config(&self) -> Result<FullConfig, WalletError> {
        let configs =
            try_join_all(self.wallets.iter().map(|wallet| self.resolve_config(wallet))).await?;
        Ok(FullConfig::from_configs(
            self.wallets
                .iter()
                .map(NetworkWallet::chain_id)
                .zip(configs.iter()),
        ))
    }

    /// Per-network deployment and config state.
    pub async fn wallet_state(&self) -> Result<Vec<WalletState>, WalletError> {
        try_join_all(self.wallets.iter().map(|wallet| self.network_state(wallet))).await
    }

    /// Deployment and config state on `chain_id`.
    pub async fn state(&self, chain_id: u64) -> Result<WalletState, WalletError> {
        self.network_state(self.network_wallet(chain_id)?).await
    }

    async fn network_state(&self, wallet: &NetworkWallet) -> Result<WalletState, WalletError> {
        let (stored, deployed) =
            try_join(self.stored_image_hash(wallet), wallet.is_deployed()).await?;
        let config = self.config_for(wallet, stored).await?;
        let current_image_hash = stored.unwrap_or_else(|| config.fingerprint());

        Ok(WalletState {
            context: self.context,
            address: self.address,
            chain_id: wallet.chain_id(),
            deployed,
            image_hash: config.fingerprint(),
            current_image_hash,
            config,
        })
    }

    /// Whether the wallet has code on `chain_id`, the auth chain when `None`.
    pub async fn is_deployed(&self, chain_id: Option<u64>) -> Result<bool, WalletError> {
        let wallet = match chain_id {
            Some(chain_id) => self.network_wallet(chain_id)?,
            None => self.auth_wallet()?,
        };
        wallet.is_deployed().await
    }

    /// `wallet` switched to the config it currently enforces.
    async fn synced(&self, wallet: &NetworkWallet) -> Result<NetworkWallet, WalletError> {
        Ok(wallet.use_config(self.resolve_config(wallet).await?))
    }

    pub async fn sign_digest(
        &self,
        digest: B256,
        chain_id: Option<u64>,
        only_full_sign: bool,
    ) -> Result<Bytes, WalletError> {
        let wallet = self.synced(self.target_wallet(chain_id)?).await?;
        wallet.sign_digest(digest, only_full_sign).await
    }

    /// Signs `message` on `chain_id`, the main chain when `None`.
    pub async fn sign_message(
        &self,
        message: &[u8],
        chain_id: Option<u64>,
        only_full_sign: bool,
    ) -> Result<Bytes, WalletError> {
        let wallet = self.synced(self.target_wallet(chain_id)?).await?;
        wallet.sign_message(message, only_full_sign).await
    }

    /// Signs `message` on the auth chain.
    pub async fn sign_auth_message(
        &self,
        message: &[u8],
        only_full_sign: bool,
    ) -> Result<Bytes, WalletError> {
        let wallet = self.synced(self.auth_wallet()?).await?;
        wallet.sign_message(message, only_full_sign).await
    }

    /// Signs the EIP-712 hash of `typed_data`. Without an explicit chain the
    /// domain's chain id is used, then the main chain.
    pub async fn sign_typed_data(
        &self,
        typed_data: &TypedData,
        chain_id: Option<u64>,
        only_full_sign: bool,
    ) -> Result<Bytes, WalletError> {
        let digest = typed_data.eip712_signing_hash()?;
        let chain_id = chain_id.or_else(|| {
            typed_data
                .domain
                .chain_id
                .and_then(|chain_id| u64::try_from(chain_id).ok())
        });
        self.sign_digest(digest, chain_id, only_full_sign).await
    }

    /// Builds the batch to submit on `chain_id`: the wallet signing under the
    /// config it enforces, and `txs` preceded by a config update when that
    /// config lags behind the auth chain.
    async fn prepare_batch(
        &self,
        txs: Vec<Transaction>,
        chain_id: Option<u64>,
        only_full_sign: bool,
    ) -> Result<(NetworkWallet, Vec<Transaction>), WalletError> {
        let wallet = self.target_wallet(chain_id)?;
        let (this_config, last_config) =
            try_join(self.resolve_config(wallet), self.current_config(None)).await?;

        let wallet = wallet.use_config(this_config);
        let weight = wallet.sign_weight();
        let threshold = wallet.config().threshold();
        if only_full_sign && weight < u32::from(threshold) {
            return Err(WalletError::InsufficientSigners { weight, threshold });
        }

        if wallet.config().is_same(&last_config) {
            return Ok((wallet, txs));
        }

        info!(
            chain_id = wallet.chain_id(),
            from = %wallet.config().fingerprint(),
            to = %last_config.fingerprint(),
            "Bundling config update with transactions"
        );
        let mut batch = wallet.build_update_config(&last_config, false).await?;
        batch.extend(txs);
        Ok((wallet, batch))
    }

    /// Signs a batch for `chain_id` without relaying it.
    pub async fn sign_transactions(
        &self,
        txs: Vec<Transaction>,
        chain_id: Option<u64>,
        only_full_sign: bool,
    ) -> Result<SignedTransactions, WalletError> {
        let (wallet, batch) = self.prepare_batch(txs, chain_id, only_full_sign).await?;
        wallet.sign_transactions(batch, only_full_sign).await
    }

    /// Sends `txs` on `chain_id`, the main chain when `None`.
    pub async fn send_transaction(
        &self,
        txs: Vec<Transaction>,
        chain_id: Option<u64>,
        only_full_sign: bool,
    ) -> Result<RelayReceipt, WalletError> {
        let (wallet, batch) = self.prepare_batch(txs, chain_id, only_full_sign).await?;
        wallet.send_transactions(batch, only_full_sign).await
    }

    /// Rotates the account to `new_config` on the auth chain.
    ///
    /// Returns `None` when the account already uses `new_config`. For an
    /// undeployed account asked to keep its initial config this only deploys
    /// the wallet and publishes that config.
    pub async fn update_config(
        &self,
        new_config: &WalletConfig,
    ) -> Result<Option<RelayReceipt>, WalletError> {
        let auth_wallet = self.auth_wallet()?;

        if new_config.is_same(&self.initial_config) && !auth_wallet.is_deployed().await? {
            return auth_wallet.publish_config().await.map(Some);
        }

        let last_config = self.resolve_config(auth_wallet).await?;
        if last_config.is_same(new_config) {
            debug!(image_hash = %new_config.fingerprint(), "Config unchanged");
            return Ok(None);
        }

        auth_wallet
            .use_config(last_config)
            .update_config(new_config, true)
            .await
            .map(Some)
    }

    /// Publishes the config currently enforced on the auth chain.
    pub async fn publish_config(&self) -> Result<RelayReceipt, WalletError> {
        let wallet = self.synced(self.auth_wallet()?).await?;
        wallet.publish_config().await
    }
}

/// Decodes a `RequiredConfig` log into the published config and the image
/// hash it was indexed under.
fn decode_required_config(log: &Log) -> Result<(WalletConfig, B256), WalletError> {
    let event = RequiredConfig::decode_log_data(&log.data)?;
    let members = decode_members(&event._signers)?;
    let config = WalletConfig::from_members(event._threshold, &members)?;

    let actual = config.fingerprint();
    if actual != event._imageHash {
        return Err(WalletError::ConfigMismatch {
            expected: event._imageHash,
            actual,
        });
    }
    Ok((config, event._imageHash))
}
