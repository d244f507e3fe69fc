//! A wallet bound to a single network.

use crate::{ChainReader, KeySigner, Relayer, WalletError, signature::WalletSignature};
use alloy::{
    primitives::{Address, B256, Bytes, U256, keccak256},
    sol_types::{SolCall, SolType, SolValue, sol_data},
};
use futures::future::try_join_all;
use quorum_contracts::{IRequireUtils, IWalletModule};
use quorum_primitives::{
    NetworkConfig, RelayReceipt, SignedTransactions, Transaction, WalletConfig, WalletContext,
    encode_transactions, execute_digest, implementation_slot, sub_digest,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, info};

/// Signing and submission for one wallet on one network.
///
/// The wallet signs under the config it holds, which is not necessarily the
/// config active on chain. Callers resolve the active config and switch to it
/// with [`NetworkWallet::use_config`].
#[derive(Debug, Clone)]
pub struct NetworkWallet {
    network: NetworkConfig,
    address: Address,
    config: WalletConfig,
    context: WalletContext,
    chain: Arc<dyn ChainReader>,
    relayer: Option<Arc<dyn Relayer>>,
    signers: Arc<[KeySigner]>,
}

impl NetworkWallet {
    /// Wallet at the address derived from `config`.
    pub fn new(
        network: NetworkConfig,
        config: WalletConfig,
        context: WalletContext,
        chain: Arc<dyn ChainReader>,
        relayer: Option<Arc<dyn Relayer>>,
        signers: Arc<[KeySigner]>,
    ) -> Self {
        Self {
            network,
            address: context.derive_address(&config),
            config,
            context,
            chain,
            relayer,
            signers,
        }
    }

    /// Overrides the derived address, for wallets whose initial config is not
    /// known locally.
    pub fn with_address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    /// The same wallet signing under `config`.
    pub fn use_config(&self, config: WalletConfig) -> Self {
        Self {
            config,
            ..self.clone()
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.network.chain_id
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn context(&self) -> &WalletContext {
        &self.context
    }

    pub fn chain(&self) -> &Arc<dyn ChainReader> {
        &self.chain
    }

    pub fn relayer(&self) -> Result<&Arc<dyn Relayer>, WalletError> {
        self.relayer
            .as_ref()
            .ok_or(WalletError::MissingRelayer(self.network.chain_id))
    }

    /// Addresses of the keys held locally.
    pub fn signer_addresses(&self) -> Vec<Address> {
        self.signers.iter().map(KeySigner::address).collect()
    }

    /// Combined weight of the local keys under the current config.
    pub fn sign_weight(&self) -> u32 {
        self.config.aggregate_weight(&self.signer_addresses())
    }

    fn ensure_weight(&self) -> Result<(), WalletError> {
        let weight = self.sign_weight();
        let threshold = self.config.threshold();
        if weight < u32::from(threshold) {
            return Err(WalletError::InsufficientSigners { weight, threshold });
        }
        Ok(())
    }

    /// Signs `digest` with every local key that is a signer of the config.
    ///
    /// Fails with [`WalletError::InsufficientSigners`] when the keys do not
    /// reach the threshold, unless `only_full_sign` is unset in which case a
    /// partial signature is produced.
    pub async fn sign_digest(&self, digest: B256, only_full_sign: bool) -> Result<Bytes, WalletError> {
        self.sign_digest_with_data(digest, None, only_full_sign).await
    }

    async fn sign_digest_with_data(
        &self,
        digest: B256,
        data: Option<&[u8]>,
        only_full_sign: bool,
    ) -> Result<Bytes, WalletError> {
        if only_full_sign {
            self.ensure_weight()?;
        }

        let sub_digest = sub_digest(self.chain_id(), self.address, digest);
        let signatures = try_join_all(
            self.signers
                .iter()
                .filter(|signer| self.config.weight_of(&signer.address()) > 0)
                .map(|signer| async move {
                    let signature = signer.sign_message(sub_digest.as_slice(), data).await?;
                    Ok::<_, WalletError>((signer.address(), signature))
                }),
        )
        .await?;

        let signatures: HashMap<_, _> = signatures.into_iter().collect();
        Ok(WalletSignature::build(&self.config, &signatures).encode())
    }

    /// Signs `keccak256(message)`.
    pub async fn sign_message(&self, message: &[u8], only_full_sign: bool) -> Result<Bytes, WalletError> {
        self.sign_digest(keccak256(message), only_full_sign).await
    }

    /// Whether the wallet has code on this network.
    pub async fn is_deployed(&self) -> Result<bool, WalletError> {
        Ok(!self.chain.get_code(self.address).await?.is_empty())
    }

    /// Module the wallet proxy delegates to, zero when not deployed.
    pub async fn implementation(&self) -> Result<Address, WalletError> {
        let word = self
            .chain
            .get_storage_at(self.address, implementation_slot(self.address))
            .await?;
        Ok(Address::from_word(word))
    }

    /// Image hash stored by the upgradable module.
    pub async fn image_hash(&self) -> Result<B256, WalletError> {
        let result = self
            .chain
            .call(self.address, IWalletModule::imageHashCall {}.abi_encode().into())
            .await?;
        Ok(<sol_data::FixedBytes<32> as SolType>::abi_decode(&result)?)
    }

    pub async fn get_nonce(&self) -> Result<U256, WalletError> {
        self.relayer()?.get_nonce(self.address).await
    }

    /// Signs `txs` at the wallet's next nonce without relaying them.
    pub async fn sign_transactions(
        &self,
        txs: Vec<Transaction>,
        only_full_sign: bool,
    ) -> Result<SignedTransactions, WalletError> {
        let nonce = self.get_nonce().await?;
        let digest = execute_digest(nonce, &txs);
        let payload = (nonce, encode_transactions(&txs)).abi_encode_params();
        let signature = self
            .sign_digest_with_data(digest, Some(&payload), only_full_sign)
            .await?;

        Ok(SignedTransactions {
            chain_id: self.chain_id(),
            address: self.address,
            config: self.config.clone(),
            context: self.context,
            transactions: txs,
            nonce,
            signature,
        })
    }

    /// Signs `txs` and hands them to the relayer. The relayer deploys the
    /// wallet first if needed.
    pub async fn send_transactions(
        &self,
        txs: Vec<Transaction>,
        only_full_sign: bool,
    ) -> Result<RelayReceipt, WalletError> {
        let relayer = self.relayer()?;
        let signed = self.sign_transactions(txs, only_full_sign).await?;
        debug!(
            chain_id = self.chain_id(),
            wallet = %self.address,
            nonce = %signed.nonce,
            transactions = signed.transactions.len(),
            "Relaying signed batch"
        );
        relayer.relay(signed).await
    }

    /// Registry call recording `config` for this wallet.
    pub fn publish_transaction(&self, config: &WalletConfig) -> Transaction {
        let call = IRequireUtils::publishConfigCall {
            _wallet: self.address,
            _threshold: U256::from(config.threshold()),
            _members: config.members(),
        };
        Transaction::call(self.context.require_utils, call.abi_encode())
    }

    /// Transactions moving the wallet to `new_config`.
    ///
    /// A single self call switching to the upgradable module (unless the wallet
    /// already uses it) and storing the new image hash, followed by a registry
    /// call when `publish` is set.
    pub async fn build_update_config(
        &self,
        new_config: &WalletConfig,
        publish: bool,
    ) -> Result<Vec<Transaction>, WalletError> {
        let mut steps = Vec::with_capacity(2);
        if self.implementation().await? != self.context.main_module_upgradable {
            steps.push(Transaction::call(
                self.address,
                IWalletModule::updateImplementationCall {
                    _implementation: self.context.main_module_upgradable,
                }
                .abi_encode(),
            ));
        }
        steps.push(Transaction::call(
            self.address,
            IWalletModule::updateImageHashCall {
                _imageHash: new_config.fingerprint(),
            }
            .abi_encode(),
        ));

        let mut txs = vec![Transaction::call(
            self.address,
            IWalletModule::selfExecuteCall {
                _txs: encode_transactions(&steps),
            }
            .abi_encode(),
        )];
        if publish {
            txs.push(self.publish_transaction(new_config));
        }
        Ok(txs)
    }

    /// Rotates the wallet on this network to `new_config`, signing under the
    /// config currently held.
    pub async fn update_config(
        &self,
        new_config: &WalletConfig,
        publish: bool,
    ) -> Result<RelayReceipt, WalletError> {
        let txs = self.build_update_config(new_config, publish).await?;
        let receipt = self.send_transactions(txs, true).await?;
        info!(
            chain_id = self.chain_id(),
            wallet = %self.address,
            image_hash = %new_config.fingerprint(),
            tx_hash = %receipt.hash,
            "Updated wallet config"
        );
        Ok(receipt)
    }

    /// Records the held config in the registry, deploying the wallet if needed.
    pub async fn publish_config(&self) -> Result<RelayReceipt, WalletError> {
        let tx = self.publish_transaction(&self.config);
        let receipt = self.send_transactions(vec![tx], true).await?;
        info!(
            chain_id = self.chain_id(),
            wallet = %self.address,
            image_hash = %self.config.fingerprint(),
            tx_hash = %receipt.hash,
            "Published wallet config"
        );
        Ok(receipt)
    }
}
