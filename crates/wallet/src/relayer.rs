//! Relayers submit signed wallet batches on behalf of the wallet.

use crate::WalletError;
use alloy::{
    primitives::{Address, U256},
    providers::Provider,
    rpc::types::{TransactionReceipt, TransactionRequest},
    sol_types::{SolCall, SolType, sol_data},
};
use async_trait::async_trait;
use quorum_contracts::{IWalletFactory, IWalletModule};
use quorum_primitives::{
    FeeOption, RelayReceipt, SignedTransactions, Transaction, encode_transactions,
};
use std::fmt;
use tracing::{debug, info};

/// Submission service for one network.
#[async_trait]
pub trait Relayer: Send + Sync + fmt::Debug {
    /// Fills in the gas limit of every transaction that leaves it at zero.
    async fn estimate_gas_limits(
        &self,
        wallet: Address,
        txs: &[Transaction],
    ) -> Result<Vec<Transaction>, WalletError>;

    /// Ways the relayer accepts to be refunded for relaying `txs`.
    async fn gas_refund_options(
        &self,
        wallet: Address,
        txs: &[Transaction],
    ) -> Result<Vec<FeeOption>, WalletError>;

    /// Nonce the next batch of `wallet` must be signed with.
    async fn get_nonce(&self, wallet: Address) -> Result<U256, WalletError>;

    /// Submits a signed batch, deploying the wallet first if it has no code.
    async fn relay(&self, signed: SignedTransactions) -> Result<RelayReceipt, WalletError>;
}

/// Relayer that pays for submissions from a locally funded account.
pub struct LocalRelayer<P> {
    provider: P,
}

impl<P> LocalRelayer<P> {
    /// `provider` must be able to sign and send transactions.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P> fmt::Debug for LocalRelayer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalRelayer").finish_non_exhaustive()
    }
}

impl<P: Provider> LocalRelayer<P> {
    async fn submit(&self, to: Address, input: Vec<u8>) -> Result<TransactionReceipt, WalletError> {
        let tx = TransactionRequest::default().to(to).input(input.into());
        let pending = self.provider.send_transaction(tx).await?;
        let receipt = pending.get_receipt().await?;
        if !receipt.status() {
            return Err(WalletError::Relayer(format!(
                "transaction {} reverted",
                receipt.transaction_hash
            )));
        }
        Ok(receipt)
    }
}

#[async_trait]
impl<P: Provider + 'static> Relayer for LocalRelayer<P> {
    async fn estimate_gas_limits(
        &self,
        wallet: Address,
        txs: &[Transaction],
    ) -> Result<Vec<Transaction>, WalletError> {
        let mut estimated = Vec::with_capacity(txs.len());
        for tx in txs {
            let mut tx = tx.clone();
            if tx.gas_limit.is_zero() {
                let request = TransactionRequest::default()
                    .from(wallet)
                    .to(tx.to)
                    .value(tx.value)
                    .input(tx.data.clone().into());
                tx.gas_limit = U256::from(self.provider.estimate_gas(request).await?);
            }
            estimated.push(tx);
        }
        Ok(estimated)
    }

    async fn gas_refund_options(
        &self,
        _wallet: Address,
        _txs: &[Transaction],
    ) -> Result<Vec<FeeOption>, WalletError> {
        Ok(Vec::new())
    }

    async fn get_nonce(&self, wallet: Address) -> Result<U256, WalletError> {
        let code = self.provider.get_code_at(wallet).await?;
        if code.is_empty() {
            return Ok(U256::ZERO);
        }

        let tx = TransactionRequest::default()
            .to(wallet)
            .input(IWalletModule::nonceCall {}.abi_encode().into());
        let result = self.provider.call(tx).await?;
        Ok(<sol_data::Uint<256> as SolType>::abi_decode(&result)?)
    }

    async fn relay(&self, signed: SignedTransactions) -> Result<RelayReceipt, WalletError> {
        let code = self.provider.get_code_at(signed.address).await?;
        if code.is_empty() {
            let derived = signed.context.derive_address(&signed.config);
            if derived != signed.address {
                return Err(WalletError::AddressMismatch {
                    expected: signed.address,
                    actual: derived,
                });
            }

            let deploy = IWalletFactory::deployCall {
                _mainModule: signed.context.main_module,
                _salt: signed.config.fingerprint(),
            };
            let receipt = self.submit(signed.context.factory, deploy.abi_encode()).await?;
            info!(
                chain_id = signed.chain_id,
                wallet = %signed.address,
                tx_hash = %receipt.transaction_hash,
                "Deployed wallet"
            );
        } else {
            debug!(chain_id = signed.chain_id, wallet = %signed.address, "Wallet already deployed");
        }

        let execute = IWalletModule::executeCall {
            _txs: encode_transactions(&signed.transactions),
            _nonce: signed.nonce,
            _signature: signed.signature.clone(),
        };
        let receipt = self.submit(signed.address, execute.abi_encode()).await?;

        info!(
            chain_id = signed.chain_id,
            wallet = %signed.address,
            tx_hash = %receipt.transaction_hash,
            transactions = signed.transactions.len(),
            "Relayed wallet batch"
        );

        Ok(RelayReceipt {
            chain_id: signed.chain_id,
            hash: receipt.transaction_hash,
        })
    }
}
