//! Wallet meta-transactions and the digests signers commit to.

use crate::{WalletConfig, WalletContext};
use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;
use quorum_contracts::IWalletModule;
use serde::{Deserialize, Serialize};

/// A call executed by the wallet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default)]
    pub delegate_call: bool,
    #[serde(default)]
    pub revert_on_error: bool,
    #[serde(default, alias = "gas")]
    pub gas_limit: U256,
    pub to: Address,
    #[serde(default)]
    pub value: U256,
    #[serde(default, alias = "input")]
    pub data: Bytes,
}

impl Transaction {
    /// A reverting call with no value and automatic gas.
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            revert_on_error: true,
            to,
            data: data.into(),
            ..Default::default()
        }
    }
}

impl From<&Transaction> for IWalletModule::Transaction {
    fn from(tx: &Transaction) -> Self {
        Self {
            delegateCall: tx.delegate_call,
            revertOnError: tx.revert_on_error,
            gasLimit: tx.gas_limit,
            target: tx.to,
            value: tx.value,
            data: tx.data.clone(),
        }
    }
}

impl From<IWalletModule::Transaction> for Transaction {
    fn from(tx: IWalletModule::Transaction) -> Self {
        Self {
            delegate_call: tx.delegateCall,
            revert_on_error: tx.revertOnError,
            gas_limit: tx.gasLimit,
            to: tx.target,
            value: tx.value,
            data: tx.data,
        }
    }
}

/// Converts a batch into the ABI representation.
pub fn encode_transactions(txs: &[Transaction]) -> Vec<IWalletModule::Transaction> {
    txs.iter().map(Into::into).collect()
}

/// `keccak256(abi.encode(nonce, txs))`
pub fn execute_digest(nonce: U256, txs: &[Transaction]) -> B256 {
    keccak256((nonce, encode_transactions(txs)).abi_encode_params())
}

/// Binds a digest to a wallet on a chain: `keccak256("\x19\x01" ‖ chainId ‖ wallet ‖ digest)`.
pub fn sub_digest(chain_id: u64, wallet: Address, digest: B256) -> B256 {
    let mut buf = Vec::with_capacity(2 + 32 + 20 + 32);
    buf.extend_from_slice(b"\x19\x01");
    buf.extend_from_slice(&U256::from(chain_id).to_be_bytes::<32>());
    buf.extend_from_slice(wallet.as_slice());
    buf.extend_from_slice(digest.as_slice());
    keccak256(&buf)
}

/// A signed batch ready to be handed to a relayer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransactions {
    pub chain_id: u64,
    /// The wallet executing the batch
    pub address: Address,
    /// Config the signature was produced under
    pub config: WalletConfig,
    pub context: WalletContext,
    pub transactions: Vec<Transaction>,
    pub nonce: U256,
    pub signature: Bytes,
}

impl SignedTransactions {
    /// The digest the signature commits to, before binding it to the wallet.
    pub fn digest(&self) -> B256 {
        execute_digest(self.nonce, &self.transactions)
    }
}

/// Handle of a relayed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReceipt {
    pub chain_id: u64,
    pub hash: B256,
}

/// A way of refunding the relayer for a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeOption {
    /// Fee token, zero for the native currency
    pub token: Address,
    pub to: Address,
    pub value: U256,
    pub gas_limit: U256,
}
