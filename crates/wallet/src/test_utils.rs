//! In-memory chain and relayer simulating the wallet contracts.

use crate::{ChainReader, LogQuery, Relayer, WalletError, signature::WalletSignature};
use alloy::{
    primitives::{Address, B256, Bytes, FixedBytes, Log, U256, keccak256},
    sol_types::{SolCall, SolEvent, SolInterface, SolValue},
    transports::{TransportErrorKind, TransportResult},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use quorum_contracts::{
    IRequireUtils, IS_VALID_SIGNATURE_MAGIC, IWalletModule, WALLET_CREATION_CODE,
    encode_members, registry::RequiredConfig,
};
use quorum_primitives::{
    FeeOption, RelayReceipt, SignedTransactions, Transaction, WalletConfig, WalletContext,
    implementation_slot, sub_digest,
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

/// Wallet context used by the mocks.
pub fn mock_context() -> WalletContext {
    WalletContext {
        factory: Address::repeat_byte(0xf0),
        main_module: Address::repeat_byte(0xa1),
        main_module_upgradable: Address::repeat_byte(0xa2),
        guest_module: Address::repeat_byte(0xa3),
        require_utils: Address::repeat_byte(0xa4),
    }
}

#[derive(Debug, Default)]
struct MockState {
    code: HashMap<Address, Bytes>,
    storage: HashMap<(Address, U256), B256>,
    image_hashes: HashMap<Address, B256>,
    nonces: HashMap<Address, U256>,
    logs: Vec<Log>,
    responses: HashMap<String, Value>,
    requests: Vec<(String, Value)>,
    storage_reads: usize,
}

/// A single network holding wallet proxies, their module state and the
/// config registry's event log.
#[derive(Debug)]
pub struct MockChain {
    chain_id: u64,
    context: WalletContext,
    state: Mutex<MockState>,
}

fn reverted() -> alloy::transports::TransportError {
    TransportErrorKind::custom_str("execution reverted")
}

impl MockChain {
    pub fn new(chain_id: u64, context: WalletContext) -> Self {
        Self {
            chain_id,
            context,
            state: Mutex::default(),
        }
    }

    pub fn context(&self) -> &WalletContext {
        &self.context
    }

    /// Places a wallet proxy at `wallet` delegating to `module`.
    pub fn deploy_wallet(&self, wallet: Address, module: Address) {
        let mut state = self.state.lock();
        state
            .code
            .insert(wallet, Bytes::from_static(&WALLET_CREATION_CODE));
        state
            .storage
            .insert((wallet, implementation_slot(wallet)), module.into_word());
    }

    pub fn has_code(&self, address: Address) -> bool {
        self.state.lock().code.contains_key(&address)
    }

    pub fn implementation(&self, wallet: Address) -> Address {
        let state = self.state.lock();
        state
            .storage
            .get(&(wallet, implementation_slot(wallet)))
            .map_or(Address::ZERO, |word| Address::from_word(*word))
    }

    pub fn set_implementation(&self, wallet: Address, module: Address) {
        self.state
            .lock()
            .storage
            .insert((wallet, implementation_slot(wallet)), module.into_word());
    }

    pub fn image_hash(&self, wallet: Address) -> Option<B256> {
        self.state.lock().image_hashes.get(&wallet).copied()
    }

    pub fn set_image_hash(&self, wallet: Address, image_hash: B256) {
        self.state.lock().image_hashes.insert(wallet, image_hash);
    }

    pub fn nonce(&self, wallet: Address) -> U256 {
        self.state
            .lock()
            .nonces
            .get(&wallet)
            .copied()
            .unwrap_or_default()
    }

    fn increment_nonce(&self, wallet: Address) {
        *self.state.lock().nonces.entry(wallet).or_default() += U256::from(1);
    }

    /// Emits the registry event recording `config` for `wallet`.
    pub fn publish_config(&self, wallet: Address, config: &WalletConfig) {
        let event = RequiredConfig {
            _wallet: wallet,
            _imageHash: config.fingerprint(),
            _threshold: U256::from(config.threshold()),
            _signers: encode_members(&config.members()),
        };
        self.push_log(Log {
            address: self.context.require_utils,
            data: event.encode_log_data(),
        });
    }

    pub fn push_log(&self, log: Log) {
        self.state.lock().logs.push(log);
    }

    pub fn logs(&self) -> Vec<Log> {
        self.state.lock().logs.clone()
    }

    /// Answer returned for forwarded `method` requests, `null` otherwise.
    pub fn respond_to(&self, method: &str, response: Value) {
        self.state
            .lock()
            .responses
            .insert(method.to_owned(), response);
    }

    /// Number of storage slots read so far.
    pub fn storage_reads(&self) -> usize {
        self.state.lock().storage_reads
    }

    /// Forwarded requests in arrival order.
    pub fn requests(&self) -> Vec<(String, Value)> {
        self.state.lock().requests.clone()
    }

    /// Validates `signature` the way the wallet modules do: it must reach the
    /// threshold of the config it lists, and that config must be the one the
    /// wallet enforces.
    pub fn is_valid_signature(&self, wallet: Address, digest: B256, signature: &[u8]) -> bool {
        let recovered = match WalletSignature::decode(signature)
            .and_then(|sig| sig.recover(sub_digest(self.chain_id, wallet, digest)))
        {
            Ok(recovered) => recovered,
            Err(_) => return false,
        };

        if recovered.weight < u32::from(recovered.config.threshold()) {
            return false;
        }

        if self.implementation(wallet) == self.context.main_module_upgradable {
            self.image_hash(wallet) == Some(recovered.config.fingerprint())
        } else {
            self.context.derive_address(&recovered.config) == wallet
        }
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn chain_id(&self) -> TransportResult<u64> {
        Ok(self.chain_id)
    }

    async fn get_storage_at(&self, address: Address, slot: U256) -> TransportResult<B256> {
        let mut state = self.state.lock();
        state.storage_reads += 1;
        Ok(state.storage.get(&(address, slot)).copied().unwrap_or_default())
    }

    async fn call(&self, to: Address, data: Bytes) -> TransportResult<Bytes> {
        if !self.has_code(to) {
            return Ok(Bytes::new());
        }

        let call = IWalletModule::IWalletModuleCalls::abi_decode(&data).map_err(|_| reverted())?;
        let output = match call {
            IWalletModule::IWalletModuleCalls::imageHash(_) => {
                if self.implementation(to) != self.context.main_module_upgradable {
                    return Err(reverted());
                }
                self.image_hash(to).unwrap_or_default().abi_encode()
            }
            IWalletModule::IWalletModuleCalls::nonce(_) => self.nonce(to).abi_encode(),
            IWalletModule::IWalletModuleCalls::isValidSignature(call) => {
                let magic = if self.is_valid_signature(to, call._hash, &call._signature) {
                    IS_VALID_SIGNATURE_MAGIC
                } else {
                    [0; 4]
                };
                FixedBytes::<4>::from(magic).abi_encode()
            }
            _ => return Err(reverted()),
        };
        Ok(output.into())
    }

    async fn get_logs(&self, query: &LogQuery) -> TransportResult<Vec<Log>> {
        Ok(self
            .state
            .lock()
            .logs
            .iter()
            .filter(|log| query.matches(log))
            .cloned()
            .collect())
    }

    async fn get_code(&self, address: Address) -> TransportResult<Bytes> {
        Ok(self
            .state
            .lock()
            .code
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn request(&self, method: &str, params: Value) -> TransportResult<Value> {
        let mut state = self.state.lock();
        state.requests.push((method.to_owned(), params));
        if method == "eth_chainId" {
            return Ok(Value::String(format!("{:#x}", self.chain_id)));
        }
        Ok(state.responses.get(method).cloned().unwrap_or(Value::Null))
    }
}

/// Relayer executing batches directly against a [`MockChain`].
#[derive(Debug)]
pub struct MockRelayer {
    chain: Arc<MockChain>,
    relayed: Mutex<Vec<SignedTransactions>>,
}

impl MockRelayer {
    pub fn new(chain: Arc<MockChain>) -> Self {
        Self {
            chain,
            relayed: Mutex::default(),
        }
    }

    /// Batches executed so far.
    pub fn relayed(&self) -> Vec<SignedTransactions> {
        self.relayed.lock().clone()
    }

    fn apply(&self, wallet: Address, tx: &Transaction) -> Result<(), WalletError> {
        let context = self.chain.context;
        if tx.to == wallet {
            match IWalletModule::IWalletModuleCalls::abi_decode(&tx.data)? {
                IWalletModule::IWalletModuleCalls::selfExecute(call) => {
                    for inner in call._txs {
                        self.apply(wallet, &inner.into())?;
                    }
                }
                IWalletModule::IWalletModuleCalls::updateImplementation(call) => {
                    self.chain.set_implementation(wallet, call._implementation);
                }
                IWalletModule::IWalletModuleCalls::updateImageHash(call) => {
                    self.chain.set_image_hash(wallet, call._imageHash);
                }
                _ => return Err(WalletError::Relayer("unsupported self call".to_owned())),
            }
        } else if tx.to == context.require_utils {
            let call = IRequireUtils::publishConfigCall::abi_decode(&tx.data)?;
            let config = WalletConfig::from_members(call._threshold, &call._members)?;
            self.chain.publish_config(call._wallet, &config);
        }
        Ok(())
    }
}

#[async_trait]
impl Relayer for MockRelayer {
    async fn estimate_gas_limits(
        &self,
        _wallet: Address,
        txs: &[Transaction],
    ) -> Result<Vec<Transaction>, WalletError> {
        Ok(txs
            .iter()
            .cloned()
            .map(|mut tx| {
                if tx.gas_limit.is_zero() {
                    tx.gas_limit = U256::from(100_000);
                }
                tx
            })
            .collect())
    }

    async fn gas_refund_options(
        &self,
        _wallet: Address,
        _txs: &[Transaction],
    ) -> Result<Vec<FeeOption>, WalletError> {
        Ok(Vec::new())
    }

    async fn get_nonce(&self, wallet: Address) -> Result<U256, WalletError> {
        Ok(self.chain.nonce(wallet))
    }

    async fn relay(&self, signed: SignedTransactions) -> Result<RelayReceipt, WalletError> {
        let wallet = signed.address;
        if !self.chain.has_code(wallet) {
            let derived = signed.context.derive_address(&signed.config);
            if derived != wallet {
                return Err(WalletError::AddressMismatch {
                    expected: wallet,
                    actual: derived,
                });
            }
            self.chain.deploy_wallet(wallet, signed.context.main_module);
        }

        let nonce = self.chain.nonce(wallet);
        if signed.nonce != nonce {
            return Err(WalletError::Relayer(format!(
                "nonce {} does not match wallet nonce {nonce}",
                signed.nonce
            )));
        }
        if !self
            .chain
            .is_valid_signature(wallet, signed.digest(), &signed.signature)
        {
            return Err(WalletError::Relayer("invalid signature".to_owned()));
        }

        self.chain.increment_nonce(wallet);
        for tx in &signed.transactions {
            self.apply(wallet, tx)?;
        }

        let hash = keccak256((U256::from(signed.chain_id), wallet, signed.nonce).abi_encode());
        self.relayed.lock().push(signed);
        Ok(RelayReceipt {
            chain_id: self.chain.chain_id,
            hash,
        })
    }
}
