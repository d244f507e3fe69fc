use alloy::primitives::{Address, B256};
use quorum_primitives::ConfigError;

/// Errors raised by per-network wallets and the account coordinator.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("combined signer weight {weight} below required threshold {threshold}")]
    InsufficientSigners { weight: u32, threshold: u16 },
    #[error("no published configuration found for wallet {address}")]
    ConfigNotFound {
        address: Address,
        image_hash: Option<B256>,
    },
    #[error("no network is flagged as auth chain")]
    MissingAuthChain,
    #[error("no network is flagged as default chain")]
    MissingMainChain,
    #[error("network {0} is not configured")]
    NetworkNotConfigured(u64),
    #[error("no relayer configured for network {0}")]
    MissingRelayer(u64),
    #[error("account must have at least one network")]
    NoNetworks,
    #[error("decoded config has image hash {actual}, expected {expected}")]
    ConfigMismatch { expected: B256, actual: B256 },
    #[error("decoded config derives address {actual}, expected {expected}")]
    AddressMismatch { expected: Address, actual: Address },
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("{0} is not supported by this signer")]
    Unsupported(String),
    #[error("relayer rejected submission: {0}")]
    Relayer(String),
    #[error(transparent)]
    Transport(#[from] alloy::transports::TransportError),
    #[error(transparent)]
    PendingTransaction(#[from] alloy::providers::PendingTransactionError),
    #[error(transparent)]
    Signer(#[from] alloy::signers::Error),
    #[error(transparent)]
    Abi(#[from] alloy::sol_types::Error),
    #[error("invalid typed data: {0}")]
    TypedData(#[from] alloy::dyn_abi::Error),
}
