//! Configuration model of the multi-network smart wallet.
//!
//! Pure data and pure functions only: wallet configs and their fingerprints,
//! counterfactual address derivation, network descriptors and meta-transaction
//! digests. Nothing in here performs I/O.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod config;
pub mod context;
pub mod network;
pub mod transaction;

pub use config::{ConfigError, SignerInfo, WalletConfig};
pub use context::{WalletContext, derive_address, implementation_slot, wallet_init_code_hash};
pub use network::{ChainThreshold, ChainWeight, FullConfig, FullConfigSigner, NetworkConfig};
pub use transaction::{
    FeeOption, RelayReceipt, SignedTransactions, Transaction, encode_transactions, execute_digest,
    sub_digest,
};
