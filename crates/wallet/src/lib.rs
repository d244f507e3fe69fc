//! Smart wallets spanning several networks.
//!
//! [`NetworkWallet`] signs and submits for a single network. [`Account`] owns
//! one of them per configured network, reconstructs the config each network
//! enforces from chain state and the auth chain's config registry, and keeps
//! the networks in line with the auth chain when transactions are sent.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod account;
pub mod chain;
pub mod deployment;
pub mod error;
pub mod network_wallet;
pub mod relayer;
mod retry;
pub mod settings;
pub mod signature;
pub mod signer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use account::{Account, AccountOptions, Network, WalletState};
pub use chain::{ChainReader, LogQuery, RpcChainReader};
pub use error::WalletError;
pub use network_wallet::NetworkWallet;
pub use relayer::{LocalRelayer, Relayer};
pub use settings::AccountSettings;
pub use signature::{RecoveredSignature, SignaturePart, WalletSignature, validate_signature};
pub use signer::{KeySigner, RemoteSigner, SignerKind};
