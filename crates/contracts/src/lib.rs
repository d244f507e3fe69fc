//! Contract bindings for the multi-network smart wallet.
//!
//! The wallet itself is a minimal proxy that delegates to a module contract. The
//! module it points to is stored in the storage slot keyed by the proxy's own
//! address. Fresh wallets delegate to the main module and are bound to the
//! configuration their address was derived from; once rotated they delegate to
//! the upgradable module which keeps the active image hash in storage.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod registry;
pub mod wallet;

pub use registry::{IRequireUtils, decode_members, encode_members};
pub use wallet::{IWalletFactory, IWalletModule, WALLET_CREATION_CODE};

/// EIP-1271 magic value returned by `isValidSignature` for a valid signature.
pub const IS_VALID_SIGNATURE_MAGIC: [u8; 4] = [0x16, 0x26, 0xba, 0x7e];
