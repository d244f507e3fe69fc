//! Dapp to wallet plumbing.
//!
//! Requests flow from a dapp through a [`JsonRpcRouter`] into a
//! [`MessageProvider`], across a [`Boundary`] to the wallet's
//! [`MessageHandler`], and through the wallet's own router where signer
//! methods reach the [`WalletRequestHandler`] and everything else is forwarded
//! to a chain node.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod config;
pub mod error;
pub mod handler;
pub mod json_rpc;
pub mod methods;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod transport;

pub use config::TransportConfig;
pub use error::{RpcError, TransportError, WALLET_ERROR_CODE};
pub use handler::WalletRequestHandler;
pub use json_rpc::{JsonRpcRequest, JsonRpcResponse};
pub use methods::{SignerMethod, is_signer_method};
pub use router::{ChainForwarder, JsonRpcHandler, JsonRpcMiddleware, JsonRpcRouter, Next};
pub use transport::{
    Boundary, ConnectionState, InboundMessage, MessageHandler, MessageProvider, MessageType,
    ProviderMessage, ProxyChannel, ProxyPort, next_message_idx,
};
