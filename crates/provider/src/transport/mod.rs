//! Message transport between a dapp and the wallet signer.
//!
//! Both sides exchange [`ProviderMessage`] envelopes over a [`Boundary`]. The
//! dapp side ([`MessageProvider`]) opens the boundary, dials `connect` until
//! the wallet side ([`MessageHandler`]) acknowledges, then sends each request
//! once under a fresh index and resolves it with the response carrying the
//! same index.

mod boundary;
mod message_handler;
mod message_provider;
mod proxy;

pub use boundary::{Boundary, InboundMessage};
pub use message_handler::MessageHandler;
pub use message_provider::{ConnectionState, MessageProvider};
pub use proxy::{ProxyChannel, ProxyPort};

use crate::TransportError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

static MESSAGE_IDX: AtomicU64 = AtomicU64::new(1);

/// Allocates the next envelope index. Indexes start at 1 and are never reused
/// within the process.
pub fn next_message_idx() -> u64 {
    MESSAGE_IDX.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Handshake, repeated by the dapp until the wallet echoes it
    Connect,
    /// Either side is going away
    Disconnect,
    /// A JSON-RPC request or its response
    Message,
}

/// Envelope exchanged across the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub idx: u64,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub data: Value,
    #[serde(default, rename = "chainId", skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl ProviderMessage {
    pub fn connect(idx: u64) -> Self {
        Self {
            idx,
            kind: MessageType::Connect,
            data: Value::Null,
            chain_id: None,
        }
    }

    pub fn disconnect() -> Self {
        Self {
            idx: next_message_idx(),
            kind: MessageType::Disconnect,
            data: Value::Null,
            chain_id: None,
        }
    }

    pub fn message(idx: u64, data: Value, chain_id: Option<u64>) -> Self {
        Self {
            idx,
            kind: MessageType::Message,
            data,
            chain_id,
        }
    }

    /// Parses an inbound payload, rejecting envelopes without a positive index.
    pub fn decode(payload: &str) -> Result<Self, TransportError> {
        let message: Self = serde_json::from_str(payload)?;
        if message.idx == 0 {
            return Err(TransportError::Serialization("message idx is empty".to_owned()));
        }
        Ok(message)
    }

    pub fn encode(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }
}
