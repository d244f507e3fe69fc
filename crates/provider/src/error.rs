use jsonrpsee::types::error::{
    ErrorObjectOwned, INTERNAL_ERROR_CODE, INVALID_PARAMS_CODE, METHOD_NOT_FOUND_CODE,
};
use quorum_wallet::WalletError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error code for wallet errors crossing the JSON-RPC boundary.
pub const WALLET_ERROR_CODE: i32 = -32000;

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS_CODE, message)
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            METHOD_NOT_FOUND_CODE,
            format!("the method {method} does not exist/is not available"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR_CODE, message)
    }
}

impl From<WalletError> for RpcError {
    fn from(error: WalletError) -> Self {
        match error {
            WalletError::Transport(err) => err.into(),
            WalletError::Unsupported(_) => Self::new(METHOD_NOT_FOUND_CODE, error.to_string()),
            WalletError::InvalidConfig(_) | WalletError::TypedData(_) => {
                Self::invalid_params(error.to_string())
            }
            _ => Self::new(WALLET_ERROR_CODE, error.to_string()),
        }
    }
}

/// Chain node errors are passed through with their original code and data.
impl From<alloy::transports::TransportError> for RpcError {
    fn from(error: alloy::transports::TransportError) -> Self {
        match error.as_error_resp() {
            Some(payload) => Self {
                code: i32::try_from(payload.code).unwrap_or(INTERNAL_ERROR_CODE),
                message: payload.message.to_string(),
                data: payload
                    .data
                    .as_ref()
                    .and_then(|raw| serde_json::from_str(raw.get()).ok()),
            },
            None => Self::internal(error.to_string()),
        }
    }
}

impl From<TransportError> for RpcError {
    fn from(error: TransportError) -> Self {
        Self::new(WALLET_ERROR_CODE, error.to_string())
    }
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(error: RpcError) -> Self {
        Self::owned(error.code, error.message, error.data)
    }
}

/// Failures of the message transport between a dapp and the signer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection to the wallet was lost")]
    ConnectionLost,
    #[error("wallet is not opened")]
    NotOpened,
    #[error("request was cancelled")]
    Cancelled,
    #[error("boundary failure: {0}")]
    Boundary(String),
    #[error("failed serializing message: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}
