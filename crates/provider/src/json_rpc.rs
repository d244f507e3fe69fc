//! JSON-RPC 2.0 payloads exchanged between dapps, the signer and chain nodes.

use crate::RpcError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// The positional parameter at `index`, if any.
    pub fn param(&self, index: usize) -> Option<&Value> {
        match &self.params {
            Value::Array(params) => params.get(index),
            _ => None,
        }
    }

    /// Deserializes the positional parameter at `index`.
    pub fn parse_param<T: serde::de::DeserializeOwned>(&self, index: usize) -> Result<T, RpcError> {
        let value = self
            .param(index)
            .ok_or_else(|| RpcError::invalid_params(format!("missing parameter {index}")))?;
        serde_json::from_value(value.clone())
            .map_err(|err| RpcError::invalid_params(format!("parameter {index}: {err}")))
    }

    /// Deserializes the positional parameter at `index`, treating an absent or
    /// `null` value as `None`.
    pub fn parse_optional_param<T: serde::de::DeserializeOwned>(
        &self,
        index: usize,
    ) -> Result<Option<T>, RpcError> {
        match self.param(index) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.parse_param(index).map(Some),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: jsonrpc_version(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn from_result(id: Value, result: Result<Value, RpcError>) -> Self {
        match result {
            Ok(result) => Self::success(id, result),
            Err(error) => Self::failure(id, error),
        }
    }

    /// The error if set, otherwise the result (`null` when absent).
    pub fn into_result(self) -> Result<Value, RpcError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

fn jsonrpc_version() -> String {
    JSONRPC_VERSION.to_owned()
}
