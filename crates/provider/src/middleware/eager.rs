use crate::{JsonRpcMiddleware, JsonRpcRequest, Next, RpcError};
use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{Value, json};

/// Answers account and chain id queries from what is already known, without
/// a round trip.
///
/// Requests for a chain other than the known one pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct EagerProvider {
    account: Option<Address>,
    chain_id: Option<u64>,
}

impl EagerProvider {
    pub fn new(account: Option<Address>, chain_id: Option<u64>) -> Self {
        Self { account, chain_id }
    }
}

#[async_trait]
impl JsonRpcMiddleware for EagerProvider {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
        next: Next<'_>,
    ) -> Result<Value, RpcError> {
        let known_chain = match (self.chain_id, chain_id) {
            (Some(known), None) => Some(known),
            (Some(known), Some(requested)) if known == requested => Some(known),
            _ => None,
        };

        match (request.method.as_str(), self.account, known_chain) {
            ("eth_accounts", Some(account), _) => Ok(json!([account])),
            ("eth_chainId", _, Some(chain_id)) => Ok(json!(format!("{chain_id:#x}"))),
            ("net_version", _, Some(chain_id)) => Ok(json!(chain_id.to_string())),
            _ => next.run(request, chain_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonRpcHandler, JsonRpcRouter};
    use std::sync::Arc;

    struct Unreachable;

    #[async_trait]
    impl JsonRpcHandler for Unreachable {
        async fn handle(
            &self,
            request: JsonRpcRequest,
            _chain_id: Option<u64>,
        ) -> Result<Value, RpcError> {
            Err(RpcError::method_not_found(&request.method))
        }
    }

    fn router() -> JsonRpcRouter {
        JsonRpcRouter::new(Arc::new(Unreachable))
            .with(EagerProvider::new(Some(Address::repeat_byte(0x11)), Some(137)))
    }

    #[tokio::test]
    async fn answers_known_values() {
        let router = router();

        let accounts = router
            .handle(JsonRpcRequest::new(1, "eth_accounts", json!([])), None)
            .await
            .unwrap();
        assert_eq!(accounts, json!([Address::repeat_byte(0x11)]));

        let chain_id = router
            .handle(JsonRpcRequest::new(2, "eth_chainId", json!([])), None)
            .await
            .unwrap();
        assert_eq!(chain_id, json!("0x89"));

        let version = router
            .handle(JsonRpcRequest::new(3, "net_version", json!([])), Some(137))
            .await
            .unwrap();
        assert_eq!(version, json!("137"));
    }

    #[tokio::test]
    async fn other_chains_pass_through() {
        let err = router()
            .handle(JsonRpcRequest::new(1, "eth_chainId", json!([])), Some(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, jsonrpsee::types::error::METHOD_NOT_FOUND_CODE);
    }
}
