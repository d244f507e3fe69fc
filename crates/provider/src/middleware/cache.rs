use crate::{JsonRpcMiddleware, JsonRpcRequest, Next, RpcError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use tracing::trace;

/// Methods whose answer cannot change while the process runs.
const CACHEABLE_METHODS: &[&str] = &[
    "eth_chainId",
    "net_version",
    "sequence_getWalletContext",
    "sequence_getNetworks",
];

/// Remembers the first successful answer to immutable queries.
///
/// Entries are written once per method, chain and parameters and never
/// replaced. Failed requests are not cached.
#[derive(Debug, Default)]
pub struct CachedProvider {
    cache: Mutex<HashMap<(String, Option<u64>, String), Value>>,
}

impl CachedProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JsonRpcMiddleware for CachedProvider {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
        next: Next<'_>,
    ) -> Result<Value, RpcError> {
        if !CACHEABLE_METHODS.contains(&request.method.as_str()) {
            return next.run(request, chain_id).await;
        }

        let key = (request.method.clone(), chain_id, request.params.to_string());
        if let Some(value) = self.cache.lock().get(&key) {
            trace!(method = %request.method, ?chain_id, "Cache hit");
            return Ok(value.clone());
        }

        let value = next.run(request, chain_id).await?;
        Ok(self.cache.lock().entry(key).or_insert(value).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonRpcHandler, JsonRpcRouter};
    use serde_json::json;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JsonRpcHandler for Counting {
        async fn handle(
            &self,
            request: JsonRpcRequest,
            chain_id: Option<u64>,
        ) -> Result<Value, RpcError> {
            let calls = self.calls.fetch_add(1, Ordering::SeqCst);
            if request.method == "eth_fail" {
                return Err(RpcError::internal("unavailable"));
            }
            Ok(json!({ "calls": calls, "chainId": chain_id }))
        }
    }

    #[tokio::test]
    async fn immutable_answers_are_fetched_once_per_chain() {
        let sender = Arc::new(Counting::default());
        let router = JsonRpcRouter::new(sender.clone()).with(CachedProvider::new());
        let request = JsonRpcRequest::new(1, "eth_chainId", json!([]));

        let first = router.handle(request.clone(), Some(1)).await.unwrap();
        let second = router.handle(request.clone(), Some(1)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(sender.calls.load(Ordering::SeqCst), 1);

        router.handle(request, Some(10)).await.unwrap();
        assert_eq!(sender.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn other_methods_always_pass_through() {
        let sender = Arc::new(Counting::default());
        let router = JsonRpcRouter::new(sender.clone()).with(CachedProvider::new());
        let request = JsonRpcRequest::new(1, "eth_blockNumber", json!([]));

        router.handle(request.clone(), None).await.unwrap();
        router.handle(request, None).await.unwrap();
        assert_eq!(sender.calls.load(Ordering::SeqCst), 2);
    }
}
