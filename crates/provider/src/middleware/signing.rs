use crate::{JsonRpcHandler, JsonRpcMiddleware, JsonRpcRequest, Next, RpcError, is_signer_method};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::trace;

/// Sends signer methods to the signer, everything else down the pipeline.
pub struct SigningProvider {
    signer: Arc<dyn JsonRpcHandler>,
}

impl SigningProvider {
    pub fn new(signer: Arc<dyn JsonRpcHandler>) -> Self {
        Self { signer }
    }
}

#[async_trait]
impl JsonRpcMiddleware for SigningProvider {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
        next: Next<'_>,
    ) -> Result<Value, RpcError> {
        if is_signer_method(&request.method) {
            trace!(method = %request.method, ?chain_id, "Routing to signer");
            return self.signer.handle(request, chain_id).await;
        }
        next.run(request, chain_id).await
    }
}
