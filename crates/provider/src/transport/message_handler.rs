use super::ProviderMessage;
use crate::{
    Boundary, InboundMessage, JsonRpcHandler, JsonRpcRequest, JsonRpcResponse, MessageType,
    RpcError, metrics::TransportMetrics,
};
use jsonrpsee::types::error::INVALID_REQUEST_CODE;
use serde_json::Value;
use std::{
    fmt,
    sync::{Arc, Weak},
};
use tokio::{sync::mpsc::UnboundedReceiver, task::JoinHandle};
use tracing::{debug, info, trace};

/// Wallet side of the transport.
///
/// Echoes `connect` envelopes, runs every request envelope through the
/// wallet's JSON-RPC pipeline and posts the response under the request's
/// index. Requests are handled concurrently.
pub struct MessageHandler<B> {
    this: Weak<Self>,
    boundary: B,
    router: Arc<dyn JsonRpcHandler>,
    metrics: TransportMetrics,
}

impl<B> fmt::Debug for MessageHandler<B>
where
    B: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageHandler")
            .field("boundary", &self.boundary)
            .finish_non_exhaustive()
    }
}

impl<B: Boundary + 'static> MessageHandler<B> {
    pub fn new(boundary: B, router: Arc<dyn JsonRpcHandler>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            boundary,
            router,
            metrics: TransportMetrics::default(),
        })
    }

    pub fn boundary(&self) -> &B {
        &self.boundary
    }

    /// Processes messages posted to the wallet. The task ends with the channel
    /// or with the handler.
    pub fn register(&self, mut inbound: UnboundedReceiver<InboundMessage>) -> JoinHandle<()> {
        let this = self.this.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                let Some(handler) = this.upgrade() else {
                    break;
                };
                handler.handle_inbound(message);
            }
        })
    }

    /// Accepts a message posted to the wallet, dropping foreign origins and
    /// payloads that are not envelopes.
    pub fn handle_inbound(&self, inbound: InboundMessage) {
        if inbound.origin != self.boundary.remote_origin() {
            debug!(
                origin = %inbound.origin,
                expected = self.boundary.remote_origin(),
                "Dropping message from foreign origin"
            );
            self.metrics.record_dropped();
            return;
        }

        let message = match ProviderMessage::decode(&inbound.payload) {
            Ok(message) => message,
            Err(err) => {
                debug!(%err, "Dropping malformed message");
                self.metrics.record_dropped();
                return;
            }
        };
        self.metrics.record_received();

        match message.kind {
            MessageType::Connect => {
                info!(idx = message.idx, origin = %inbound.origin, "Dapp connecting");
                self.reply(&ProviderMessage::connect(message.idx));
            }
            MessageType::Message => {
                let Some(handler) = self.this.upgrade() else {
                    return;
                };
                tokio::spawn(async move {
                    let response = handler.execute(message.data, message.chain_id).await;
                    match serde_json::to_value(&response) {
                        Ok(data) => handler.reply(&ProviderMessage::message(
                            message.idx,
                            data,
                            message.chain_id,
                        )),
                        Err(err) => debug!(%err, idx = message.idx, "Failed encoding response"),
                    }
                });
            }
            MessageType::Disconnect => info!(origin = %inbound.origin, "Dapp disconnected"),
        }
    }

    async fn execute(&self, data: Value, chain_id: Option<u64>) -> JsonRpcResponse {
        let request: JsonRpcRequest = match serde_json::from_value(data) {
            Ok(request) => request,
            Err(err) => {
                return JsonRpcResponse::failure(
                    Value::Null,
                    RpcError::new(INVALID_REQUEST_CODE, err.to_string()),
                );
            }
        };

        trace!(method = %request.method, ?chain_id, "Executing request");
        let id = request.id.clone();
        JsonRpcResponse::from_result(id, self.router.handle(request, chain_id).await)
    }

    fn reply(&self, message: &ProviderMessage) {
        let result = message
            .encode()
            .and_then(|payload| self.boundary.send(payload));
        match result {
            Ok(()) => self.metrics.record_sent(),
            Err(err) => debug!(%err, idx = message.idx, "Failed posting reply"),
        }
    }
}
