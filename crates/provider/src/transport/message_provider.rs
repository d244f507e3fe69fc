use super::{ProviderMessage, next_message_idx};
use crate::{
    Boundary, InboundMessage, JsonRpcHandler, JsonRpcRequest, JsonRpcResponse, MessageType,
    RpcError, TransportConfig, TransportError, metrics::TransportMetrics,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
};
use tokio::{
    sync::{mpsc::UnboundedReceiver, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Connection to the wallet as seen by the dapp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Boundary opened, waiting for the wallet to acknowledge `connect`
    Connecting,
    Connected,
}

type PendingRequest = oneshot::Sender<Result<ProviderMessage, TransportError>>;

/// Dapp side of the transport.
///
/// The first request opens the boundary and dials `connect` every
/// [`TransportConfig::connect_interval`] until the wallet echoes it. Requests
/// wait for the handshake, are sent once and resolve with the response
/// carrying their index. While a session is up the boundary is polled every
/// [`TransportConfig::liveness_interval`]; once it is gone every request still
/// waiting fails with [`TransportError::ConnectionLost`].
pub struct MessageProvider<B> {
    this: Weak<Self>,
    boundary: B,
    config: TransportConfig,
    state: watch::Sender<ConnectionState>,
    /// Index of the `connect` envelope of the current session
    connect_idx: AtomicU64,
    /// Stops the dial and liveness loops of the current session
    session: Mutex<CancellationToken>,
    pending: Mutex<HashMap<u64, PendingRequest>>,
    metrics: TransportMetrics,
}

impl<B> fmt::Debug for MessageProvider<B>
where
    B: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageProvider")
            .field("boundary", &self.boundary)
            .field("state", &*self.state.borrow())
            .field("pending", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl<B: Boundary + 'static> MessageProvider<B> {
    pub fn new(boundary: B, config: TransportConfig) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            boundary,
            config,
            state: watch::Sender::new(ConnectionState::Disconnected),
            connect_idx: AtomicU64::new(0),
            session: Mutex::new(CancellationToken::new()),
            pending: Mutex::default(),
            metrics: TransportMetrics::default(),
        })
    }

    pub fn boundary(&self) -> &B {
        &self.boundary
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Notified on every connection state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Number of requests waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }

    /// Processes messages posted to the dapp. The task ends with the channel
    /// or with the provider.
    pub fn register(&self, mut inbound: UnboundedReceiver<InboundMessage>) -> JoinHandle<()> {
        let this = self.this.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                let Some(provider) = this.upgrade() else {
                    break;
                };
                provider.handle_inbound(message);
            }
        })
    }

    /// Opens the boundary and starts dialing, unless a session is already up
    /// or being opened.
    pub async fn open(&self) -> Result<(), TransportError> {
        // leaving `Disconnected` is the test-and-set guarding against
        // concurrent opens
        let opening = self.state.send_if_modified(|state| {
            let disconnected = *state == ConnectionState::Disconnected;
            if disconnected {
                *state = ConnectionState::Connecting;
            }
            disconnected
        });
        if !opening {
            return Ok(());
        }

        let result = self.start_session().await;
        if let Err(err) = &result {
            warn!(%err, origin = self.boundary.remote_origin(), "Failed opening wallet");
            self.state.send_replace(ConnectionState::Disconnected);
        }
        result
    }

    async fn start_session(&self) -> Result<(), TransportError> {
        let this = self.this.upgrade().ok_or(TransportError::Cancelled)?;
        self.boundary.open().await?;

        let token = CancellationToken::new();
        *self.session.lock() = token.clone();
        self.connect_idx.store(next_message_idx(), Ordering::Release);
        info!(origin = self.boundary.remote_origin(), "Opened wallet, dialing");

        tokio::spawn(this.clone().dial(token.clone()));
        tokio::spawn(this.watch_liveness(token));
        Ok(())
    }

    /// Posts `connect` until the session leaves [`ConnectionState::Connecting`].
    async fn dial(self: Arc<Self>, token: CancellationToken) {
        let connect = ProviderMessage::connect(self.connect_idx.load(Ordering::Acquire));
        let mut ticker = tokio::time::interval(self.config.connect_interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if self.state() != ConnectionState::Connecting {
                return;
            }
            if let Err(err) = self.post(&connect) {
                debug!(%err, idx = connect.idx, "Failed posting connect");
            }
        }
    }

    async fn watch_liveness(self: Arc<Self>, token: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.liveness_interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if self.boundary.is_closed() {
                info!(origin = self.boundary.remote_origin(), "Wallet closed");
                self.disconnect(TransportError::ConnectionLost);
                return;
            }
        }
    }

    fn post(&self, message: &ProviderMessage) -> Result<(), TransportError> {
        self.boundary.send(message.encode()?)?;
        self.metrics.record_sent();
        Ok(())
    }

    /// Ends the session: the dial and liveness loops stop and every pending
    /// request fails with `reason`.
    fn disconnect(&self, reason: TransportError) {
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        self.session.lock().cancel();

        let pending: Vec<_> = self.pending.lock().drain().collect();
        if previous != ConnectionState::Disconnected {
            info!(%reason, "Wallet disconnected");
        }
        if !pending.is_empty() {
            warn!(requests = pending.len(), %reason, "Failing pending requests");
            self.metrics.record_lost(pending.len());
        }
        for (_, request) in pending {
            let _ = request.send(Err(reason.clone()));
        }
    }

    /// Closes the boundary and fails pending requests.
    pub fn close(&self) {
        if self.state() == ConnectionState::Connected {
            if let Err(err) = self.post(&ProviderMessage::disconnect()) {
                debug!(%err, "Failed posting disconnect");
            }
        }
        self.boundary.close();
        self.disconnect(TransportError::ConnectionLost);
    }

    /// Abandons the session, including a dial still waiting for the wallet.
    pub fn cancel(&self) {
        self.disconnect(TransportError::Cancelled);
    }

    /// Accepts a message posted to the dapp.
    ///
    /// Messages from any origin but the wallet's, and payloads that are not
    /// envelopes, are dropped.
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
                if message.idx != self.connect_idx.load(Ordering::Acquire) {
                    debug!(idx = message.idx, "Ignoring stale connect");
                    return;
                }
                let connected = self.state.send_if_modified(|state| {
                    let connecting = *state == ConnectionState::Connecting;
                    if connecting {
                        *state = ConnectionState::Connected;
                    }
                    connecting
                });
                if connected {
                    info!(idx = message.idx, "Wallet connected");
                    self.metrics.record_connected();
                }
            }
            MessageType::Message => match self.pending.lock().remove(&message.idx) {
                Some(request) => {
                    let _ = request.send(Ok(message));
                }
                None => debug!(idx = message.idx, "No pending request for response"),
            },
            MessageType::Disconnect => self.disconnect(TransportError::ConnectionLost),
        }
    }

    /// Sends `request` to the wallet and waits for its response, opening the
    /// wallet first if needed.
    pub async fn send_request(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<JsonRpcResponse, TransportError> {
        self.open().await?;

        let state = *self
            .state
            .subscribe()
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map_err(|_| TransportError::ConnectionLost)?;
        if state != ConnectionState::Connected {
            return Err(TransportError::NotOpened);
        }

        let idx = next_message_idx();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock();
            // disconnect drains under this lock after leaving `Connected`
            if self.state() != ConnectionState::Connected {
                return Err(TransportError::ConnectionLost);
            }
            pending.insert(idx, tx);
        }

        let message = ProviderMessage::message(idx, serde_json::to_value(&request)?, chain_id);
        if let Err(err) = self.post(&message) {
            self.pending.lock().remove(&idx);
            return Err(err);
        }
        trace!(idx, method = %request.method, ?chain_id, "Sent request");

        let response = rx.await.map_err(|_| TransportError::ConnectionLost)??;
        Ok(serde_json::from_value(response.data)?)
    }
}

#[async_trait]
impl<B: Boundary + 'static> JsonRpcHandler for MessageProvider<B> {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        self.send_request(request, chain_id).await?.into_result()
    }
}
