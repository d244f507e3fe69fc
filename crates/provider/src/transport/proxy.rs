use crate::{Boundary, InboundMessage, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Two connected in-process ports, one for the dapp and one for the wallet.
///
/// The pair starts closed; opening either port opens both, closing either
/// closes both.
#[derive(Debug)]
pub struct ProxyChannel {
    pub dapp: ProxyPort,
    pub wallet: ProxyPort,
}

impl ProxyChannel {
    pub fn new(dapp_origin: impl Into<String>, wallet_origin: impl Into<String>) -> Self {
        let (dapp_origin, wallet_origin) = (dapp_origin.into(), wallet_origin.into());
        let (dapp_tx, dapp_rx) = unbounded_channel();
        let (wallet_tx, wallet_rx) = unbounded_channel();
        let closed = Arc::new(AtomicBool::new(true));

        Self {
            dapp: ProxyPort {
                origin: dapp_origin.clone(),
                remote_origin: wallet_origin.clone(),
                peer: wallet_tx.clone(),
                inbound_tx: dapp_tx.clone(),
                inbound: Mutex::new(Some(dapp_rx)),
                closed: closed.clone(),
            },
            wallet: ProxyPort {
                origin: wallet_origin,
                remote_origin: dapp_origin,
                peer: dapp_tx,
                inbound_tx: wallet_tx,
                inbound: Mutex::new(Some(wallet_rx)),
                closed,
            },
        }
    }
}

/// One end of a [`ProxyChannel`].
#[derive(Debug)]
pub struct ProxyPort {
    origin: String,
    remote_origin: String,
    peer: UnboundedSender<InboundMessage>,
    inbound_tx: UnboundedSender<InboundMessage>,
    inbound: Mutex<Option<UnboundedReceiver<InboundMessage>>>,
    closed: Arc<AtomicBool>,
}

impl ProxyPort {
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Messages posted to this port. Can be taken once.
    pub fn take_inbound(&self) -> Option<UnboundedReceiver<InboundMessage>> {
        self.inbound.lock().take()
    }

    /// Posts into this port's inbound queue under any origin, like other
    /// traffic sharing the channel.
    pub fn injector(&self) -> UnboundedSender<InboundMessage> {
        self.inbound_tx.clone()
    }
}

#[async_trait]
impl Boundary for ProxyPort {
    fn remote_origin(&self) -> &str {
        &self.remote_origin
    }

    async fn open(&self) -> Result<(), TransportError> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn send(&self, payload: String) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::NotOpened);
        }
        self.peer
            .send(InboundMessage {
                origin: self.origin.clone(),
                payload,
            })
            .map_err(|_| TransportError::Boundary("peer port dropped".to_owned()))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
