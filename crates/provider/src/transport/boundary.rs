use crate::TransportError;
use async_trait::async_trait;
use std::fmt;

/// A payload received from the boundary, tagged with the origin that posted
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub origin: String,
    pub payload: String,
}

impl InboundMessage {
    pub fn new(origin: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            payload: payload.into(),
        }
    }
}

/// A message passing channel to the other side of the transport, such as a
/// wallet window or an in-process port.
///
/// The channel may be shared with unrelated traffic. Inbound messages are
/// delivered to whoever registered for them and are accepted only when their
/// origin equals [`Boundary::remote_origin`].
#[async_trait]
pub trait Boundary: Send + Sync + fmt::Debug {
    /// Origin the counterpart posts from.
    fn remote_origin(&self) -> &str;

    /// Brings up the counterpart. Opening an open boundary does nothing.
    async fn open(&self) -> Result<(), TransportError>;

    /// Posts `payload` to the counterpart.
    fn send(&self, payload: String) -> Result<(), TransportError>;

    /// Whether the counterpart is gone.
    fn is_closed(&self) -> bool;

    fn close(&self);
}
