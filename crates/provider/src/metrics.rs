//! Transport and router metrics.

use ::metrics::{Counter, counter};

/// Message transport metrics
#[derive(Clone)]
pub struct TransportMetrics {
    /// Number of envelopes sent across the boundary
    pub envelopes_sent: Counter,

    /// Number of envelopes accepted from the boundary
    pub envelopes_received: Counter,

    /// Number of inbound envelopes dropped for a foreign origin or a malformed payload
    pub envelopes_dropped: Counter,

    /// Number of connection handshakes completed
    pub connections: Counter,

    /// Number of pending requests failed because the connection was lost
    pub requests_lost: Counter,
}

impl Default for TransportMetrics {
    fn default() -> Self {
        Self {
            envelopes_sent: counter!("quorum_transport_envelopes_sent"),
            envelopes_received: counter!("quorum_transport_envelopes_received"),
            envelopes_dropped: counter!("quorum_transport_envelopes_dropped"),
            connections: counter!("quorum_transport_connections"),
            requests_lost: counter!("quorum_transport_requests_lost"),
        }
    }
}

impl TransportMetrics {
    /// Record an envelope sent
    #[inline]
    pub fn record_sent(&self) {
        self.envelopes_sent.increment(1);
    }

    /// Record an envelope accepted
    #[inline]
    pub fn record_received(&self) {
        self.envelopes_received.increment(1);
    }

    /// Record a dropped envelope
    #[inline]
    pub fn record_dropped(&self) {
        self.envelopes_dropped.increment(1);
    }

    /// Record a completed handshake
    #[inline]
    pub fn record_connected(&self) {
        self.connections.increment(1);
    }

    /// Record requests failed on disconnect
    #[inline]
    pub fn record_lost(&self, count: usize) {
        self.requests_lost.increment(count as u64);
    }
}

/// JSON-RPC router metrics
#[derive(Clone)]
pub struct RouterMetrics {
    /// Number of requests answered by a middleware
    pub requests_local: Counter,

    /// Number of requests passed to the router's sender
    pub requests_forwarded: Counter,

    /// Number of requests answered with an error
    pub requests_failed: Counter,
}

impl Default for RouterMetrics {
    fn default() -> Self {
        Self {
            requests_local: counter!("quorum_router_requests_local"),
            requests_forwarded: counter!("quorum_router_requests_forwarded"),
            requests_failed: counter!("quorum_router_requests_failed"),
        }
    }
}

impl RouterMetrics {
    /// Record a request answered by a middleware
    #[inline]
    pub fn record_local(&self) {
        self.requests_local.increment(1);
    }

    /// Record a request reaching the sender
    #[inline]
    pub fn record_forwarded(&self) {
        self.requests_forwarded.increment(1);
    }

    /// Record a failed request
    #[inline]
    pub fn record_failed(&self) {
        self.requests_failed.increment(1);
    }
}
