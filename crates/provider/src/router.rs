//! Ordered JSON-RPC middleware pipeline.
//!
//! A [`JsonRpcRouter`] passes each request through its middlewares in order.
//! Every middleware either answers the request or hands it to [`Next`]; the
//! request reaches the router's sender only when no middleware answered it.

use crate::{JsonRpcRequest, JsonRpcResponse, RpcError, metrics::RouterMetrics};
use async_trait::async_trait;
use quorum_wallet::{Account, ChainReader, WalletError};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, trace};

/// Something that answers JSON-RPC requests, optionally scoped to a chain.
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError>;
}

/// A step of a [`JsonRpcRouter`].
#[async_trait]
pub trait JsonRpcMiddleware: Send + Sync {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
        next: Next<'_>,
    ) -> Result<Value, RpcError>;
}

/// The rest of the pipeline after the current middleware.
pub struct Next<'a> {
    middlewares: &'a [Arc<dyn JsonRpcMiddleware>],
    sender: &'a dyn JsonRpcHandler,
    /// Set once the request reaches `sender`
    forwarded: &'a AtomicBool,
    metrics: &'a RouterMetrics,
}

impl Next<'_> {
    pub async fn run(
        self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        match self.middlewares.split_first() {
            Some((middleware, middlewares)) => {
                let next = Next {
                    middlewares,
                    sender: self.sender,
                    forwarded: self.forwarded,
                    metrics: self.metrics,
                };
                middleware.handle(request, chain_id, next).await
            }
            None => {
                trace!(method = %request.method, ?chain_id, "Forwarding request");
                self.forwarded.store(true, Ordering::Relaxed);
                self.metrics.record_forwarded();
                self.sender.handle(request, chain_id).await
            }
        }
    }
}

pub struct JsonRpcRouter {
    middlewares: Vec<Arc<dyn JsonRpcMiddleware>>,
    sender: Arc<dyn JsonRpcHandler>,
    metrics: RouterMetrics,
}

impl JsonRpcRouter {
    /// A router passing every request straight to `sender`.
    pub fn new(sender: Arc<dyn JsonRpcHandler>) -> Self {
        Self {
            middlewares: Vec::new(),
            sender,
            metrics: RouterMetrics::default(),
        }
    }

    /// Appends `middleware` after the ones already installed.
    pub fn with(mut self, middleware: impl JsonRpcMiddleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Routes `request` and wraps the outcome in a response carrying its id.
    pub async fn call(&self, request: JsonRpcRequest, chain_id: Option<u64>) -> JsonRpcResponse {
        let id = request.id.clone();
        JsonRpcResponse::from_result(id, self.handle(request, chain_id).await)
    }
}

#[async_trait]
impl JsonRpcHandler for JsonRpcRouter {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        let forwarded = AtomicBool::new(false);
        let next = Next {
            middlewares: &self.middlewares,
            sender: self.sender.as_ref(),
            forwarded: &forwarded,
            metrics: &self.metrics,
        };

        let method = request.method.clone();
        let result = next.run(request, chain_id).await;
        if !forwarded.load(Ordering::Relaxed) {
            self.metrics.record_local();
        }
        if let Err(err) = &result {
            debug!(%method, ?chain_id, code = err.code, message = %err.message, "Request failed");
            self.metrics.record_failed();
        }
        result
    }
}

/// Forwards requests to the chain node of the requested network, the default
/// network when none is given.
pub struct ChainForwarder {
    chains: BTreeMap<u64, Arc<dyn ChainReader>>,
    default_chain: u64,
}

impl ChainForwarder {
    pub fn new(
        default_chain: u64,
        chains: impl IntoIterator<Item = (u64, Arc<dyn ChainReader>)>,
    ) -> Self {
        Self {
            chains: chains.into_iter().collect(),
            default_chain,
        }
    }

    /// Forwards to the networks of `account`, defaulting to its main chain.
    pub fn from_account(account: &Account) -> Result<Self, WalletError> {
        let default_chain = account.main_wallet()?.chain_id();
        Ok(Self::new(
            default_chain,
            account
                .wallets()
                .iter()
                .map(|wallet| (wallet.chain_id(), wallet.chain().clone())),
        ))
    }

    pub fn default_chain(&self) -> u64 {
        self.default_chain
    }
}

#[async_trait]
impl JsonRpcHandler for ChainForwarder {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        let chain_id = chain_id.unwrap_or(self.default_chain);
        let chain = self
            .chains
            .get(&chain_id)
            .ok_or_else(|| RpcError::from(WalletError::NetworkNotConfigured(chain_id)))?;
        Ok(chain.request(&request.method, request.params).await?)
    }
}
