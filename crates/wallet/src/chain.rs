//! The chain primitives the coordinator needs from a network endpoint.

use crate::retry::with_retry;
use alloy::{
    primitives::{Address, B256, Bytes, Log, U256},
    providers::Provider,
    rpc::types::{Filter, TransactionRequest},
    transports::TransportResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Event log filter over a single emitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    /// topic0
    pub event: B256,
    /// topic1..=topic3, `None` matches anything
    pub topics: [Option<B256>; 3],
    pub from_block: u64,
}

impl LogQuery {
    /// All logs of `event` emitted by `address` since genesis.
    pub fn new(address: Address, event: B256) -> Self {
        Self {
            address,
            event,
            topics: [None; 3],
            from_block: 0,
        }
    }

    pub fn topic1(mut self, topic: B256) -> Self {
        self.topics[0] = Some(topic);
        self
    }

    pub fn topic2(mut self, topic: B256) -> Self {
        self.topics[1] = Some(topic);
        self
    }

    /// Whether `log` passes this filter.
    pub fn matches(&self, log: &Log) -> bool {
        let topics = log.topics();
        log.address == self.address
            && topics.first() == Some(&self.event)
            && self
                .topics
                .iter()
                .enumerate()
                .all(|(i, expected)| expected.is_none_or(|t| topics.get(i + 1) == Some(&t)))
    }

    fn to_filter(&self) -> Filter {
        let mut filter = Filter::new()
            .address(self.address)
            .event_signature(self.event)
            .from_block(self.from_block);
        if let Some(topic) = self.topics[0] {
            filter = filter.topic1(topic);
        }
        if let Some(topic) = self.topics[1] {
            filter = filter.topic2(topic);
        }
        if let Some(topic) = self.topics[2] {
            filter = filter.topic3(topic);
        }
        filter
    }
}

/// Read access to one network.
///
/// These are the only chain primitives config resolution depends on, plus a
/// raw passthrough used to forward JSON-RPC requests the wallet does not answer
/// itself.
#[async_trait]
pub trait ChainReader: Send + Sync + fmt::Debug {
    async fn chain_id(&self) -> TransportResult<u64>;

    async fn get_storage_at(&self, address: Address, slot: U256) -> TransportResult<B256>;

    /// `eth_call` against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> TransportResult<Bytes>;

    /// Matching logs in block order.
    async fn get_logs(&self, query: &LogQuery) -> TransportResult<Vec<Log>>;

    async fn get_code(&self, address: Address) -> TransportResult<Bytes>;

    async fn request(&self, method: &str, params: Value) -> TransportResult<Value>;
}

/// [`ChainReader`] over an alloy provider.
pub struct RpcChainReader<P> {
    provider: P,
}

impl<P> RpcChainReader<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P> fmt::Debug for RpcChainReader<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChainReader").finish_non_exhaustive()
    }
}

#[async_trait]
impl<P: Provider + 'static> ChainReader for RpcChainReader<P> {
    async fn chain_id(&self) -> TransportResult<u64> {
        with_retry("eth_chainId", || self.provider.get_chain_id()).await
    }

    async fn get_storage_at(&self, address: Address, slot: U256) -> TransportResult<B256> {
        let value = with_retry("eth_getStorageAt", || async {
            self.provider.get_storage_at(address, slot).await
        })
        .await?;
        Ok(B256::from(value))
    }

    async fn call(&self, to: Address, data: Bytes) -> TransportResult<Bytes> {
        let tx = TransactionRequest::default().to(to).input(data.into());
        with_retry("eth_call", || async { self.provider.call(tx.clone()).await }).await
    }

    async fn get_logs(&self, query: &LogQuery) -> TransportResult<Vec<Log>> {
        let filter = query.to_filter();
        let logs = with_retry("eth_getLogs", || self.provider.get_logs(&filter)).await?;
        Ok(logs.into_iter().map(|log| log.inner).collect())
    }

    async fn get_code(&self, address: Address) -> TransportResult<Bytes> {
        with_retry("eth_getCode", || async {
            self.provider.get_code_at(address).await
        })
        .await
    }

    async fn request(&self, method: &str, params: Value) -> TransportResult<Value> {
        self.provider
            .raw_request::<Value, Value>(method.to_owned().into(), params)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::LogData;

    fn log(address: Address, topics: Vec<B256>) -> Log {
        Log {
            address,
            data: LogData::new_unchecked(topics, Bytes::new()),
        }
    }

    #[test]
    fn query_matches_on_indexed_topics() {
        let emitter = Address::repeat_byte(1);
        let event = B256::repeat_byte(0xee);
        let wallet = B256::repeat_byte(0xaa);
        let image_hash = B256::repeat_byte(0xbb);

        let entry = log(emitter, vec![event, wallet, image_hash]);

        assert!(LogQuery::new(emitter, event).matches(&entry));
        assert!(LogQuery::new(emitter, event).topic1(wallet).matches(&entry));
        assert!(LogQuery::new(emitter, event).topic2(image_hash).matches(&entry));
        assert!(!LogQuery::new(emitter, event).topic2(wallet).matches(&entry));
        assert!(!LogQuery::new(Address::repeat_byte(2), event).matches(&entry));
        assert!(!LogQuery::new(emitter, B256::ZERO).matches(&entry));
    }
}
