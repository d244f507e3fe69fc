//! Accounts wired to in-memory chains.

use crate::{
    Account, AccountOptions, KeySigner, Network, deployment,
    test_utils::{MockChain, MockRelayer, mock_context},
};
use alloy::{
    primitives::{Address, address},
    signers::local::PrivateKeySigner,
};
use quorum_primitives::{NetworkConfig, SignerInfo, Transaction, WalletConfig, WalletContext};
use std::{convert::Infallible, sync::Arc};

pub(super) const MAINNET: u64 = 1;
pub(super) const ROLLUP: u64 = 10;

pub(super) const RECIPIENT: Address = address!("7777777777777777777777777777777777777777");

pub(super) fn anvil_keys() -> Vec<PrivateKeySigner> {
    let keys = [
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
        "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    ];

    keys.iter().map(|k| k.parse().unwrap()).collect()
}

pub(super) async fn context() -> WalletContext {
    deployment::wallet_context(|| async { Ok::<_, Infallible>(mock_context()) })
        .await
        .unwrap()
}

pub(super) fn weighted(threshold: u16, signers: &[(&PrivateKeySigner, u8)]) -> WalletConfig {
    WalletConfig::new(
        threshold,
        signers
            .iter()
            .map(|(key, weight)| SignerInfo::new(key.address(), *weight)),
    )
    .unwrap()
}

pub(super) fn transfer() -> Vec<Transaction> {
    vec![Transaction::call(RECIPIENT, vec![0xde, 0xad, 0xbe, 0xef])]
}

/// A mock network and the relayer executing against it.
pub(super) struct TestNetwork {
    pub(super) config: NetworkConfig,
    pub(super) chain: Arc<MockChain>,
    pub(super) relayer: Arc<MockRelayer>,
}

impl TestNetwork {
    pub(super) async fn new(config: NetworkConfig) -> Self {
        let chain = Arc::new(MockChain::new(config.chain_id, context().await));
        let relayer = Arc::new(MockRelayer::new(chain.clone()));
        Self {
            config,
            chain,
            relayer,
        }
    }

    /// Network flagged as both default and auth chain.
    pub(super) async fn main() -> Self {
        Self::new(NetworkConfig::new(MAINNET, "mainnet").default_chain().auth_chain()).await
    }

    pub(super) async fn rollup() -> Self {
        Self::new(NetworkConfig::new(ROLLUP, "rollup")).await
    }

    pub(super) fn network(&self) -> Network {
        Network {
            config: self.config.clone(),
            chain: self.chain.clone(),
            relayer: Some(self.relayer.clone()),
        }
    }
}

pub(super) async fn account(
    initial_config: &WalletConfig,
    keys: &[&PrivateKeySigner],
    networks: &[&TestNetwork],
) -> Account {
    account_at(initial_config, keys, networks, None).await
}

pub(super) async fn account_at(
    initial_config: &WalletConfig,
    keys: &[&PrivateKeySigner],
    networks: &[&TestNetwork],
    address: Option<Address>,
) -> Account {
    Account::new(AccountOptions {
        context: context().await,
        initial_config: initial_config.clone(),
        networks: networks.iter().map(|network| network.network()).collect(),
        signers: keys.iter().map(|key| KeySigner::from((*key).clone())).collect(),
        address,
    })
    .unwrap()
}
