//! Dapp to wallet flows over the in-process proxy boundary.

use alloy::{
    primitives::{Address, B256, U256},
    signers::local::PrivateKeySigner,
};
use quorum_primitives::{NetworkConfig, SignerInfo, WalletConfig};
use quorum_provider::{
    Boundary, ConnectionState, InboundMessage, JsonRpcHandler, JsonRpcRequest, JsonRpcRouter,
    MessageHandler, MessageProvider, MessageType, ProviderMessage, ProxyChannel, RpcError,
    TransportConfig, TransportError, WalletRequestHandler, middleware::CachedProvider,
};
use quorum_wallet::{
    Account, AccountOptions, KeySigner, Network,
    test_utils::{MockChain, MockRelayer, mock_context},
};
use serde_json::{Value, json};
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::mpsc::UnboundedReceiver;

const DAPP_ORIGIN: &str = "https://dapp.test";
const WALLET_ORIGIN: &str = "https://wallet.test";
const MAINNET: u64 = 1;
const ROLLUP: u64 = 10;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    account: Arc<Account>,
    mainnet: Arc<MockChain>,
    rollup: Arc<MockChain>,
}

/// Single owner account on a main+auth network and a rollup.
fn account() -> Fixture {
    let key = PrivateKeySigner::random();
    let config = WalletConfig::new(1, [SignerInfo::new(key.address(), 1)]).unwrap();
    let mainnet = Arc::new(MockChain::new(MAINNET, mock_context()));
    let rollup = Arc::new(MockChain::new(ROLLUP, mock_context()));

    let account = Account::new(AccountOptions {
        context: mock_context(),
        initial_config: config,
        networks: vec![
            Network {
                config: NetworkConfig::new(MAINNET, "mainnet").default_chain().auth_chain(),
                chain: mainnet.clone(),
                relayer: Some(Arc::new(MockRelayer::new(mainnet.clone()))),
            },
            Network {
                config: NetworkConfig::new(ROLLUP, "rollup"),
                chain: rollup.clone(),
                relayer: Some(Arc::new(MockRelayer::new(rollup.clone()))),
            },
        ],
        signers: vec![KeySigner::from(key)],
        address: None,
    })
    .unwrap();

    Fixture {
        account: Arc::new(account),
        mainnet,
        rollup,
    }
}

fn fast() -> TransportConfig {
    TransportConfig {
        connect_interval: Duration::from_millis(10),
        liveness_interval: Duration::from_millis(20),
    }
}

/// Dapp provider talking to a wallet served by `router`.
fn connect(
    router: Arc<dyn JsonRpcHandler>,
) -> (Arc<MessageProvider<quorum_provider::ProxyPort>>, ProxyChannelEnds) {
    let ProxyChannel { dapp, wallet } = ProxyChannel::new(DAPP_ORIGIN, WALLET_ORIGIN);
    let dapp_inbound = dapp.take_inbound().unwrap();
    let wallet_inbound = wallet.take_inbound().unwrap();
    let dapp_injector = dapp.injector();
    let wallet_injector = wallet.injector();

    let handler = MessageHandler::new(wallet, router);
    handler.register(wallet_inbound);
    let provider = MessageProvider::new(dapp, fast());
    provider.register(dapp_inbound);

    (
        provider,
        ProxyChannelEnds {
            handler,
            dapp_injector,
            wallet_injector,
        },
    )
}

struct ProxyChannelEnds {
    handler: Arc<MessageHandler<quorum_provider::ProxyPort>>,
    dapp_injector: tokio::sync::mpsc::UnboundedSender<InboundMessage>,
    wallet_injector: tokio::sync::mpsc::UnboundedSender<InboundMessage>,
}

/// Counts requests and answers each with its method name.
#[derive(Default)]
struct Echo {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl JsonRpcHandler for Echo {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "method": request.method, "chainId": chain_id }))
    }
}

/// Reads wallet side envelopes until one of `kind` arrives.
async fn next_envelope(
    inbound: &mut UnboundedReceiver<InboundMessage>,
    kind: MessageType,
) -> ProviderMessage {
    loop {
        let message = inbound.recv().await.unwrap();
        let envelope = ProviderMessage::decode(&message.payload).unwrap();
        if envelope.kind == kind {
            return envelope;
        }
    }
}

#[tokio::test]
async fn first_request_dials_and_completes_handshake() {
    init_tracing();
    let echo = Arc::new(Echo::default());
    let (provider, _ends) = connect(echo.clone());
    assert_eq!(provider.state(), ConnectionState::Disconnected);

    let result = provider
        .handle(JsonRpcRequest::new(1, "eth_blockNumber", json!([])), Some(ROLLUP))
        .await
        .unwrap();

    assert_eq!(result, json!({ "method": "eth_blockNumber", "chainId": ROLLUP }));
    assert_eq!(provider.state(), ConnectionState::Connected);
    assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.pending_requests(), 0);
}

#[tokio::test]
async fn only_the_matching_index_resolves_a_request() {
    init_tracing();
    let ProxyChannel { dapp, wallet } = ProxyChannel::new(DAPP_ORIGIN, WALLET_ORIGIN);
    let dapp_inbound = dapp.take_inbound().unwrap();
    let mut wallet_inbound = wallet.take_inbound().unwrap();
    let provider = MessageProvider::new(dapp, fast());
    provider.register(dapp_inbound);

    let request = tokio::spawn({
        let provider = provider.clone();
        async move {
            provider
                .send_request(JsonRpcRequest::new(9, "eth_accounts", json!([])), None)
                .await
        }
    });

    let connect = next_envelope(&mut wallet_inbound, MessageType::Connect).await;
    wallet.send(connect.encode().unwrap()).unwrap();
    let sent = next_envelope(&mut wallet_inbound, MessageType::Message).await;
    assert!(sent.idx > connect.idx);

    let response = |idx: u64, result: &str| {
        ProviderMessage::message(
            idx,
            json!({ "jsonrpc": "2.0", "id": 9, "result": [result] }),
            None,
        )
        .encode()
        .unwrap()
    };

    wallet.send(response(sent.idx + 1000, "wrong")).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!request.is_finished());
    assert_eq!(provider.pending_requests(), 1);

    wallet.send(response(sent.idx, "right")).unwrap();
    let response = request.await.unwrap().unwrap();
    assert_eq!(response.id, json!(9));
    assert_eq!(response.result, Some(json!(["right"])));
}

#[tokio::test]
async fn foreign_origin_never_reaches_the_handler() {
    init_tracing();
    let echo = Arc::new(Echo::default());
    let (provider, ends) = connect(echo.clone());

    let forged = ProviderMessage::message(
        u64::MAX,
        json!({ "jsonrpc": "2.0", "id": 1, "method": "sequence_updateConfig", "params": [] }),
        None,
    );
    ends.wallet_injector
        .send(InboundMessage::new("https://evil.test", forged.encode().unwrap()))
        .unwrap();
    ends.wallet_injector
        .send(InboundMessage::new(DAPP_ORIGIN, "{ not an envelope"))
        .unwrap();

    provider
        .handle(JsonRpcRequest::new(2, "eth_chainId", json!([])), None)
        .await
        .unwrap();
    assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn foreign_origin_responses_are_ignored_by_the_dapp() {
    init_tracing();
    let ProxyChannel { dapp, wallet } = ProxyChannel::new(DAPP_ORIGIN, WALLET_ORIGIN);
    let dapp_inbound = dapp.take_inbound().unwrap();
    let dapp_injector = dapp.injector();
    let mut wallet_inbound = wallet.take_inbound().unwrap();
    let provider = MessageProvider::new(dapp, fast());
    provider.register(dapp_inbound);

    let request = tokio::spawn({
        let provider = provider.clone();
        async move {
            provider
                .send_request(JsonRpcRequest::new(1, "eth_accounts", json!([])), None)
                .await
        }
    });

    let connect = next_envelope(&mut wallet_inbound, MessageType::Connect).await;
    // a forged acknowledgement does not complete the handshake
    dapp_injector
        .send(InboundMessage::new("https://evil.test", connect.encode().unwrap()))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(provider.state(), ConnectionState::Connecting);

    wallet.send(connect.encode().unwrap()).unwrap();
    let sent = next_envelope(&mut wallet_inbound, MessageType::Message).await;
    let forged = ProviderMessage::message(
        sent.idx,
        json!({ "jsonrpc": "2.0", "id": 1, "result": ["forged"] }),
        None,
    );
    dapp_injector
        .send(InboundMessage::new("https://evil.test", forged.encode().unwrap()))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!request.is_finished());

    provider.close();
    assert_eq!(request.await.unwrap(), Err(TransportError::ConnectionLost));
}

#[tokio::test]
async fn closing_the_wallet_fails_pending_requests() {
    init_tracing();
    let ProxyChannel { dapp, wallet } = ProxyChannel::new(DAPP_ORIGIN, WALLET_ORIGIN);
    let dapp_inbound = dapp.take_inbound().unwrap();
    let mut wallet_inbound = wallet.take_inbound().unwrap();
    let provider = MessageProvider::new(dapp, fast());
    provider.register(dapp_inbound);

    let request = tokio::spawn({
        let provider = provider.clone();
        async move {
            provider
                .send_request(JsonRpcRequest::new(1, "personal_sign", json!([])), None)
                .await
        }
    });

    let connect = next_envelope(&mut wallet_inbound, MessageType::Connect).await;
    wallet.send(connect.encode().unwrap()).unwrap();
    next_envelope(&mut wallet_inbound, MessageType::Message).await;
    assert_eq!(provider.pending_requests(), 1);

    // the wallet goes away without answering
    wallet.close();

    assert_eq!(request.await.unwrap(), Err(TransportError::ConnectionLost));
    assert_eq!(provider.state(), ConnectionState::Disconnected);
    assert_eq!(provider.pending_requests(), 0);
}

#[tokio::test]
async fn cancelling_abandons_the_dial() {
    init_tracing();
    let ProxyChannel { dapp, wallet } = ProxyChannel::new(DAPP_ORIGIN, WALLET_ORIGIN);
    let dapp_inbound = dapp.take_inbound().unwrap();
    let mut wallet_inbound = wallet.take_inbound().unwrap();
    let provider = MessageProvider::new(dapp, fast());
    provider.register(dapp_inbound);

    let request = tokio::spawn({
        let provider = provider.clone();
        async move {
            provider
                .send_request(JsonRpcRequest::new(1, "eth_accounts", json!([])), None)
                .await
        }
    });

    // the wallet never installs a listener: connect is posted repeatedly
    let first = next_envelope(&mut wallet_inbound, MessageType::Connect).await;
    let second = next_envelope(&mut wallet_inbound, MessageType::Connect).await;
    assert_eq!(first.idx, second.idx);

    provider.cancel();
    assert_eq!(request.await.unwrap(), Err(TransportError::NotOpened));
    assert_eq!(provider.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn signer_methods_are_answered_by_the_account() {
    init_tracing();
    let fixture = account();
    let address = fixture.account.address();
    let router = WalletRequestHandler::account_router(fixture.account.clone()).unwrap();
    let (provider, _ends) = connect(Arc::new(router));
    let dapp = JsonRpcRouter::new(provider).with(CachedProvider::new());

    let accounts = dapp
        .call(JsonRpcRequest::new(1, "eth_accounts", json!([])), None)
        .await;
    assert_eq!(accounts.result, Some(json!([address])));

    let chain_id = dapp
        .call(JsonRpcRequest::new(2, "eth_chainId", json!([])), None)
        .await;
    assert_eq!(chain_id.result, Some(json!("0x1")));

    let state = dapp
        .call(JsonRpcRequest::new(3, "sequence_getWalletState", json!([])), Some(ROLLUP))
        .await
        .into_result()
        .unwrap();
    assert_eq!(state[0]["chainId"], json!(ROLLUP));
    assert_eq!(state[0]["deployed"], json!(false));

    let networks = dapp
        .call(JsonRpcRequest::new(4, "sequence_getNetworks", json!([])), None)
        .await
        .into_result()
        .unwrap();
    assert_eq!(networks.as_array().unwrap().len(), 2);

    // neither answered by a chain node
    assert!(fixture.mainnet.requests().is_empty());
    assert!(fixture.rollup.requests().is_empty());
}

#[tokio::test]
async fn chain_methods_are_forwarded_to_the_requested_network() {
    init_tracing();
    let fixture = account();
    fixture.rollup.respond_to("eth_blockNumber", json!("0x10"));
    fixture.mainnet.respond_to("eth_blockNumber", json!("0x01"));
    let router = WalletRequestHandler::account_router(fixture.account.clone()).unwrap();
    let (provider, _ends) = connect(Arc::new(router));

    let rollup = provider
        .handle(JsonRpcRequest::new(1, "eth_blockNumber", json!([])), Some(ROLLUP))
        .await
        .unwrap();
    assert_eq!(rollup, json!("0x10"));

    let mainnet = provider
        .handle(JsonRpcRequest::new(2, "eth_blockNumber", json!([])), None)
        .await
        .unwrap();
    assert_eq!(mainnet, json!("0x01"));

    assert_eq!(fixture.rollup.requests().len(), 1);
    assert_eq!(fixture.mainnet.requests().len(), 1);
}

#[tokio::test]
async fn fresh_account_deploys_its_initial_config() {
    init_tracing();
    let fixture = account();
    let address = fixture.account.address();
    let initial = fixture.account.initial_config().clone();
    let router = WalletRequestHandler::account_router(fixture.account.clone()).unwrap();
    let (provider, _ends) = connect(Arc::new(router));

    let hash = provider
        .handle(
            JsonRpcRequest::new(1, "sequence_updateConfig", json!([initial])),
            None,
        )
        .await
        .unwrap();
    assert!(serde_json::from_value::<B256>(hash).is_ok());
    assert!(fixture.mainnet.has_code(address));
    assert!(!fixture.rollup.has_code(address));

    let configs = provider
        .handle(
            JsonRpcRequest::new(2, "sequence_getWalletConfig", json!([MAINNET])),
            None,
        )
        .await
        .unwrap();
    assert_eq!(configs[0]["chainId"], json!(MAINNET));
    assert_eq!(configs[0]["threshold"], json!(1));

    // the same config again is a no-op
    let noop = provider
        .handle(
            JsonRpcRequest::new(3, "sequence_updateConfig", json!([initial])),
            None,
        )
        .await
        .unwrap();
    assert_eq!(noop, Value::Null);

    let nonce = provider
        .handle(JsonRpcRequest::new(4, "sequence_getNonce", json!([])), Some(MAINNET))
        .await
        .unwrap();
    assert_eq!(serde_json::from_value::<U256>(nonce).unwrap(), U256::from(1));
}

#[tokio::test]
async fn wallet_errors_cross_the_boundary() {
    init_tracing();
    let fixture = account();
    let router = WalletRequestHandler::account_router(fixture.account.clone()).unwrap();
    let (provider, _ends) = connect(Arc::new(router));

    let err = provider
        .handle(
            JsonRpcRequest::new(
                1,
                "eth_sendTransaction",
                json!([{ "to": Address::repeat_byte(0x77) }]),
            ),
            Some(42),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, quorum_provider::WALLET_ERROR_CODE);
    assert!(err.message.contains("network 42"));
}

#[tokio::test]
async fn wallet_disconnect_envelope_ends_the_session() {
    init_tracing();
    let echo = Arc::new(Echo::default());
    let (provider, ends) = connect(echo);

    provider
        .handle(JsonRpcRequest::new(1, "eth_chainId", json!([])), None)
        .await
        .unwrap();
    assert_eq!(provider.state(), ConnectionState::Connected);

    ends.dapp_injector
        .send(InboundMessage::new(
            WALLET_ORIGIN,
            ProviderMessage::disconnect().encode().unwrap(),
        ))
        .unwrap();
    let mut state = provider.subscribe();
    state
        .wait_for(|state| *state == ConnectionState::Disconnected)
        .await
        .unwrap();

    // the next request reopens and dials again
    provider
        .handle(JsonRpcRequest::new(2, "eth_chainId", json!([])), None)
        .await
        .unwrap();
    assert_eq!(provider.state(), ConnectionState::Connected);
    assert!(!ends.handler.boundary().is_closed());
}
