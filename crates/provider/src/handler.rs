//! Signer side execution of JSON-RPC requests.

use crate::{
    ChainForwarder, JsonRpcHandler, JsonRpcRequest, JsonRpcRouter, RpcError, SignerMethod,
    middleware::{EagerProvider, SigningProvider},
};
use alloy::{
    dyn_abi::TypedData,
    primitives::{Address, Bytes},
};
use async_trait::async_trait;
use futures::future::try_join_all;
use quorum_primitives::{SignedTransactions, Transaction, WalletConfig};
use quorum_wallet::{Account, SignerKind, WalletError};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info};

/// Answers [`SignerMethod`]s with the signer it is backed by.
///
/// Requests carry the target chain in their envelope; signing and relaying
/// methods default to the main chain when it is absent.
#[derive(Debug, Clone)]
pub struct WalletRequestHandler {
    signer: SignerKind,
    only_full_sign: bool,
}

impl WalletRequestHandler {
    pub fn new(signer: SignerKind) -> Self {
        Self {
            signer,
            only_full_sign: true,
        }
    }

    /// Lets signatures below the threshold through, for flows collecting the
    /// remaining signatures elsewhere.
    pub fn with_partial_signing(mut self) -> Self {
        self.only_full_sign = false;
        self
    }

    pub fn signer(&self) -> &SignerKind {
        &self.signer
    }

    /// The signer side pipeline: account and chain id answered eagerly,
    /// signer methods answered here and everything else sent to the account's
    /// chain nodes.
    pub fn account_router(account: Arc<Account>) -> Result<JsonRpcRouter, WalletError> {
        let forwarder = ChainForwarder::from_account(&account)?;
        let eager = EagerProvider::new(Some(account.address()), Some(forwarder.default_chain()));
        let handler = Self::new(SignerKind::MultiNetworkAccount(account));
        Ok(JsonRpcRouter::new(Arc::new(forwarder))
            .with(eager)
            .with(SigningProvider::new(Arc::new(handler))))
    }

    fn account(&self, method: SignerMethod) -> Result<&Arc<Account>, RpcError> {
        Ok(self.signer.account(method.as_str())?)
    }

    /// Rejects requests naming an address other than the signer's.
    fn check_address(&self, request: &JsonRpcRequest, index: usize) -> Result<(), RpcError> {
        let address: Address = request.parse_param(index)?;
        if address != self.signer.address() {
            return Err(RpcError::invalid_params(format!(
                "{address} is not the signer address {}",
                self.signer.address()
            )));
        }
        Ok(())
    }

    async fn sign_message(
        &self,
        request: &JsonRpcRequest,
        message_index: usize,
        address_index: usize,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        self.check_address(request, address_index)?;
        let message = message_bytes(request.param(message_index))?;
        let signature = self
            .signer
            .sign_message(&message, chain_id, self.only_full_sign)
            .await?;
        Ok(json!(signature))
    }

    async fn sign_typed_data(
        &self,
        request: &JsonRpcRequest,
        method: SignerMethod,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        self.check_address(request, 0)?;
        let typed_data: TypedData = match request.param(1) {
            Some(Value::String(encoded)) => serde_json::from_str(encoded)
                .map_err(|err| RpcError::invalid_params(format!("typed data: {err}")))?,
            _ => request.parse_param(1)?,
        };
        let signature = self
            .account(method)?
            .sign_typed_data(&typed_data, chain_id, self.only_full_sign)
            .await?;
        Ok(json!(signature))
    }

    async fn execute(
        &self,
        method: SignerMethod,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        match method {
            SignerMethod::PersonalSign => self.sign_message(&request, 0, 1, chain_id).await,
            SignerMethod::EthSign => self.sign_message(&request, 1, 0, chain_id).await,
            SignerMethod::EthSignTypedData | SignerMethod::EthSignTypedDataV4 => {
                self.sign_typed_data(&request, method, chain_id).await
            }
            SignerMethod::EthSignTransaction => {
                let txs = request.parse_param::<OneOrMany>(0)?.into_vec();
                let signed = self
                    .account(method)?
                    .sign_transactions(txs, chain_id, self.only_full_sign)
                    .await?;
                Ok(json!(signed))
            }
            SignerMethod::EthSendTransaction => {
                let txs = request.parse_param::<OneOrMany>(0)?.into_vec();
                let receipt = self
                    .account(method)?
                    .send_transaction(txs, chain_id, self.only_full_sign)
                    .await?;
                Ok(json!(receipt.hash))
            }
            SignerMethod::EthSendRawTransaction | SignerMethod::Relay => {
                let signed: SignedTransactions = request.parse_param(0)?;
                let account = self.account(method)?;
                let relayer = account.network_wallet(signed.chain_id)?.relayer()?;
                let receipt = relayer.relay(signed).await?;
                info!(chain_id = receipt.chain_id, tx_hash = %receipt.hash, "Relayed signed batch");
                match method {
                    SignerMethod::Relay => Ok(json!(receipt)),
                    _ => Ok(json!(receipt.hash)),
                }
            }
            SignerMethod::GetWalletContext => Ok(json!(self.account(method)?.context())),
            SignerMethod::GetWalletConfig => {
                let account = self.account(method)?;
                let chain_ids: Vec<u64> = match request.parse_optional_param(0)?.or(chain_id) {
                    Some(chain_id) => vec![chain_id],
                    None => account.networks().map(|network| network.chain_id).collect(),
                };
                let configs = try_join_all(chain_ids.iter().map(|chain_id| async move {
                    let config = account.current_config(Some(*chain_id)).await?;
                    Ok::<_, WalletError>(config_json(*chain_id, &config))
                }))
                .await?;
                Ok(Value::Array(configs))
            }
            SignerMethod::GetWalletState => {
                let account = self.account(method)?;
                let filter: Option<u64> = request.parse_optional_param(0)?.or(chain_id);
                let states = match filter {
                    Some(chain_id) => vec![account.state(chain_id).await?],
                    None => account.wallet_state().await?,
                };
                Ok(json!(states))
            }
            SignerMethod::GetNetworks => {
                let networks: Vec<_> = self.account(method)?.networks().cloned().collect();
                Ok(json!(networks))
            }
            SignerMethod::UpdateConfig => {
                let config: WalletConfig = request.parse_param(0)?;
                let receipt = self.account(method)?.update_config(&config).await?;
                Ok(json!(receipt.map(|receipt| receipt.hash)))
            }
            SignerMethod::PublishConfig => {
                let receipt = self.account(method)?.publish_config().await?;
                Ok(json!(receipt.hash))
            }
            SignerMethod::EstimateGasLimits => {
                let txs = request.parse_param::<OneOrMany>(0)?.into_vec();
                let wallet = self.account(method)?.target_wallet(chain_id)?;
                let txs = wallet
                    .relayer()?
                    .estimate_gas_limits(wallet.address(), &txs)
                    .await?;
                Ok(json!(txs))
            }
            SignerMethod::GasRefundOptions => {
                let txs = request.parse_param::<OneOrMany>(0)?.into_vec();
                let wallet = self.account(method)?.target_wallet(chain_id)?;
                let options = wallet
                    .relayer()?
                    .gas_refund_options(wallet.address(), &txs)
                    .await?;
                Ok(json!(options))
            }
            SignerMethod::GetNonce => {
                let nonce = self.account(method)?.target_wallet(chain_id)?.get_nonce().await?;
                Ok(json!(nonce))
            }
        }
    }
}

#[async_trait]
impl JsonRpcHandler for WalletRequestHandler {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        chain_id: Option<u64>,
    ) -> Result<Value, RpcError> {
        let method: SignerMethod = request
            .method
            .parse()
            .map_err(|()| RpcError::method_not_found(&request.method))?;

        debug!(%method, ?chain_id, "Handling signer request");
        self.execute(method, request, chain_id).await
    }
}

/// A single transaction or a batch.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Transaction),
    Many(Vec<Transaction>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<Transaction> {
        match self {
            Self::One(tx) => vec![tx],
            Self::Many(txs) => txs,
        }
    }
}

/// Message bytes from a `0x` hex string, or the UTF-8 bytes of any other
/// string.
fn message_bytes(param: Option<&Value>) -> Result<Vec<u8>, RpcError> {
    match param {
        Some(Value::String(message)) if message.starts_with("0x") => message
            .parse::<Bytes>()
            .map(|bytes| bytes.to_vec())
            .map_err(|err| RpcError::invalid_params(format!("message: {err}"))),
        Some(Value::String(message)) => Ok(message.as_bytes().to_vec()),
        Some(_) => Err(RpcError::invalid_params("message must be a string")),
        None => Err(RpcError::invalid_params("missing message")),
    }
}

fn config_json(chain_id: u64, config: &WalletConfig) -> Value {
    json!({
        "chainId": chain_id,
        "threshold": config.threshold(),
        "signers": config.signers(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;

    #[test]
    fn hex_messages_are_decoded() {
        assert_eq!(message_bytes(Some(&json!("0x6869"))).unwrap(), b"hi");
        assert_eq!(message_bytes(Some(&json!("hello"))).unwrap(), b"hello");
        assert!(message_bytes(Some(&json!(42))).is_err());
    }

    #[test]
    fn transactions_accept_single_or_batch() {
        let to = Address::repeat_byte(0x77);
        let one: OneOrMany = serde_json::from_value(json!({ "to": to, "data": "0x01" })).unwrap();
        assert_eq!(one.into_vec().len(), 1);

        let many: OneOrMany =
            serde_json::from_value(json!([{ "to": to }, { "to": to, "value": "0x1" }])).unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }

    #[tokio::test]
    async fn plain_key_signs_personal_messages() {
        let key = PrivateKeySigner::random();
        let handler = WalletRequestHandler::new(SignerKind::LocalKey(key.clone()));

        let request =
            JsonRpcRequest::new(1, "personal_sign", json!(["0x6869", key.address()]));
        let signature: Bytes = serde_json::from_value(handler.handle(request, None).await.unwrap())
            .unwrap();
        let signature = alloy::primitives::Signature::try_from(&signature[..]).unwrap();
        assert_eq!(signature.recover_address_from_msg(b"hi").unwrap(), key.address());
    }

    #[tokio::test]
    async fn plain_key_rejects_account_methods() {
        let handler = WalletRequestHandler::new(SignerKind::LocalKey(PrivateKeySigner::random()));

        let err = handler
            .handle(JsonRpcRequest::new(1, "sequence_getWalletState", json!([])), None)
            .await
            .unwrap_err();
        assert_eq!(err.code, jsonrpsee::types::error::METHOD_NOT_FOUND_CODE);
        assert!(err.message.contains("sequence_getWalletState"));
    }

    #[tokio::test]
    async fn foreign_address_is_rejected() {
        let handler = WalletRequestHandler::new(SignerKind::LocalKey(PrivateKeySigner::random()));

        let request = JsonRpcRequest::new(
            1,
            "eth_sign",
            json!([Address::repeat_byte(0x01), "0x6869"]),
        );
        let err = handler.handle(request, None).await.unwrap_err();
        assert_eq!(err.code, jsonrpsee::types::error::INVALID_PARAMS_CODE);
    }
}
