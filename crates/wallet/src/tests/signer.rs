//! Keys held outside the process.

use super::fixtures::*;
use crate::{Account, AccountOptions, KeySigner, RemoteSigner, SignerKind, WalletError};
use alloy::{
    primitives::{Address, Signature},
    signers::{Signer as _, local::PrivateKeySigner},
    sol_types::SolValue,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use quorum_primitives::encode_transactions;
use std::sync::Arc;

/// Signs with a local key and remembers the context it was handed.
#[derive(Debug)]
struct DelegatedKey {
    key: PrivateKeySigner,
    seen: Mutex<Vec<Option<Vec<u8>>>>,
}

impl DelegatedKey {
    fn new(key: PrivateKeySigner) -> Arc<Self> {
        Arc::new(Self {
            key,
            seen: Mutex::default(),
        })
    }
}

#[async_trait]
impl RemoteSigner for DelegatedKey {
    fn address(&self) -> Address {
        self.key.address()
    }

    async fn sign_message_with_data(
        &self,
        message: &[u8],
        data: Option<&[u8]>,
    ) -> Result<Signature, WalletError> {
        self.seen.lock().push(data.map(<[u8]>::to_vec));
        Ok(self.key.sign_message(message).await?)
    }
}

#[tokio::test]
async fn remote_delegate_cosigns_with_batch_context() {
    let keys = anvil_keys();
    let config = weighted(2, &[(&keys[0], 1), (&keys[1], 1)]);
    let main = TestNetwork::main().await;
    let remote = DelegatedKey::new(keys[1].clone());

    let account = Account::new(AccountOptions {
        context: context().await,
        initial_config: config,
        networks: vec![main.network()],
        signers: vec![
            KeySigner::from(keys[0].clone()),
            KeySigner::RemoteDelegate(remote.clone()),
        ],
        address: None,
    })
    .unwrap();

    account
        .send_transaction(transfer(), None, true)
        .await
        .unwrap();

    let relayed = main.relayer.relayed();
    assert_eq!(relayed.len(), 1);
    let expected = (relayed[0].nonce, encode_transactions(&relayed[0].transactions))
        .abi_encode_params();
    assert_eq!(*remote.seen.lock(), vec![Some(expected)]);
}

#[tokio::test]
async fn remote_delegate_signs_plain_messages() {
    let key = PrivateKeySigner::random();
    let remote = DelegatedKey::new(key.clone());
    let signer = SignerKind::RemoteDelegate(remote.clone());

    assert_eq!(signer.address(), key.address());
    assert!(matches!(
        signer.account("sequence_getWalletConfig"),
        Err(WalletError::Unsupported(_))
    ));

    let signature = signer.sign_message(b"hello", Some(MAINNET), true).await.unwrap();
    let signature = Signature::try_from(&signature[..]).unwrap();
    assert_eq!(
        signature.recover_address_from_msg(b"hello").unwrap(),
        key.address()
    );
    assert_eq!(*remote.seen.lock(), vec![None]);
}
