//! Signing keys and the kinds of signer a request handler can be backed by.

use crate::{Account, WalletError};
use alloy::{
    primitives::{Address, Bytes, Signature},
    signers::{Signer as _, local::PrivateKeySigner},
};
use async_trait::async_trait;
use std::{fmt, sync::Arc};

/// A key held outside this process, for example behind a remote service.
#[async_trait]
pub trait RemoteSigner: Send + Sync + fmt::Debug {
    fn address(&self) -> Address;

    /// Signs `message` with the EIP-191 prefix. `data` is auxiliary context
    /// the remote side may use to decide whether to sign.
    async fn sign_message_with_data(
        &self,
        message: &[u8],
        data: Option<&[u8]>,
    ) -> Result<Signature, WalletError>;
}

/// A key contributing to a wallet signature.
#[derive(Debug, Clone)]
pub enum KeySigner {
    LocalKey(PrivateKeySigner),
    RemoteDelegate(Arc<dyn RemoteSigner>),
}

impl KeySigner {
    pub fn address(&self) -> Address {
        match self {
            Self::LocalKey(signer) => signer.address(),
            Self::RemoteDelegate(signer) => signer.address(),
        }
    }

    /// EIP-191 signature over `message`.
    pub async fn sign_message(
        &self,
        message: &[u8],
        data: Option<&[u8]>,
    ) -> Result<Signature, WalletError> {
        match self {
            Self::LocalKey(signer) => Ok(signer.sign_message(message).await?),
            Self::RemoteDelegate(signer) => signer.sign_message_with_data(message, data).await,
        }
    }
}

impl From<PrivateKeySigner> for KeySigner {
    fn from(signer: PrivateKeySigner) -> Self {
        Self::LocalKey(signer)
    }
}

/// What stands behind a request handler.
///
/// Only [`SignerKind::MultiNetworkAccount`] offers the coordinator surface
/// (configs, relaying, multiple networks); the other kinds can only sign.
#[derive(Debug, Clone)]
pub enum SignerKind {
    LocalKey(PrivateKeySigner),
    RemoteDelegate(Arc<dyn RemoteSigner>),
    MultiNetworkAccount(Arc<Account>),
}

impl SignerKind {
    pub fn address(&self) -> Address {
        match self {
            Self::LocalKey(signer) => signer.address(),
            Self::RemoteDelegate(signer) => signer.address(),
            Self::MultiNetworkAccount(account) => account.address(),
        }
    }

    /// Signs an arbitrary message for `chain_id`.
    ///
    /// Plain keys are chain agnostic and ignore it.
    pub async fn sign_message(
        &self,
        message: &[u8],
        chain_id: Option<u64>,
        only_full_sign: bool,
    ) -> Result<Bytes, WalletError> {
        match self {
            Self::LocalKey(signer) => {
                let signature = signer.sign_message(message).await?;
                Ok(signature.as_bytes().into())
            }
            Self::RemoteDelegate(signer) => {
                let signature = signer.sign_message_with_data(message, None).await?;
                Ok(signature.as_bytes().into())
            }
            Self::MultiNetworkAccount(account) => {
                account.sign_message(message, chain_id, only_full_sign).await
            }
        }
    }

    /// The account behind this signer, or `Unsupported` naming `method`.
    pub fn account(&self, method: &str) -> Result<&Arc<Account>, WalletError> {
        match self {
            Self::MultiNetworkAccount(account) => Ok(account),
            Self::LocalKey(_) | Self::RemoteDelegate(_) => {
                Err(WalletError::Unsupported(method.to_owned()))
            }
        }
    }
}

impl From<Account> for SignerKind {
    fn from(account: Account) -> Self {
        Self::MultiNetworkAccount(Arc::new(account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_key_signature_recovers_to_its_address() {
        let key = PrivateKeySigner::random();
        let signer = KeySigner::from(key.clone());

        let signature = signer.sign_message(b"hello", None).await.unwrap();
        assert_eq!(
            signature.recover_address_from_msg(b"hello").unwrap(),
            key.address()
        );
    }

    #[test]
    fn plain_keys_reject_account_methods() {
        let signer = SignerKind::LocalKey(PrivateKeySigner::random());
        let err = signer.account("sequence_updateConfig").unwrap_err();
        assert!(matches!(err, WalletError::Unsupported(method) if method == "sequence_updateConfig"));
    }
}
