//! Encoding of multi-signer wallet signatures and their validation.
//!
//! A wallet signature is the threshold as a big-endian `u16` followed by one
//! part per signer of the config, in ascending address order:
//!
//! - `0x00 ‖ weight ‖ address` for a signer that did not sign
//! - `0x01 ‖ weight ‖ r ‖ s ‖ v ‖ 0x02` for an EIP-191 signature over the
//!   sub-digest
//!
//! Since every signer is listed, the config the signature was produced under can
//! be recovered from the signature alone.

use crate::{ChainReader, WalletError};
use alloy::{
    primitives::{Address, B256, Bytes, Signature},
    sol_types::{SolCall, SolType, sol_data},
};
use quorum_contracts::{IS_VALID_SIGNATURE_MAGIC, IWalletModule};
use quorum_primitives::{SignerInfo, WalletConfig, WalletContext, sub_digest};
use std::collections::HashMap;

const ADDRESS_PART: u8 = 0;
const SIGNATURE_PART: u8 = 1;
/// Trailer of a signature part, the EIP-191 "eth_sign" signature type.
const ETH_SIGN: u8 = 2;

const ADDRESS_PART_LEN: usize = 1 + 1 + 20;
const SIGNATURE_PART_LEN: usize = 1 + 1 + 65 + 1;

/// One signer's entry in a [`WalletSignature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePart {
    Address { weight: u8, address: Address },
    Signed { weight: u8, signature: Signature },
}

impl SignaturePart {
    pub fn weight(&self) -> u8 {
        match self {
            Self::Address { weight, .. } | Self::Signed { weight, .. } => *weight,
        }
    }
}

/// A decoded wallet signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSignature {
    pub threshold: u16,
    pub parts: Vec<SignaturePart>,
}

/// Config and participating weight recovered from a [`WalletSignature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredSignature {
    pub config: WalletConfig,
    pub weight: u32,
}

impl WalletSignature {
    /// Lays out `signatures` over the signers of `config`. Signers without an
    /// entry in `signatures` are listed by address only.
    pub fn build(config: &WalletConfig, signatures: &HashMap<Address, Signature>) -> Self {
        let parts = config
            .signers()
            .iter()
            .map(|signer| match signatures.get(&signer.address) {
                Some(signature) => SignaturePart::Signed {
                    weight: signer.weight,
                    signature: *signature,
                },
                None => SignaturePart::Address {
                    weight: signer.weight,
                    address: signer.address,
                },
            })
            .collect();

        Self {
            threshold: config.threshold(),
            parts,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(2 + self.parts.len() * SIGNATURE_PART_LEN);
        out.extend_from_slice(&self.threshold.to_be_bytes());
        for part in &self.parts {
            match part {
                SignaturePart::Address { weight, address } => {
                    out.push(ADDRESS_PART);
                    out.push(*weight);
                    out.extend_from_slice(address.as_slice());
                }
                SignaturePart::Signed { weight, signature } => {
                    out.push(SIGNATURE_PART);
                    out.push(*weight);
                    out.extend_from_slice(&signature.as_bytes());
                    out.push(ETH_SIGN);
                }
            }
        }
        out.into()
    }

    pub fn decode(data: &[u8]) -> Result<Self, WalletError> {
        let malformed = |reason: &str| WalletError::MalformedSignature(reason.to_owned());

        let (threshold, mut rest) = data
            .split_first_chunk::<2>()
            .ok_or_else(|| malformed("missing threshold"))?;
        let threshold = u16::from_be_bytes(*threshold);

        let mut parts = Vec::new();
        while let Some((&flag, _)) = rest.split_first() {
            match flag {
                ADDRESS_PART => {
                    let part = rest
                        .get(..ADDRESS_PART_LEN)
                        .ok_or_else(|| malformed("truncated address part"))?;
                    parts.push(SignaturePart::Address {
                        weight: part[1],
                        address: Address::from_slice(&part[2..]),
                    });
                    rest = &rest[ADDRESS_PART_LEN..];
                }
                SIGNATURE_PART => {
                    let part = rest
                        .get(..SIGNATURE_PART_LEN)
                        .ok_or_else(|| malformed("truncated signature part"))?;
                    if part[SIGNATURE_PART_LEN - 1] != ETH_SIGN {
                        return Err(malformed("unsupported signature type"));
                    }
                    let signature = Signature::from_raw(&part[2..SIGNATURE_PART_LEN - 1])
                        .map_err(|err| WalletError::MalformedSignature(err.to_string()))?;
                    parts.push(SignaturePart::Signed {
                        weight: part[1],
                        signature,
                    });
                    rest = &rest[SIGNATURE_PART_LEN..];
                }
                other => {
                    return Err(WalletError::MalformedSignature(format!(
                        "unknown part flag {other:#04x}"
                    )));
                }
            }
        }

        Ok(Self { threshold, parts })
    }

    /// Recovers the signers of the parts signed over `sub_digest` and rebuilds
    /// the config the signature lists.
    pub fn recover(&self, sub_digest: B256) -> Result<RecoveredSignature, WalletError> {
        let mut weight = 0u32;
        let mut signers = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let address = match part {
                SignaturePart::Address { address, .. } => *address,
                SignaturePart::Signed { weight: w, signature } => {
                    let address = signature
                        .recover_address_from_msg(sub_digest.as_slice())
                        .map_err(|err| WalletError::MalformedSignature(err.to_string()))?;
                    weight += u32::from(*w);
                    address
                }
            };
            signers.push(SignerInfo::new(address, part.weight()));
        }

        Ok(RecoveredSignature {
            config: WalletConfig::new(self.threshold, signers)?,
            weight,
        })
    }
}

/// Checks that `signature` authorizes `digest` for `wallet` on `chain_id`.
///
/// Deployed wallets answer through EIP-1271. For a wallet without code the
/// signature is recovered locally: it must reach its own threshold and list
/// the config the wallet address was derived from.
pub async fn validate_signature(
    chain: &dyn ChainReader,
    context: &WalletContext,
    chain_id: u64,
    wallet: Address,
    digest: B256,
    signature: &[u8],
) -> Result<bool, WalletError> {
    let code = chain.get_code(wallet).await?;
    if !code.is_empty() {
        let call = IWalletModule::isValidSignatureCall {
            _hash: digest,
            _signature: Bytes::copy_from_slice(signature),
        };
        let result = chain.call(wallet, call.abi_encode().into()).await?;
        let magic = <sol_data::FixedBytes<4> as SolType>::abi_decode(&result)?;
        return Ok(magic.0 == IS_VALID_SIGNATURE_MAGIC);
    }

    let recovered = WalletSignature::decode(signature)?.recover(sub_digest(chain_id, wallet, digest))?;
    Ok(recovered.weight >= u32::from(recovered.config.threshold())
        && context.derive_address(&recovered.config) == wallet)
}
