//! Wallet configuration and its fingerprint.

use alloy_primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::SolValue;
use quorum_contracts::registry::Member;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Errors raised while building a [`WalletConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("duplicate signer {0}")]
    DuplicateSigner(Address),
    #[error("threshold {0} does not fit in 16 bits")]
    ThresholdOverflow(U256),
    #[error("weight {weight} of signer {address} does not fit in 8 bits")]
    WeightOverflow { address: Address, weight: U256 },
}

/// A signer of the wallet and the weight its signature carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignerInfo {
    pub address: Address,
    pub weight: u8,
}

impl SignerInfo {
    pub const fn new(address: Address, weight: u8) -> Self {
        Self { address, weight }
    }
}

/// Threshold and weighted signer set of a wallet.
///
/// Signers are kept sorted by address in ascending order, which is the order
/// the signature encoding and the fingerprint use. Two configs holding the same
/// threshold and signer set are therefore identical regardless of the order the
/// signers were supplied in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "UncheckedWalletConfig")]
pub struct WalletConfig {
    threshold: u16,
    signers: Vec<SignerInfo>,
}

#[derive(Deserialize)]
struct UncheckedWalletConfig {
    threshold: u16,
    signers: Vec<SignerInfo>,
}

impl TryFrom<UncheckedWalletConfig> for WalletConfig {
    type Error = ConfigError;

    fn try_from(value: UncheckedWalletConfig) -> Result<Self, Self::Error> {
        Self::new(value.threshold, value.signers)
    }
}

impl WalletConfig {
    /// Creates a config, rejecting duplicate signer addresses.
    ///
    /// The threshold is not checked against the total weight, an unreachable
    /// threshold only surfaces when signing.
    pub fn new(
        threshold: u16,
        signers: impl IntoIterator<Item = SignerInfo>,
    ) -> Result<Self, ConfigError> {
        let mut signers: Vec<_> = signers.into_iter().collect();
        let mut seen = HashSet::with_capacity(signers.len());
        for signer in &signers {
            if !seen.insert(signer.address) {
                return Err(ConfigError::DuplicateSigner(signer.address));
            }
        }
        signers.sort_by_key(|signer| signer.address);

        Ok(Self { threshold, signers })
    }

    /// Config with a single signer of weight 1 and threshold 1.
    pub fn single_owner(owner: Address) -> Self {
        Self {
            threshold: 1,
            signers: vec![SignerInfo::new(owner, 1)],
        }
    }

    /// Rebuilds a config from the values published in the config registry.
    pub fn from_members(threshold: U256, members: &[Member]) -> Result<Self, ConfigError> {
        let threshold =
            u16::try_from(threshold).map_err(|_| ConfigError::ThresholdOverflow(threshold))?;

        let signers = members
            .iter()
            .map(|member| {
                let weight =
                    u8::try_from(member.weight).map_err(|_| ConfigError::WeightOverflow {
                        address: member.signer,
                        weight: member.weight,
                    })?;
                Ok(SignerInfo::new(member.signer, weight))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(threshold, signers)
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    /// Signers in ascending address order.
    pub fn signers(&self) -> &[SignerInfo] {
        &self.signers
    }

    /// Weight of `address` in this config, zero if it is not a signer.
    pub fn weight_of(&self, address: &Address) -> u8 {
        self.signers
            .iter()
            .find(|signer| &signer.address == address)
            .map_or(0, |signer| signer.weight)
    }

    /// The image hash of this config.
    ///
    /// Starts from the threshold as a 32 byte word and folds every signer in as
    /// `keccak256(abi.encode(previous, uint8 weight, address))`.
    pub fn fingerprint(&self) -> B256 {
        self.signers.iter().fold(
            B256::from(U256::from(self.threshold)),
            |image_hash, signer| {
                keccak256((image_hash, U256::from(signer.weight), signer.address).abi_encode())
            },
        )
    }

    /// Fingerprint equality, the notion of "same config" used everywhere.
    pub fn is_same(&self, other: &Self) -> bool {
        self.fingerprint() == other.fingerprint()
    }

    /// Sum of the weights of the signers present in `signing_set`.
    ///
    /// Addresses that are not signers of this config contribute nothing.
    pub fn aggregate_weight<'a>(&self, signing_set: impl IntoIterator<Item = &'a Address>) -> u32 {
        let signing_set: HashSet<&Address> = signing_set.into_iter().collect();
        self.signers
            .iter()
            .filter(|signer| signing_set.contains(&signer.address))
            .map(|signer| u32::from(signer.weight))
            .sum()
    }

    /// Signers in the shape the config registry publishes them.
    pub fn members(&self) -> Vec<Member> {
        self.signers
            .iter()
            .map(|signer| Member {
                weight: U256::from(signer.weight),
                signer: signer.address,
            })
            .collect()
    }
}
