//! Deployment context and counterfactual address derivation.

use crate::WalletConfig;
use alloy_primitives::{Address, U256, keccak256};
use quorum_contracts::WALLET_CREATION_CODE;
use serde::{Deserialize, Serialize};

/// Support contracts shared by every wallet of one deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletContext {
    pub factory: Address,
    pub main_module: Address,
    pub main_module_upgradable: Address,
    pub guest_module: Address,
    pub require_utils: Address,
}

impl WalletContext {
    /// Address the factory assigns to a wallet created with `config`.
    pub fn derive_address(&self, config: &WalletConfig) -> Address {
        derive_address(config, self)
    }
}

/// The init code hash of a wallet proxy bound to `main_module`.
pub fn wallet_init_code_hash(main_module: Address) -> alloy_primitives::B256 {
    let mut init_code = Vec::with_capacity(WALLET_CREATION_CODE.len() + 32);
    init_code.extend_from_slice(&WALLET_CREATION_CODE);
    init_code.extend_from_slice(main_module.into_word().as_slice());
    keccak256(init_code)
}

/// CREATE2 address of the wallet whose salt is the config's image hash.
pub fn derive_address(config: &WalletConfig, context: &WalletContext) -> Address {
    context
        .factory
        .create2(config.fingerprint(), wallet_init_code_hash(context.main_module))
}

/// Storage slot holding the module a wallet proxy delegates to.
///
/// The proxy keys it by its own address.
pub fn implementation_slot(wallet: Address) -> U256 {
    U256::from_be_bytes(wallet.into_word().0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SignerInfo;
    use proptest::prelude::*;

    fn context() -> WalletContext {
        WalletContext {
            factory: Address::repeat_byte(0xf0),
            main_module: Address::repeat_byte(0xa1),
            main_module_upgradable: Address::repeat_byte(0xa2),
            guest_module: Address::repeat_byte(0xa3),
            require_utils: Address::repeat_byte(0xa4),
        }
    }

    #[test]
    fn main_module_changes_address() {
        let config = WalletConfig::single_owner(Address::repeat_byte(1));
        let mut other = context();
        other.main_module = Address::repeat_byte(0xb1);
        assert_ne!(
            derive_address(&config, &context()),
            derive_address(&config, &other)
        );
    }

    #[test]
    fn implementation_slot_is_left_padded_address() {
        let wallet = Address::repeat_byte(0x42);
        let slot = implementation_slot(wallet);
        assert_eq!(Address::from_word(slot.into()), wallet);
    }

    #[test]
    fn context_uses_camel_case() {
        let json = serde_json::to_value(context()).unwrap();
        assert!(json.get("mainModuleUpgradable").is_some());
        assert!(json.get("requireUtils").is_some());
    }

    proptest! {
        #[test]
        fn derivation_is_pure(address in any::<[u8; 20]>(), weight in 1u8..u8::MAX, threshold in 1u16..4) {
            let config = WalletConfig::new(threshold, [SignerInfo::new(address.into(), weight)]).unwrap();
            prop_assert_eq!(derive_address(&config, &context()), derive_address(&config, &context()));

            let heavier = WalletConfig::new(threshold, [SignerInfo::new(address.into(), weight + 1)]).unwrap();
            prop_assert_ne!(derive_address(&config, &context()), derive_address(&heavier, &context()));
        }
    }
}
