use alloy_primitives::Bytes;
use alloy_sol_types::SolValue;

pub use IRequireUtils::{Member, RequiredConfig};

alloy_sol_types::sol! {
    /// Configuration registry. Records every configuration a wallet adopts so
    /// that other networks can recover it from the image hash alone.
    #[derive(Debug, PartialEq, Eq)]
    interface IRequireUtils {
        /// Signer entry as published in `RequiredConfig`
        struct Member {
            uint256 weight;
            address signer;
        }

        /// Publish a configuration for `_wallet`
        ///
        /// @param _wallet The wallet adopting the configuration
        /// @param _threshold Signature weight threshold
        /// @param _members Signers with their weights
        function publishConfig(address _wallet, uint256 _threshold, Member[] calldata _members) external;

        /// Emitted once per published configuration; `_signers` is `abi.encode(Member[])`
        event RequiredConfig(
            address indexed _wallet,
            bytes32 indexed _imageHash,
            uint256 _threshold,
            bytes _signers
        );
    }
}

/// Encodes signer members the way `RequiredConfig._signers` carries them.
pub fn encode_members(members: &[Member]) -> Bytes {
    (members.to_vec(),).abi_encode_params().into()
}

/// Decodes the `_signers` payload of a `RequiredConfig` event.
pub fn decode_members(data: &[u8]) -> alloy_sol_types::Result<Vec<Member>> {
    <(Vec<Member>,)>::abi_decode_params(data).map(|(members,)| members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};

    #[test]
    fn members_payload_decodes() {
        let members = vec![
            Member {
                weight: U256::from(1),
                signer: Address::random(),
            },
            Member {
                weight: U256::from(3),
                signer: Address::random(),
            },
        ];

        let encoded = encode_members(&members);
        assert_eq!(decode_members(&encoded).unwrap(), members);
    }

    #[test]
    fn garbage_payload_is_rejected() {
        assert!(decode_members(&[0xde, 0xad]).is_err());
    }
}
