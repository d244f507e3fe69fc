//! Methods answered by the signer rather than a chain node.

use std::{fmt, str::FromStr};

/// A JSON-RPC method the signer answers itself.
///
/// The method names are the wire contract between dapps and the wallet and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerMethod {
    PersonalSign,
    EthSign,
    EthSignTypedData,
    EthSignTypedDataV4,
    EthSignTransaction,
    EthSendTransaction,
    EthSendRawTransaction,
    GetWalletContext,
    GetWalletConfig,
    GetWalletState,
    GetNetworks,
    UpdateConfig,
    PublishConfig,
    EstimateGasLimits,
    GasRefundOptions,
    GetNonce,
    Relay,
}

impl SignerMethod {
    pub const ALL: [Self; 17] = [
        Self::PersonalSign,
        Self::EthSign,
        Self::EthSignTypedData,
        Self::EthSignTypedDataV4,
        Self::EthSignTransaction,
        Self::EthSendTransaction,
        Self::EthSendRawTransaction,
        Self::GetWalletContext,
        Self::GetWalletConfig,
        Self::GetWalletState,
        Self::GetNetworks,
        Self::UpdateConfig,
        Self::PublishConfig,
        Self::EstimateGasLimits,
        Self::GasRefundOptions,
        Self::GetNonce,
        Self::Relay,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalSign => "personal_sign",
            Self::EthSign => "eth_sign",
            Self::EthSignTypedData => "eth_signTypedData",
            Self::EthSignTypedDataV4 => "eth_signTypedData_v4",
            Self::EthSignTransaction => "eth_signTransaction",
            Self::EthSendTransaction => "eth_sendTransaction",
            Self::EthSendRawTransaction => "eth_sendRawTransaction",
            Self::GetWalletContext => "sequence_getWalletContext",
            Self::GetWalletConfig => "sequence_getWalletConfig",
            Self::GetWalletState => "sequence_getWalletState",
            Self::GetNetworks => "sequence_getNetworks",
            Self::UpdateConfig => "sequence_updateConfig",
            Self::PublishConfig => "sequence_publishConfig",
            Self::EstimateGasLimits => "sequence_estimateGasLimits",
            Self::GasRefundOptions => "sequence_gasRefundOptions",
            Self::GetNonce => "sequence_getNonce",
            Self::Relay => "sequence_relay",
        }
    }

    /// Whether only a multi-network account can serve this method.
    pub const fn requires_account(&self) -> bool {
        !matches!(self, Self::PersonalSign | Self::EthSign)
    }
}

impl fmt::Display for SignerMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignerMethod {
    type Err = ();

    fn from_str(method: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == method)
            .ok_or(())
    }
}

/// Whether `method` is answered by the signer.
pub fn is_signer_method(method: &str) -> bool {
    method.parse::<SignerMethod>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for method in SignerMethod::ALL {
            assert_eq!(method.as_str().parse::<SignerMethod>(), Ok(method));
        }
    }

    #[test]
    fn chain_methods_are_not_signer_methods() {
        assert!(is_signer_method("sequence_getWalletState"));
        assert!(is_signer_method("personal_sign"));
        assert!(!is_signer_method("eth_getBalance"));
        assert!(!is_signer_method("eth_chainId"));
        assert!(!is_signer_method("PERSONAL_SIGN"));
    }
}
