use alloy_primitives::hex;

/// Creation code of the wallet proxy. The main module address, left padded to
/// 32 bytes, is appended to form the init code used for CREATE2.
pub const WALLET_CREATION_CODE: [u8; 39] =
    hex!("603a600e3d39601d805130553df33d3d363d3d37363d30545af43d82803e903d91601857fd5bf3");

alloy_sol_types::sol! {
    /// Module interface shared by the main and the upgradable wallet modules.
    #[derive(Debug, PartialEq, Eq)]
    interface IWalletModule {
        /// Meta-transaction executed by the wallet
        struct Transaction {
            bool delegateCall;
            bool revertOnError;
            uint256 gasLimit;
            address target;
            uint256 value;
            bytes data;
        }

        /// Execute a batch authorized by the wallet signers
        ///
        /// @param _txs Transactions to execute
        /// @param _nonce Wallet nonce the signature commits to
        /// @param _signature Encoded multi-signer signature
        function execute(Transaction[] calldata _txs, uint256 _nonce, bytes calldata _signature) external;

        /// Execute a batch from the wallet itself, only callable by the wallet
        function selfExecute(Transaction[] calldata _txs) external;

        /// Active configuration image hash (upgradable module only)
        function imageHash() external view returns (bytes32);

        /// Replace the active configuration image hash, only callable by the wallet
        function updateImageHash(bytes32 _imageHash) external;

        /// Point the proxy at a new module, only callable by the wallet
        function updateImplementation(address _implementation) external;

        /// Current wallet nonce
        function nonce() external view returns (uint256);

        /// EIP-1271 signature validation
        function isValidSignature(bytes32 _hash, bytes calldata _signature) external view returns (bytes4);
    }

    /// Deterministic wallet factory
    #[derive(Debug, PartialEq, Eq)]
    interface IWalletFactory {
        /// Deploy a wallet proxy pointing at `_mainModule` with `_salt` (the image hash)
        function deploy(address _mainModule, bytes32 _salt) external payable returns (address _contract);
    }
}
