use crate::deployment::NetworkDescriptor;
use async_trait::async_trait;
use ethers::types::{
    Address,
    Bytes,
    H256,
    TransactionReceipt,
    TransactionRequest,
    U256,
};
use thiserror::Error;

/// EIP-1193: the user rejected the request.
pub const USER_REJECTED_CODE: i64 = 4001;
/// EIP-3326: the wallet does not know the requested chain and it must be added first.
pub const UNRECOGNIZED_CHAIN_CODE: i64 = 4902;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum WalletError {
    #[error("wallet provider unavailable: {0}")]
    Unavailable(String),
    #[error("wallet rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed wallet response: {0}")]
    Malformed(String),
}

impl WalletError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> Option<i64> {
        match self {
            WalletError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(USER_REJECTED_CODE)
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(UNRECOGNIZED_CHAIN_CODE)
    }

    /// Node-side execution failure reported while the wallet prepared the transaction.
    pub fn is_execution_revert(&self) -> bool {
        match self {
            WalletError::Rpc { code, message } => {
                *code == 3 || message.to_ascii_lowercase().contains("revert")
            }
            _ => false,
        }
    }
}

/// The injected wallet: account access, network management, reads and signing.
///
/// Every method is one round trip to the wallet and may fail with a
/// provider-defined code. Implementations must not cache chain state.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts`; may prompt the user.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// `eth_accounts`; never prompts, lists accounts already authorized.
    async fn accounts(&self) -> Result<Vec<Address>, WalletError>;

    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// `wallet_switchEthereumChain` with a `0x`-prefixed chain id.
    async fn switch_network(&self, chain_id_hex: &str) -> Result<(), WalletError>;

    /// `wallet_addEthereumChain`.
    async fn add_network(&self, network: &NetworkDescriptor) -> Result<(), WalletError>;

    async fn balance(&self, account: Address) -> Result<U256, WalletError>;

    /// `eth_call` against the latest block.
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, WalletError>;

    /// `eth_sendTransaction`; the wallet signs and broadcasts.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, WalletError>;

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError>;
}
