use crate::{
    amount::AmountError,
    provider::WalletError,
    surface::{
        ActionSurface,
        Severity,
    },
};
use ethers::types::H256;
use thiserror::Error;

/// Every failure an action can end in. None of them tears down the session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ClientError {
    #[error("no wallet provider detected: {0}")]
    WalletUnavailable(String),
    #[error("request rejected in the wallet: {0}")]
    UserRejected(String),
    #[error("no wallet session is connected")]
    NotConnected,
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("chain call failed: {0}")]
    ChainCallFailed(String),
    #[error("network switch rejected: {0}")]
    SwitchRejected(String),
    #[error("adding the network was rejected: {0}")]
    AddRejected(String),
    #[error("a {0} action is already in flight")]
    Busy(ActionSurface),
    #[error(
        "transaction reverted: {}",
        .reason.as_deref().unwrap_or("no reason given")
    )]
    Reverted {
        tx_hash: Option<H256>,
        reason: Option<String>,
    },
    #[error("no confirmation for {tx_hash:#x} within the wait budget")]
    TimedOut { tx_hash: H256 },
    #[error("transaction {tx_hash:#x} confirmed without a decodable outcome event")]
    OutcomeUnknown { tx_hash: H256 },
}

impl ClientError {
    /// Maps a wallet failure raised while performing `context`.
    pub fn from_wallet(err: WalletError, context: &str) -> Self {
        match err {
            WalletError::Unavailable(reason) => ClientError::WalletUnavailable(reason),
            err if err.is_user_rejection() => ClientError::UserRejected(context.to_string()),
            err => ClientError::ChainCallFailed(format!("{context}: {err}")),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            ClientError::WalletUnavailable(_)
            | ClientError::ChainCallFailed(_)
            | ClientError::Reverted { .. } => Severity::Danger,
            ClientError::UserRejected(_)
            | ClientError::NotConnected
            | ClientError::InvalidParams(_)
            | ClientError::SwitchRejected(_)
            | ClientError::AddRejected(_)
            | ClientError::Busy(_)
            | ClientError::TimedOut { .. }
            | ClientError::OutcomeUnknown { .. } => Severity::Warning,
        }
    }

    pub fn tx_hash(&self) -> Option<H256> {
        match self {
            ClientError::Reverted { tx_hash, .. } => *tx_hash,
            ClientError::TimedOut { tx_hash } | ClientError::OutcomeUnknown { tx_hash } => {
                Some(*tx_hash)
            }
            _ => None,
        }
    }
}

impl From<AmountError> for ClientError {
    fn from(err: AmountError) -> Self {
        ClientError::InvalidParams(err.to_string())
    }
}
