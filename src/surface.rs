use crate::error::ClientError;
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
};

/// One user-facing place that submits state-changing transactions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ActionSurface {
    CoinFlip,
    Slots,
    /// Swaps and liquidity share one surface since both spend the same allowance.
    Swap,
}

impl ActionSurface {
    pub const ALL: [ActionSurface; 3] =
        [ActionSurface::CoinFlip, ActionSurface::Slots, ActionSurface::Swap];

    fn index(self) -> usize {
        match self {
            ActionSurface::CoinFlip => 0,
            ActionSurface::Slots => 1,
            ActionSurface::Swap => 2,
        }
    }
}

impl fmt::Display for ActionSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionSurface::CoinFlip => "coin flip",
            ActionSurface::Slots => "slot machine",
            ActionSurface::Swap => "swap",
        };
        write!(f, "{name}")
    }
}

/// One busy flag per surface. Acquiring a busy surface fails instead of queueing.
#[derive(Clone, Debug, Default)]
pub struct SurfaceLocks {
    busy: Arc<[AtomicBool; 3]>,
}

impl SurfaceLocks {
    pub fn try_acquire(&self, surface: ActionSurface) -> Result<SurfaceGuard, ClientError> {
        self.busy[surface.index()]
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ClientError::Busy(surface))?;
        Ok(SurfaceGuard {
            locks: self.clone(),
            surface,
        })
    }

    pub fn is_busy(&self, surface: ActionSurface) -> bool {
        self.busy[surface.index()].load(Ordering::Acquire)
    }
}

/// Held for the whole approve/act sequence; dropping it frees the surface.
#[derive(Debug)]
pub struct SurfaceGuard {
    locks: SurfaceLocks,
    surface: ActionSurface,
}

impl SurfaceGuard {
    pub fn surface(&self) -> ActionSurface {
        self.surface
    }
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        self.locks.busy[self.surface.index()].store(false, Ordering::Release);
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Success,
    Warning,
    Danger,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Danger => "danger",
        };
        write!(f, "{name}")
    }
}

/// What the notification widget is asked to show.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(Severity::Danger, message)
    }

    pub fn from_error(err: &ClientError) -> Self {
        let message = match err {
            ClientError::WalletUnavailable(reason) => {
                format!("No wallet detected ({reason}). Start a wallet bridge or pass --keystore.")
            }
            ClientError::UserRejected(what) => format!("Request declined in the wallet: {what}."),
            ClientError::NotConnected => "Connect a wallet first.".to_string(),
            ClientError::InvalidParams(reason) => format!("Invalid amount: {reason}."),
            ClientError::ChainCallFailed(reason) => format!("Network call failed: {reason}."),
            ClientError::SwitchRejected(reason) => {
                format!("Could not switch to the required network: {reason}.")
            }
            ClientError::AddRejected(reason) => {
                format!("Could not add the required network: {reason}.")
            }
            ClientError::Busy(surface) => {
                format!("A {surface} transaction is still in flight; wait for it to finish.")
            }
            ClientError::Reverted { reason, .. } => match reason {
                Some(reason) => format!("Transaction failed on-chain: {reason}."),
                None => "Transaction failed on-chain.".to_string(),
            },
            ClientError::TimedOut { tx_hash } => format!(
                "Still waiting on {tx_hash:#x}. The outcome is not known yet and your funds \
                 are not necessarily lost; refresh history later."
            ),
            ClientError::OutcomeUnknown { tx_hash } => format!(
                "Transaction {tx_hash:#x} went through and funds moved, but its outcome could \
                 not be read. Refresh history to see the result."
            ),
        };
        Self::new(err.severity(), message)
    }
}
