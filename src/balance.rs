use crate::{
    amount::FixedPointAmount,
    error::ClientError,
    gateway::ContractGateway,
};
use ethers::types::Address;
use std::sync::{
    Mutex,
    MutexGuard,
    atomic::{
        AtomicBool,
        Ordering,
    },
};
use tracing::warn;

/// Last known balances. Either side may be missing if its read failed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Balances {
    pub native: Option<FixedPointAmount>,
    pub token: Option<FixedPointAmount>,
}

#[derive(Default)]
pub struct BalanceTracker {
    latest: Mutex<Balances>,
    stale: AtomicBool,
}

impl BalanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads both balances concurrently; a failed read keeps its previous value.
    pub async fn refresh(&self, gateway: &ContractGateway, account: Address) -> Balances {
        let (native, token) = futures::join!(
            gateway.native_balance(account),
            gateway.token_balance(account)
        );
        let mut latest = self.lock();
        if let Some(native) = keep_ok(native, "native") {
            latest.native = Some(native);
        }
        if let Some(token) = keep_ok(token, "token") {
            latest.token = Some(token);
        }
        self.stale.store(false, Ordering::Release);
        latest.clone()
    }

    /// Marks balances as out of date after a confirmed transaction.
    pub fn invalidate(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn clear(&self) {
        *self.lock() = Balances::default();
    }

    pub fn snapshot(&self) -> Balances {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Balances> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn keep_ok(
    result: Result<FixedPointAmount, ClientError>,
    which: &str,
) -> Option<FixedPointAmount> {
    match result {
        Ok(amount) => Some(amount),
        Err(err) => {
            warn!(error = %err, which, "balance read failed");
            None
        }
    }
}
