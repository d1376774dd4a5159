use crate::{
    coin_flip_types::CoinFlippedFilter,
    deployment::GasCeilings,
    erc20_types::ApprovalFilter,
    error::ClientError,
    provider::{
        WalletError,
        WalletProvider,
    },
    session::Signer,
    slots_types::SpinFilter,
    swap_types::{
        LiquidityAddedFilter,
        SwappedFilter,
    },
};
use chrono::{
    DateTime,
    Utc,
};
use ethers::{
    abi::RawLog,
    contract::EthEvent,
    types::{
        Address,
        Bytes,
        H256,
        Log,
        TransactionReceipt,
        TransactionRequest,
        U64,
        U256,
    },
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::sync::Notify;
use tracing::{
    error,
    info,
    warn,
};

pub const LEDGER_CAPACITY: usize = 50;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_WAIT: Duration = Duration::from_secs(120);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TxKind {
    Play,
    Spin,
    Approve,
    Swap,
    AddLiquidity,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TxStatus {
    Pending,
    Confirmed,
    Reverted,
    /// The wait ended before a receipt; the chain may still include it.
    Unknown,
}

impl TxStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingTransaction {
    pub kind: TxKind,
    pub submitted_at: DateTime<Utc>,
    pub hash: H256,
    pub status: TxStatus,
}

impl GasCeilings {
    pub fn for_kind(&self, kind: TxKind) -> u64 {
        match kind {
            TxKind::Play => self.play,
            TxKind::Spin => self.spin,
            TxKind::Approve => self.approve,
            TxKind::Swap => self.swap,
            TxKind::AddLiquidity => self.add_liquidity,
        }
    }
}

/// The one event a transaction of a given call is expected to emit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExpectedEvent {
    CoinFlipped,
    Spin,
    Approval,
    Swapped,
    LiquidityAdded,
}

impl ExpectedEvent {
    pub fn signature(self) -> H256 {
        match self {
            ExpectedEvent::CoinFlipped => CoinFlippedFilter::signature(),
            ExpectedEvent::Spin => SpinFilter::signature(),
            ExpectedEvent::Approval => ApprovalFilter::signature(),
            ExpectedEvent::Swapped => SwappedFilter::signature(),
            ExpectedEvent::LiquidityAdded => LiquidityAddedFilter::signature(),
        }
    }

    fn decode(self, log: &Log) -> Result<EventOutcome, ethers::abi::Error> {
        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };
        let outcome = match self {
            ExpectedEvent::CoinFlipped => {
                let event = CoinFlippedFilter::decode_log(&raw)?;
                EventOutcome::Game {
                    message: event.message,
                    player: event.user,
                    amount: event.amount,
                    won: event.winner,
                }
            }
            ExpectedEvent::Spin => {
                let event = SpinFilter::decode_log(&raw)?;
                EventOutcome::Game {
                    message: event.message,
                    player: event.user,
                    amount: event.amount,
                    won: event.winner,
                }
            }
            ExpectedEvent::Approval => {
                let event = ApprovalFilter::decode_log(&raw)?;
                EventOutcome::Approval {
                    owner: event.owner,
                    spender: event.spender,
                    value: event.value,
                }
            }
            ExpectedEvent::Swapped => {
                let event = SwappedFilter::decode_log(&raw)?;
                EventOutcome::Swapped {
                    user: event.user,
                    amount_in: event.amount_in,
                    amount_out: event.amount_out,
                }
            }
            ExpectedEvent::LiquidityAdded => {
                let event = LiquidityAddedFilter::decode_log(&raw)?;
                EventOutcome::LiquidityAdded {
                    provider: event.provider,
                    token_amount: event.token_amount,
                    native_amount: event.native_amount,
                }
            }
        };
        Ok(outcome)
    }
}

/// Structured fields pulled out of the decoded outcome event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EventOutcome {
    /// `amount` is the prize on a win and the lost bet otherwise.
    Game {
        message: String,
        player: Address,
        amount: U256,
        won: bool,
    },
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
    Swapped {
        user: Address,
        amount_in: U256,
        amount_out: U256,
    },
    LiquidityAdded {
        provider: Address,
        token_amount: U256,
        native_amount: U256,
    },
}

/// A fully encoded call, ready to hand to the wallet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreparedCall {
    pub kind: TxKind,
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub expected: ExpectedEvent,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Confirmation {
    pub tx_hash: H256,
    pub block_number: Option<u64>,
    pub outcome: EventOutcome,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitBudget {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitBudget {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

impl Default for WaitBudget {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT)
    }
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Stops a caller from waiting on a receipt. The transaction itself is unaffected.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<CancelState>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel` has been called, immediately if it already was.
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

pub struct TransactionExecutor {
    wallet: Arc<dyn WalletProvider>,
    gas: GasCeilings,
    ledger: Mutex<VecDeque<PendingTransaction>>,
}

impl TransactionExecutor {
    pub fn new(wallet: Arc<dyn WalletProvider>, gas: GasCeilings) -> Self {
        Self {
            wallet,
            gas,
            ledger: Mutex::new(VecDeque::with_capacity(LEDGER_CAPACITY)),
        }
    }

    /// Submits `call` under `signer` and drives it to a terminal state.
    pub async fn execute(
        &self,
        signer: &Signer,
        call: PreparedCall,
        budget: WaitBudget,
        cancel: &CancelToken,
    ) -> Result<Confirmation, ClientError> {
        let gas = self.gas.for_kind(call.kind);
        let request = TransactionRequest::new()
            .from(signer.account())
            .to(call.to)
            .data(call.data.clone())
            .value(call.value)
            .gas(gas);

        let tx_hash = self
            .wallet
            .send_transaction(request)
            .await
            .map_err(|err| submit_error(err, call.kind))?;
        self.record(call.kind, tx_hash);
        info!(tx_hash = %format!("{tx_hash:#x}"), kind = ?call.kind, gas, "transaction submitted");

        let receipt = match self.wait_for_receipt(tx_hash, budget, cancel).await {
            Some(receipt) => receipt,
            None => {
                self.settle(tx_hash, TxStatus::Unknown);
                warn!(tx_hash = %format!("{tx_hash:#x}"), kind = ?call.kind, "no receipt within wait budget");
                return Err(ClientError::TimedOut { tx_hash });
            }
        };

        if receipt.status == Some(U64::zero()) {
            self.settle(tx_hash, TxStatus::Reverted);
            error!(tx_hash = %format!("{tx_hash:#x}"), kind = ?call.kind, "transaction reverted");
            return Err(ClientError::Reverted {
                tx_hash: Some(tx_hash),
                reason: None,
            });
        }
        self.settle(tx_hash, TxStatus::Confirmed);
        let block_number = receipt.block_number.map(|n| n.as_u64());

        let signature = call.expected.signature();
        let Some(log) = receipt
            .logs
            .iter()
            .find(|log| log.address == call.to && log.topics.first() == Some(&signature))
        else {
            warn!(tx_hash = %format!("{tx_hash:#x}"), expected = ?call.expected, "confirmed without outcome event");
            return Err(ClientError::OutcomeUnknown { tx_hash });
        };
        let outcome = call.expected.decode(log).map_err(|err| {
            ClientError::ChainCallFailed(format!(
                "decode {:?} event of {tx_hash:#x}: {err}",
                call.expected
            ))
        })?;
        info!(tx_hash = %format!("{tx_hash:#x}"), kind = ?call.kind, "transaction confirmed");
        Ok(Confirmation {
            tx_hash,
            block_number,
            outcome,
        })
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: H256,
        budget: WaitBudget,
        cancel: &CancelToken,
    ) -> Option<TransactionReceipt> {
        let poll = async {
            loop {
                match self.wallet.transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => return Some(receipt),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(?err, tx_hash = %format!("{tx_hash:#x}"), "receipt poll failed")
                    }
                }
                tokio::time::sleep(budget.poll_interval).await;
            }
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(tx_hash = %format!("{tx_hash:#x}"), "receipt wait cancelled");
                None
            }
            receipt = tokio::time::timeout(budget.timeout, poll) => receipt.ok().flatten(),
        }
    }

    /// Recent transactions, oldest first.
    pub fn ledger(&self) -> Vec<PendingTransaction> {
        self.lock().iter().cloned().collect()
    }

    pub fn status(&self, tx_hash: H256) -> Option<TxStatus> {
        self.lock()
            .iter()
            .find(|tx| tx.hash == tx_hash)
            .map(|tx| tx.status)
    }

    fn record(&self, kind: TxKind, hash: H256) {
        let mut ledger = self.lock();
        if ledger.len() == LEDGER_CAPACITY {
            ledger.pop_front();
        }
        ledger.push_back(PendingTransaction {
            kind,
            submitted_at: Utc::now(),
            hash,
            status: TxStatus::Pending,
        });
    }

    fn settle(&self, hash: H256, status: TxStatus) {
        let mut ledger = self.lock();
        if let Some(tx) = ledger
            .iter_mut()
            .find(|tx| tx.hash == hash && !tx.status.is_terminal())
        {
            tx.status = status;
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<PendingTransaction>> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn submit_error(err: WalletError, kind: TxKind) -> ClientError {
    if err.is_execution_revert() {
        let reason = match &err {
            WalletError::Rpc { message, .. } => Some(message.clone()),
            _ => None,
        };
        return ClientError::Reverted {
            tx_hash: None,
            reason,
        };
    }
    ClientError::from_wallet(err, &format!("submit {kind:?}"))
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        coin_flip_types::PlayCall,
        deployment::Deployment,
        session::ChainSession,
        test_helpers::{
            MockWallet,
            TxScript,
        },
    };
    use ethers::abi::AbiEncode;

    fn fast_budget() -> WaitBudget {
        WaitBudget::new(Duration::from_millis(100)).with_poll_interval(Duration::from_millis(5))
    }

    async fn setup() -> (Arc<MockWallet>, TransactionExecutor, Signer, PreparedCall) {
        let wallet = Arc::new(MockWallet::default());
        let session = ChainSession::new(wallet.clone(), None);
        session.connect().await.unwrap();
        let executor = TransactionExecutor::new(wallet.clone(), GasCeilings::default());
        let call = PreparedCall {
            kind: TxKind::Play,
            to: Deployment::mintme().coin_flip.address,
            data: PlayCall.encode().into(),
            value: U256::exp10(18),
            expected: ExpectedEvent::CoinFlipped,
        };
        (wallet, executor, session.signer().unwrap(), call)
    }

    #[tokio::test]
    async fn execute__decodes_outcome_event_and_applies_gas_ceiling() {
        // given
        let (wallet, executor, signer, call) = setup().await;
        wallet.queue_coin_flip(true, U256::from(2u64) * U256::exp10(18));

        // when
        let confirmation = executor
            .execute(&signer, call, fast_budget(), &CancelToken::default())
            .await
            .unwrap();

        // then
        assert!(matches!(
            confirmation.outcome,
            EventOutcome::Game { won: true, amount, .. } if amount == U256::from(2u64) * U256::exp10(18)
        ));
        assert_eq!(wallet.last_sent_gas(), Some(U256::from(300_000u64)));
        assert_eq!(
            executor.status(confirmation.tx_hash),
            Some(TxStatus::Confirmed)
        );
    }

    #[tokio::test]
    async fn execute__reports_reverted_receipt() {
        let (wallet, executor, signer, call) = setup().await;
        wallet.script_next(TxScript::Revert);

        let err = executor
            .execute(&signer, call, fast_budget(), &CancelToken::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Reverted { tx_hash: Some(_), .. }));
        assert_eq!(executor.ledger()[0].status, TxStatus::Reverted);
    }

    #[tokio::test]
    async fn execute__times_out_distinctly_from_revert() {
        // given
        let (wallet, executor, signer, call) = setup().await;
        wallet.script_next(TxScript::NeverConfirm);

        // when
        let err = executor
            .execute(&signer, call, fast_budget(), &CancelToken::default())
            .await
            .unwrap_err();

        // then
        let ClientError::TimedOut { tx_hash } = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert_eq!(executor.status(tx_hash), Some(TxStatus::Unknown));
    }

    #[tokio::test]
    async fn execute__cancel_stops_waiting_without_revert() {
        let (wallet, executor, signer, call) = setup().await;
        wallet.script_next(TxScript::NeverConfirm);
        let cancel = CancelToken::default();
        cancel.cancel();

        let err = executor
            .execute(&signer, call, WaitBudget::default(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::TimedOut { .. }));
    }

    #[tokio::test]
    async fn execute__cancel_interrupts_a_long_poll_interval() {
        // given
        let (wallet, executor, signer, call) = setup().await;
        wallet.script_next(TxScript::NeverConfirm);
        let cancel = CancelToken::default();
        let budget =
            WaitBudget::new(Duration::from_secs(600)).with_poll_interval(Duration::from_secs(300));

        // when
        let canceller = {
            let cancel = cancel.clone();
            let wallet = wallet.clone();
            async move {
                while wallet.send_count() == 0 {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            }
        };
        let (result, ()) = tokio::time::timeout(
            Duration::from_secs(5),
            async { tokio::join!(executor.execute(&signer, call, budget, &cancel), canceller) },
        )
        .await
        .unwrap();

        // then
        assert!(matches!(result, Err(ClientError::TimedOut { .. })));
    }

    #[tokio::test]
    async fn execute__confirmed_without_event_is_outcome_unknown() {
        let (wallet, executor, signer, call) = setup().await;
        wallet.script_next(TxScript::NoLogs);

        let err = executor
            .execute(&signer, call, fast_budget(), &CancelToken::default())
            .await
            .unwrap_err();

        let ClientError::OutcomeUnknown { tx_hash } = err else {
            panic!("expected unknown outcome, got {err:?}");
        };
        assert_eq!(executor.status(tx_hash), Some(TxStatus::Confirmed));
    }

    #[tokio::test]
    async fn execute__node_side_revert_on_submit_has_no_hash() {
        let (wallet, executor, signer, call) = setup().await;
        wallet.script_next(TxScript::RejectSend(WalletError::rpc(
            3,
            "execution reverted: bet too high",
        )));

        let err = executor
            .execute(&signer, call, fast_budget(), &CancelToken::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::Reverted {
                tx_hash: None,
                reason: Some("execution reverted: bet too high".into())
            }
        );
        assert!(executor.ledger().is_empty());
    }

    #[tokio::test]
    async fn ledger__keeps_only_most_recent_transactions() {
        let (wallet, executor, signer, call) = setup().await;
        for _ in 0..LEDGER_CAPACITY + 3 {
            wallet.queue_coin_flip(false, U256::zero());
            executor
                .execute(&signer, call.clone(), fast_budget(), &CancelToken::default())
                .await
                .unwrap();
        }

        let ledger = executor.ledger();

        assert_eq!(ledger.len(), LEDGER_CAPACITY);
        assert!(ledger.iter().all(|tx| tx.status == TxStatus::Confirmed));
    }
}
