use crate::{
    amount::FixedPointAmount,
    balance::{
        BalanceTracker,
        Balances,
    },
    deployment::Deployment,
    error::ClientError,
    executor::{
        CancelToken,
        EventOutcome,
        PendingTransaction,
        TransactionExecutor,
        WaitBudget,
    },
    gateway::{
        Action,
        ActionRequest,
        Constraints,
        ContractGateway,
        GameKind,
        SwapDirection,
    },
    history::{
        GameHistoryCache,
        GameRecord,
    },
    network::{
        NetworkCheck,
        NetworkGuard,
    },
    provider::WalletProvider,
    session::{
        ChainSession,
        Session,
        Signer,
    },
    store::SessionStore,
    surface::{
        ActionSurface,
        Notification,
        SurfaceGuard,
        SurfaceLocks,
    },
};
use ethers::types::{
    Address,
    H256,
};
use std::sync::{
    Arc,
    Mutex,
    MutexGuard,
};
use tracing::{
    error,
    info,
    warn,
};

impl ActionRequest {
    pub fn surface(&self) -> ActionSurface {
        match self {
            ActionRequest::Play { .. } => ActionSurface::CoinFlip,
            ActionRequest::Spin { .. } => ActionSurface::Slots,
            ActionRequest::Swap { .. } | ActionRequest::AddLiquidity { .. } => ActionSurface::Swap,
        }
    }
}

/// Result of a confirmed coin flip or spin, as the contract reported it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlayReport {
    pub game: GameKind,
    pub tx_hash: H256,
    pub bet: FixedPointAmount,
    pub won: bool,
    /// Prize on a win, the lost bet otherwise.
    pub amount: FixedPointAmount,
    pub symbol: String,
    pub contract_message: String,
    /// The entry read back from the contract, if that read succeeded.
    pub record: Option<GameRecord>,
}

impl PlayReport {
    pub fn notification(&self) -> Notification {
        if self.won {
            Notification::success(format!("You won {} {}!", self.amount, self.symbol))
        } else {
            Notification::danger(format!("You lost {} {}.", self.amount, self.symbol))
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SwapReport {
    Swapped {
        tx_hash: H256,
        direction: SwapDirection,
        amount_in: FixedPointAmount,
        amount_out: FixedPointAmount,
    },
    LiquidityAdded {
        tx_hash: H256,
        token_amount: FixedPointAmount,
        native_amount: FixedPointAmount,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionReport {
    Play(PlayReport),
    Swap(SwapReport),
}

impl ActionReport {
    pub fn tx_hash(&self) -> H256 {
        match self {
            ActionReport::Play(report) => report.tx_hash,
            ActionReport::Swap(SwapReport::Swapped { tx_hash, .. })
            | ActionReport::Swap(SwapReport::LiquidityAdded { tx_hash, .. }) => *tx_hash,
        }
    }

    pub fn notification(&self, native_symbol: &str, token_symbol: &str) -> Notification {
        match self {
            ActionReport::Play(report) => report.notification(),
            ActionReport::Swap(SwapReport::Swapped {
                direction,
                amount_in,
                amount_out,
                ..
            }) => {
                let (from, to) = match direction {
                    SwapDirection::RangerToMintMe => (token_symbol, native_symbol),
                    SwapDirection::MintMeToRanger => (native_symbol, token_symbol),
                };
                Notification::success(format!(
                    "Swapped {amount_in} {from} for {amount_out} {to}."
                ))
            }
            ActionReport::Swap(SwapReport::LiquidityAdded {
                token_amount,
                native_amount,
                ..
            }) => Notification::success(format!(
                "Added {token_amount} {token_symbol} and {native_amount} {native_symbol} of liquidity."
            )),
        }
    }
}

/// The wallet client core: one session, one network, the three action surfaces.
pub struct Arcade {
    session: Arc<ChainSession>,
    guard: NetworkGuard,
    gateway: ContractGateway,
    coin_flip_history: GameHistoryCache,
    slots_history: GameHistoryCache,
    balances: BalanceTracker,
    locks: SurfaceLocks,
    constraints: Mutex<Option<Constraints>>,
    budget: WaitBudget,
}

impl Arcade {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        deployment: Deployment,
        store: Option<SessionStore>,
        budget: WaitBudget,
    ) -> Self {
        let session = Arc::new(ChainSession::new(Arc::clone(&wallet), store));
        let executor = Arc::new(TransactionExecutor::new(Arc::clone(&wallet), deployment.gas));
        Self {
            guard: NetworkGuard::new(Arc::clone(&session)),
            gateway: ContractGateway::new(wallet, executor, deployment),
            session,
            coin_flip_history: GameHistoryCache::new(GameKind::CoinFlip),
            slots_history: GameHistoryCache::new(GameKind::Slots),
            balances: BalanceTracker::new(),
            locks: SurfaceLocks::default(),
            constraints: Mutex::new(None),
            budget,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        self.gateway.deployment()
    }

    pub fn gateway(&self) -> &ContractGateway {
        &self.gateway
    }

    pub fn session(&self) -> Option<Session> {
        self.session.current()
    }

    pub fn chain_session(&self) -> &ChainSession {
        &self.session
    }

    pub async fn connect(&self) -> Result<Session, ClientError> {
        let session = self.session.connect().await?;
        self.reset_session_state();
        self.sync().await?;
        Ok(session)
    }

    pub async fn restore(&self) -> Result<Option<Session>, ClientError> {
        let Some(session) = self.session.restore().await? else {
            return Ok(None);
        };
        self.reset_session_state();
        self.sync().await?;
        Ok(Some(session))
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
        self.reset_session_state();
    }

    pub fn on_external_account_change(&self, account: Option<Address>) -> Option<Session> {
        let before = self.session.account();
        let session = self.session.on_external_account_change(account);
        if session.as_ref().map(|s| s.account) != before {
            self.reset_session_state();
        }
        session
    }

    pub fn on_external_network_change(&self, chain_id: u64) {
        self.session.on_external_network_change(chain_id);
        self.balances.invalidate();
    }

    /// Enforces the required network, then refreshes balances.
    pub async fn ensure_network(&self) -> Result<NetworkCheck, ClientError> {
        let check = self.guard.ensure_network(&self.deployment().network).await?;
        if check != NetworkCheck::AlreadyActive {
            self.refresh_balances().await;
        }
        Ok(check)
    }

    /// Post-connect refresh: network, bet constraints, both histories, balances.
    pub async fn sync(&self) -> Result<(), ClientError> {
        self.ensure_network().await?;
        self.constraints().await?;
        self.check_token_decimals().await;
        let (coin_flip, slots) = futures::join!(
            self.coin_flip_history.refresh_full(&self.gateway),
            self.slots_history.refresh_full(&self.gateway)
        );
        for (game, result) in [(GameKind::CoinFlip, coin_flip), (GameKind::Slots, slots)] {
            if let Err(err) = result {
                warn!(error = %err, %game, "history refresh failed");
            }
        }
        self.refresh_balances().await;
        Ok(())
    }

    /// Bet constraints, read from the contracts once per session.
    pub async fn constraints(&self) -> Result<Constraints, ClientError> {
        if let Some(constraints) = self.lock_constraints().clone() {
            return Ok(constraints);
        }
        let constraints = self.gateway.constraints().await?;
        *self.lock_constraints() = Some(constraints.clone());
        Ok(constraints)
    }

    pub fn cached_constraints(&self) -> Option<Constraints> {
        self.lock_constraints().clone()
    }

    pub async fn refresh_history(&self, game: GameKind) -> Result<Vec<GameRecord>, ClientError> {
        self.history_cache(game).refresh_full(&self.gateway).await
    }

    pub fn history(&self, game: GameKind) -> Vec<GameRecord> {
        self.history_cache(game).snapshot()
    }

    pub async fn refresh_balances(&self) -> Balances {
        match self.session.account() {
            Some(account) => self.balances.refresh(&self.gateway, account).await,
            None => self.balances.snapshot(),
        }
    }

    pub fn balances(&self) -> Balances {
        self.balances.snapshot()
    }

    pub fn is_busy(&self, surface: ActionSurface) -> bool {
        self.locks.is_busy(surface)
    }

    pub fn ledger(&self) -> Vec<PendingTransaction> {
        self.gateway.executor().ledger()
    }

    /// Marks `surface` busy for a caller that will run the action elsewhere.
    pub fn try_acquire(&self, surface: ActionSurface) -> Result<SurfaceGuard, ClientError> {
        self.locks.try_acquire(surface)
    }

    /// Runs one user action end to end. The surface stays busy until it settles.
    pub async fn perform(
        &self,
        request: ActionRequest,
        cancel: &CancelToken,
    ) -> Result<ActionReport, ClientError> {
        self.session.signer()?;
        let guard = self.locks.try_acquire(request.surface())?;
        self.perform_held(guard, request, cancel).await
    }

    /// Like `perform`, with the surface already acquired through `try_acquire`.
    pub async fn perform_held(
        &self,
        guard: SurfaceGuard,
        request: ActionRequest,
        cancel: &CancelToken,
    ) -> Result<ActionReport, ClientError> {
        if guard.surface() != request.surface() {
            return Err(ClientError::InvalidParams(format!(
                "{} request submitted on the {} surface",
                request.surface(),
                guard.surface()
            )));
        }
        let signer = self.session.signer()?;
        let action = self.gateway.parse(&request)?;
        if let Some(constraints) = self.cached_constraints() {
            self.gateway.validate(&action, &constraints)?;
        }
        // Constraints are only ever read on the required network.
        self.ensure_network().await?;
        let constraints = self.constraints().await?;
        self.gateway.validate(&action, &constraints)?;

        let result = self.gateway.perform(&signer, &action, self.budget, cancel).await;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(error = %err, surface = %request.surface(), "action failed");
                if err.tx_hash().is_some() {
                    self.balances.invalidate();
                    self.refresh_balances().await;
                }
                return Err(err);
            }
        };

        let tx_hash = outcome.confirmation.tx_hash;
        let block_number = outcome.confirmation.block_number;
        let report = match (&action, outcome.confirmation.outcome) {
            (
                Action::Play { bet } | Action::Spin { bet },
                EventOutcome::Game {
                    message,
                    amount,
                    won,
                    ..
                },
            ) => {
                let game = if matches!(action, Action::Spin { .. }) {
                    GameKind::Slots
                } else {
                    GameKind::CoinFlip
                };
                let record = self
                    .record_latest(game, &signer, block_number)
                    .await;
                ActionReport::Play(PlayReport {
                    game,
                    tx_hash,
                    bet: *bet,
                    won,
                    amount: FixedPointAmount::new(amount, bet.decimals()),
                    symbol: self.symbol_for(game),
                    contract_message: message,
                    record,
                })
            }
            (
                Action::Swap { direction, amount },
                EventOutcome::Swapped { amount_out, .. },
            ) => {
                let out_decimals = match direction {
                    SwapDirection::RangerToMintMe => self.deployment().network.native_currency.decimals,
                    SwapDirection::MintMeToRanger => self.deployment().token.decimals,
                };
                ActionReport::Swap(SwapReport::Swapped {
                    tx_hash,
                    direction: *direction,
                    amount_in: *amount,
                    amount_out: FixedPointAmount::new(amount_out, out_decimals),
                })
            }
            (
                Action::AddLiquidity {
                    token_amount,
                    native_amount,
                },
                EventOutcome::LiquidityAdded { .. },
            ) => ActionReport::Swap(SwapReport::LiquidityAdded {
                tx_hash,
                token_amount: *token_amount,
                native_amount: *native_amount,
            }),
            (action, outcome) => {
                return Err(ClientError::ChainCallFailed(format!(
                    "unexpected {outcome:?} for {action:?}"
                )));
            }
        };
        info!(tx_hash = %format!("{tx_hash:#x}"), surface = %request.surface(), "action settled");

        self.balances.invalidate();
        self.refresh_balances().await;
        Ok(report)
    }

    pub async fn play_coin_flip(
        &self,
        amount: &str,
        cancel: &CancelToken,
    ) -> Result<PlayReport, ClientError> {
        let request = ActionRequest::Play {
            amount: amount.to_string(),
        };
        match self.perform(request, cancel).await? {
            ActionReport::Play(report) => Ok(report),
            other => Err(unexpected_report(other)),
        }
    }

    pub async fn spin(&self, amount: &str, cancel: &CancelToken) -> Result<PlayReport, ClientError> {
        let request = ActionRequest::Spin {
            amount: amount.to_string(),
        };
        match self.perform(request, cancel).await? {
            ActionReport::Play(report) => Ok(report),
            other => Err(unexpected_report(other)),
        }
    }

    pub async fn swap(
        &self,
        direction: SwapDirection,
        amount: &str,
        cancel: &CancelToken,
    ) -> Result<SwapReport, ClientError> {
        let request = ActionRequest::Swap {
            direction,
            amount: amount.to_string(),
        };
        match self.perform(request, cancel).await? {
            ActionReport::Swap(report) => Ok(report),
            other => Err(unexpected_report(other)),
        }
    }

    pub async fn add_liquidity(
        &self,
        token_amount: &str,
        native_amount: &str,
        cancel: &CancelToken,
    ) -> Result<SwapReport, ClientError> {
        let request = ActionRequest::AddLiquidity {
            token_amount: token_amount.to_string(),
            native_amount: native_amount.to_string(),
        };
        match self.perform(request, cancel).await? {
            ActionReport::Swap(report) => Ok(report),
            other => Err(unexpected_report(other)),
        }
    }

    /// Reads the just-played entry back from the contract and prepends it.
    /// When the newest entry belongs to someone else, the history is reloaded
    /// and the signer's entry is looked up there instead.
    async fn record_latest(
        &self,
        game: GameKind,
        signer: &Signer,
        block_number: Option<u64>,
    ) -> Option<GameRecord> {
        let is_ours = |record: &GameRecord| {
            record.player == signer.account()
                && block_number.is_none_or(|block| record.block_number == block)
        };
        let read = async {
            let count = self.gateway.game_count(game).await?;
            let index = count.checked_sub(1).ok_or_else(|| {
                ClientError::ChainCallFailed(format!("{game} reports no games after a play"))
            })?;
            self.gateway.game_entry(game, index).await
        };
        let latest = match read.await {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, %game, "could not read back the new game entry");
                return None;
            }
        };
        if !self.session.is_current(signer) {
            return is_ours(&latest).then_some(latest);
        }
        if is_ours(&latest) {
            self.history_cache(game).prepend_one(latest.clone());
            return Some(latest);
        }

        warn!(player = ?latest.player, block = latest.block_number, %game, "newest entry is another play, reloading history");
        match self.history_cache(game).refresh_full(&self.gateway).await {
            Ok(records) => records.into_iter().find(is_ours),
            Err(err) => {
                warn!(error = %err, %game, "history reload failed");
                None
            }
        }
    }

    async fn check_token_decimals(&self) {
        let configured = self.deployment().token.decimals;
        match self.gateway.token_decimals().await {
            Ok(onchain) if onchain == configured.get() => {}
            Ok(onchain) => warn!(onchain, configured = configured.get(), "token decimals differ from configuration"),
            Err(err) => warn!(error = %err, "could not read token decimals"),
        }
    }

    fn symbol_for(&self, game: GameKind) -> String {
        match game {
            GameKind::CoinFlip => self.deployment().network.native_currency.symbol.clone(),
            GameKind::Slots => self.deployment().token.symbol.clone(),
        }
    }

    fn history_cache(&self, game: GameKind) -> &GameHistoryCache {
        match game {
            GameKind::CoinFlip => &self.coin_flip_history,
            GameKind::Slots => &self.slots_history,
        }
    }

    fn reset_session_state(&self) {
        *self.lock_constraints() = None;
        self.balances.clear();
    }

    fn lock_constraints(&self) -> MutexGuard<'_, Option<Constraints>> {
        self.constraints.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn unexpected_report(report: ActionReport) -> ClientError {
    ClientError::ChainCallFailed(format!("unexpected report {report:?}"))
}
