use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use ethers::types::Address;
use ranger_arcade::{
    arcade::{
        ActionReport,
        Arcade,
        PlayReport,
    },
    balance::Balances,
    bridge::Eip1193Bridge,
    deployment::Deployment,
    error::ClientError,
    executor::{
        CancelToken,
        PendingTransaction,
        WaitBudget,
    },
    gateway::{
        ActionRequest,
        Constraints,
        GameKind,
    },
    history::GameRecord,
    keystore::{
        KeystoreWallet,
        find_keystore,
        resolve_keystore_dir,
        unlock_keystore,
    },
    provider::WalletProvider,
    store::SessionStore,
    surface::{
        ActionSurface,
        Notification,
    },
};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    error,
    info,
};

const MAX_ERRORS: usize = 50;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WalletConfig {
    /// EIP-1193 requests forwarded to a wallet bridge over HTTP.
    Bridge { url: String },
    /// A local keystore file, unlocked with a password prompt.
    Keystore { name: String, dir: Option<String> },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub wallet: WalletConfig,
    pub deployment: Deployment,
    pub state_dir: PathBuf,
    pub wait: Duration,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub required_chain_id: u64,
    pub network_name: String,
    pub native_symbol: String,
    pub token_symbol: String,
    pub balances: Balances,
    pub constraints: Option<Constraints>,
    pub coin_flip_history: Vec<GameRecord>,
    pub slots_history: Vec<GameRecord>,
    pub busy: Vec<(ActionSurface, bool)>,
    pub ledger: Vec<PendingTransaction>,
    pub last_play: Option<PlayReport>,
    pub notification: Option<Notification>,
    pub status: String,
    pub errors: Vec<String>,
}

struct ActionFinished {
    id: u64,
    surface: ActionSurface,
    result: Result<ActionReport, ClientError>,
}

pub struct AppController {
    arcade: Arc<Arcade>,
    status: String,
    notification: Option<Notification>,
    last_play: Option<PlayReport>,
    errors: Vec<String>,
    cancels: HashMap<ActionSurface, (u64, CancelToken)>,
    next_submission: u64,
    finished_tx: mpsc::UnboundedSender<ActionFinished>,
}

impl AppController {
    fn new(arcade: Arc<Arcade>, finished_tx: mpsc::UnboundedSender<ActionFinished>) -> Self {
        Self {
            arcade,
            status: String::from("Not connected"),
            notification: None,
            last_play: None,
            errors: Vec::new(),
            cancels: HashMap::new(),
            next_submission: 0,
            finished_tx,
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let deployment = self.arcade.deployment();
        let session = self.arcade.session();
        AppSnapshot {
            account: session.as_ref().map(|s| s.account),
            chain_id: session.as_ref().map(|s| s.chain_id),
            required_chain_id: deployment.network.chain_id,
            network_name: deployment.network.chain_name.clone(),
            native_symbol: deployment.network.native_currency.symbol.clone(),
            token_symbol: deployment.token.symbol.clone(),
            balances: self.arcade.balances(),
            constraints: self.arcade.cached_constraints(),
            coin_flip_history: self.arcade.history(GameKind::CoinFlip),
            slots_history: self.arcade.history(GameKind::Slots),
            busy: ActionSurface::ALL
                .iter()
                .map(|surface| (*surface, self.arcade.is_busy(*surface)))
                .collect(),
            ledger: self.arcade.ledger(),
            last_play: self.last_play.clone(),
            notification: self.notification.clone(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    pub async fn restore(&mut self) {
        match self.arcade.restore().await {
            Ok(Some(session)) => {
                self.status = format!("Restored {}", ui::short_address(&session.account));
            }
            Ok(None) => {}
            Err(err) => self.fail(err),
        }
    }

    pub async fn connect(&mut self) {
        self.status = String::from("Waiting for wallet...");
        match self.arcade.connect().await {
            Ok(session) => {
                self.status = format!("Connected {}", ui::short_address(&session.account));
                self.notification = Some(Notification::success("Wallet connected."));
            }
            Err(err) => self.fail(err),
        }
    }

    pub fn disconnect(&mut self) {
        self.arcade.disconnect();
        self.last_play = None;
        self.status = String::from("Not connected");
        self.notification = Some(Notification::warning("Wallet disconnected."));
    }

    pub async fn ensure_network(&mut self) {
        match self.arcade.ensure_network().await {
            Ok(check) => self.status = format!("Network: {check:?}"),
            Err(err) => self.fail(err),
        }
    }

    pub async fn refresh(&mut self) {
        for game in [GameKind::CoinFlip, GameKind::Slots] {
            if let Err(err) = self.arcade.refresh_history(game).await {
                self.fail(err);
            }
        }
        self.arcade.refresh_balances().await;
        self.status = String::from("Refreshed");
    }

    /// Starts `request` in the background; the surface is busy until it reports back.
    pub fn submit(&mut self, request: ActionRequest) {
        let surface = request.surface();
        let guard = match self.arcade.try_acquire(surface) {
            Ok(guard) => guard,
            Err(err) => {
                self.notify_error(&err);
                return;
            }
        };
        let id = self.next_submission;
        self.next_submission += 1;
        let cancel = CancelToken::default();
        self.cancels.insert(surface, (id, cancel.clone()));
        self.status = format!("Submitting {surface}...");
        let arcade = Arc::clone(&self.arcade);
        let finished_tx = self.finished_tx.clone();
        tokio::spawn(async move {
            let result = arcade.perform_held(guard, request, &cancel).await;
            let _ = finished_tx.send(ActionFinished {
                id,
                surface,
                result,
            });
        });
    }

    /// Stops waiting on every in-flight receipt.
    pub fn cancel_waits(&mut self) {
        for (surface, (_, cancel)) in self.cancels.drain() {
            info!(%surface, "cancelling receipt wait");
            cancel.cancel();
        }
    }

    fn finish(&mut self, finished: ActionFinished) {
        if matches!(self.cancels.get(&finished.surface), Some((id, _)) if *id == finished.id) {
            self.cancels.remove(&finished.surface);
        }
        match finished.result {
            Ok(report) => {
                let deployment = self.arcade.deployment();
                let notification = report.notification(
                    &deployment.network.native_currency.symbol,
                    &deployment.token.symbol,
                );
                self.status = format!("{} settled in {:#x}", finished.surface, report.tx_hash());
                if let ActionReport::Play(play) = report {
                    self.last_play = Some(play);
                }
                self.notification = Some(notification);
            }
            Err(err) => self.fail(err),
        }
    }

    fn fail(&mut self, err: ClientError) {
        self.push_errors(vec![err.to_string()]);
        self.notify_error(&err);
    }

    fn notify_error(&mut self, err: &ClientError) {
        let notification = Notification::from_error(err);
        self.status = notification.message.clone();
        self.notification = Some(notification);
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }
}

async fn connect_wallet(config: &AppConfig) -> Result<Arc<dyn WalletProvider>> {
    match &config.wallet {
        WalletConfig::Bridge { url } => {
            let bridge = Eip1193Bridge::connect(url).map_err(|err| eyre!(err))?;
            info!(url = %bridge.url(), "using wallet bridge");
            Ok(Arc::new(bridge))
        }
        WalletConfig::Keystore { name, dir } => {
            let dir = resolve_keystore_dir(dir.as_deref())?;
            let descriptor = find_keystore(&dir, name)?;
            let wallet = unlock_keystore(&descriptor)?;
            let keystore =
                KeystoreWallet::connect(wallet, &config.deployment.network.rpc_url).await?;
            Ok(Arc::new(keystore))
        }
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let wallet = connect_wallet(&config).await?;
    let store = SessionStore::new(&config.state_dir).wrap_err("Failed to open session store")?;
    let arcade = Arc::new(Arcade::new(
        wallet,
        config.deployment.clone(),
        Some(store),
        WaitBudget::new(config.wait),
    ));
    let (finished_tx, mut finished_rx) = mpsc::unbounded_channel();
    let mut controller = AppController::new(arcade, finished_tx);
    controller.restore().await;

    let mut ui_state = ui::UiState::default();
    ui::terminal_enter(&mut ui_state)?;
    let mut keys = ui::spawn_input_reader();
    let res = run_loop(&mut controller, &mut ui_state, &mut keys, &mut finished_rx).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    keys: &mut ui::InputReceiver,
    finished_rx: &mut mpsc::UnboundedReceiver<ActionFinished>,
) -> Result<()> {
    let mut ticker = time::interval(Duration::from_millis(500));
    let mut last_snapshot = controller.snapshot();
    ui::draw(ui_state, &last_snapshot)?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            _ = ticker.tick() => {}
            Some(finished) = finished_rx.recv() => controller.finish(finished),
            key = keys.recv() => {
                let Some(key) = key else { break };
                let Some(event) = ui::handle_key(ui_state, &last_snapshot, key) else {
                    continue;
                };
                match event {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Connect => controller.connect().await,
                    ui::UserEvent::Disconnect => controller.disconnect(),
                    ui::UserEvent::SwitchNetwork => controller.ensure_network().await,
                    ui::UserEvent::Refresh => controller.refresh().await,
                    ui::UserEvent::Submit(request) => controller.submit(request),
                    ui::UserEvent::CancelWait => controller.cancel_waits(),
                    ui::UserEvent::Redraw => {}
                }
            }
        }
        last_snapshot = controller.snapshot();
        ui::draw(ui_state, &last_snapshot)?;
    }
    controller.cancel_waits();
    Ok(())
}
