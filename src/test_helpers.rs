use crate::{
    arcade::Arcade,
    coin_flip_types::{
        CoinFlipCalls,
        CoinFlippedFilter,
    },
    deployment::{
        Deployment,
        NetworkDescriptor,
    },
    erc20_types::{
        ApprovalFilter,
        RangerTokenCalls,
    },
    executor::WaitBudget,
    gateway::GameKind,
    provider::{
        UNRECOGNIZED_CHAIN_CODE,
        WalletError,
        WalletProvider,
    },
    slots_types::{
        SlotsCalls,
        SpinFilter,
    },
    swap_types::{
        LiquidityAddedFilter,
        RangerSwapCalls,
        SwappedFilter,
    },
};
use async_trait::async_trait;
use ethers::{
    abi::{
        AbiDecode,
        AbiEncode,
        Token,
    },
    contract::EthEvent,
    types::{
        Address,
        Bytes,
        H256,
        Log,
        NameOrAddress,
        TransactionReceipt,
        TransactionRequest,
        U64,
        U256,
    },
};
use std::{
    collections::{
        HashMap,
        HashSet,
        VecDeque,
    },
    sync::{
        Arc,
        Mutex,
        MutexGuard,
    },
    time::Duration,
};

/// How the mock chain treats the next submitted transaction.
#[derive(Clone, Debug)]
pub enum TxScript {
    Succeed,
    /// Mined with status 0 and no state change.
    Revert,
    /// Mined and applied, but the receipt carries no logs.
    NoLogs,
    /// Accepted by the wallet and never mined.
    NeverConfirm,
    /// Refused by the wallet before broadcast.
    RejectSend(WalletError),
}

type GameEntry = (Address, U256, U256, U256, U256, bool);

#[derive(Default)]
struct Counters {
    total: usize,
    request_accounts: usize,
    switch: usize,
    add: usize,
    send: usize,
}

struct MockChain {
    deployment: Deployment,
    account: Address,
    chain_id: u64,
    known_chains: HashSet<u64>,
    ignore_adds: bool,
    block_number: u64,
    native: HashMap<Address, U256>,
    tokens: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    max_bets: HashMap<GameKind, U256>,
    games: HashMap<GameKind, Vec<GameEntry>>,
    coin_flip_results: VecDeque<(bool, U256)>,
    spin_results: VecDeque<(bool, U256)>,
    scripts: VecDeque<TxScript>,
    receipts: HashMap<H256, TransactionReceipt>,
    sent: Vec<TransactionRequest>,
    counters: Counters,
    fail_request_accounts: Option<WalletError>,
    fail_switch: Option<WalletError>,
    fail_add: Option<WalletError>,
    fail_native_balance: bool,
    foreign_play_after_send: Option<GameKind>,
}

/// In-memory wallet and chain hosting the coin flip, slots, token and swap
/// contracts of a deployment. Counts every provider call.
pub struct MockWallet {
    chain: Mutex<MockChain>,
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new(Deployment::mintme())
    }
}

impl MockWallet {
    pub fn new(deployment: Deployment) -> Self {
        let account = Address::repeat_byte(0x11);
        let chain_id = deployment.network.chain_id;
        let max_bets = HashMap::from([
            (
                GameKind::CoinFlip,
                U256::from(100u64) * U256::exp10(deployment.coin_flip.decimals.get() as usize),
            ),
            (
                GameKind::Slots,
                U256::from(100u64) * U256::exp10(deployment.slots.decimals.get() as usize),
            ),
        ]);
        let native = U256::from(1_000u64)
            * U256::exp10(deployment.network.native_currency.decimals.get() as usize);
        let tokens = U256::from(1_000u64) * U256::exp10(deployment.token.decimals.get() as usize);
        Self {
            chain: Mutex::new(MockChain {
                deployment,
                account,
                chain_id,
                known_chains: HashSet::from([chain_id, 1]),
                ignore_adds: false,
                block_number: 1_000,
                native: HashMap::from([(account, native)]),
                tokens: HashMap::from([(account, tokens)]),
                allowances: HashMap::new(),
                max_bets,
                games: HashMap::new(),
                coin_flip_results: VecDeque::new(),
                spin_results: VecDeque::new(),
                scripts: VecDeque::new(),
                receipts: HashMap::new(),
                sent: Vec::new(),
                counters: Counters::default(),
                fail_request_accounts: None,
                fail_switch: None,
                fail_add: None,
                fail_native_balance: false,
                foreign_play_after_send: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockChain> {
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn account(&self) -> Address {
        self.lock().account
    }

    pub fn current_chain(&self) -> u64 {
        self.lock().chain_id
    }

    pub fn set_current_chain(&self, chain_id: u64) {
        let mut chain = self.lock();
        chain.chain_id = chain_id;
        chain.known_chains.insert(chain_id);
    }

    pub fn forget_network(&self, chain_id: u64) {
        self.lock().known_chains.remove(&chain_id);
    }

    /// Accept `wallet_addEthereumChain` without actually learning the network.
    pub fn ignore_added_networks(&self) {
        self.lock().ignore_adds = true;
    }

    pub fn fail_next_request_accounts(&self, err: WalletError) {
        self.lock().fail_request_accounts = Some(err);
    }

    pub fn fail_next_switch(&self, err: WalletError) {
        self.lock().fail_switch = Some(err);
    }

    pub fn fail_next_add(&self, err: WalletError) {
        self.lock().fail_add = Some(err);
    }

    pub fn fail_native_balance(&self, fail: bool) {
        self.lock().fail_native_balance = fail;
    }

    pub fn script_next(&self, script: TxScript) {
        self.lock().scripts.push_back(script);
    }

    /// Result of the next coin flip; `amount` is the prize when `won`.
    pub fn queue_coin_flip(&self, won: bool, amount: U256) {
        self.lock().coin_flip_results.push_back((won, amount));
    }

    pub fn queue_spin(&self, won: bool, amount: U256) {
        self.lock().spin_results.push_back((won, amount));
    }

    pub fn set_max_bet(&self, game: GameKind, max: U256) {
        self.lock().max_bets.insert(game, max);
    }

    /// Appends `count` finished games by another player.
    pub fn seed_games(&self, game: GameKind, count: usize) {
        let mut chain = self.lock();
        for n in 0..count {
            chain.seed_game(game, n as u64);
        }
    }

    /// Another player's game lands in the block after the next submitted transaction.
    pub fn foreign_play_after_next(&self, game: GameKind) {
        self.lock().foreign_play_after_send = Some(game);
    }

    pub fn game_count(&self, game: GameKind) -> usize {
        self.lock().games.get(&game).map_or(0, Vec::len)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.lock()
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn native_balance(&self, account: Address) -> U256 {
        self.lock().native.get(&account).copied().unwrap_or_default()
    }

    pub fn token_balance(&self, account: Address) -> U256 {
        self.lock().tokens.get(&account).copied().unwrap_or_default()
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.lock().sent.clone()
    }

    pub fn last_sent_gas(&self) -> Option<U256> {
        self.lock().sent.last().and_then(|tx| tx.gas)
    }

    pub fn call_count(&self) -> usize {
        self.lock().counters.total
    }

    pub fn request_accounts_count(&self) -> usize {
        self.lock().counters.request_accounts
    }

    pub fn switch_count(&self) -> usize {
        self.lock().counters.switch
    }

    pub fn add_count(&self) -> usize {
        self.lock().counters.add
    }

    pub fn send_count(&self) -> usize {
        self.lock().counters.send
    }
}

fn target(tx: &TransactionRequest) -> Option<Address> {
    match tx.to.as_ref()? {
        NameOrAddress::Address(address) => Some(*address),
        NameOrAddress::Name(_) => None,
    }
}

fn reverted(reason: &str) -> WalletError {
    WalletError::rpc(3, format!("execution reverted: {reason}"))
}

fn event_log(address: Address, topics: Vec<H256>, tokens: &[Token]) -> Log {
    Log {
        address,
        topics,
        data: Bytes::from(ethers::abi::encode(tokens)),
        ..Default::default()
    }
}

fn game_event(address: Address, signature: H256, player: Address, amount: U256, won: bool) -> Log {
    let message = if won { "You won!" } else { "You lost!" };
    event_log(
        address,
        vec![signature],
        &[
            Token::String(message.to_string()),
            Token::Address(player),
            Token::Uint(amount),
            Token::Bool(won),
        ],
    )
}

impl MockChain {
    fn read(&self, to: Address, data: &[u8]) -> Result<Bytes, WalletError> {
        let d = &self.deployment;
        let encoded = if to == d.coin_flip.address {
            match CoinFlipCalls::decode(data).map_err(|_| reverted("unknown selector"))? {
                CoinFlipCalls::MaxAmountToBet(_) => self.max_bet(GameKind::CoinFlip).encode(),
                CoinFlipCalls::GetGameCount(_) => self.count(GameKind::CoinFlip).encode(),
                CoinFlipCalls::GetGameEntry(call) => {
                    self.entry(GameKind::CoinFlip, call.index)?.encode()
                }
                CoinFlipCalls::Play(_) => return Err(reverted("Play is not a view")),
            }
        } else if to == d.slots.address {
            match SlotsCalls::decode(data).map_err(|_| reverted("unknown selector"))? {
                SlotsCalls::MaxBetAmount(_) => self.max_bet(GameKind::Slots).encode(),
                SlotsCalls::GetGameCount(_) => self.count(GameKind::Slots).encode(),
                SlotsCalls::GetGameEntry(call) => self.entry(GameKind::Slots, call.index)?.encode(),
                SlotsCalls::Spin(_) => return Err(reverted("spin is not a view")),
            }
        } else if to == d.token.address {
            match RangerTokenCalls::decode(data).map_err(|_| reverted("unknown selector"))? {
                RangerTokenCalls::BalanceOf(call) => self
                    .tokens
                    .get(&call.account)
                    .copied()
                    .unwrap_or_default()
                    .encode(),
                RangerTokenCalls::Decimals(_) => d.token.decimals.get().encode(),
                RangerTokenCalls::Allowance(call) => self
                    .allowances
                    .get(&(call.owner, call.spender))
                    .copied()
                    .unwrap_or_default()
                    .encode(),
                RangerTokenCalls::Approve(_) => return Err(reverted("approve is not a view")),
            }
        } else {
            return Err(WalletError::rpc(-32000, format!("no contract at {to:?}")));
        };
        Ok(Bytes::from(encoded))
    }

    fn max_bet(&self, game: GameKind) -> U256 {
        self.max_bets.get(&game).copied().unwrap_or_default()
    }

    fn count(&self, game: GameKind) -> U256 {
        U256::from(self.games.get(&game).map_or(0, Vec::len))
    }

    fn entry(&self, game: GameKind, index: U256) -> Result<GameEntry, WalletError> {
        self.games
            .get(&game)
            .and_then(|games| games.get(index.low_u64() as usize))
            .cloned()
            .ok_or_else(|| reverted("index out of range"))
    }

    fn spend_allowance(&mut self, owner: Address, spender: Address, amount: U256) -> Option<()> {
        let allowance = self.allowances.get(&(owner, spender)).copied().unwrap_or_default();
        let balance = self.tokens.get(&owner).copied().unwrap_or_default();
        if allowance < amount || balance < amount {
            return None;
        }
        self.allowances.insert((owner, spender), allowance - amount);
        self.tokens.insert(owner, balance - amount);
        Some(())
    }

    fn seed_game(&mut self, game: GameKind, n: u64) {
        self.block_number += 1;
        let block = U256::from(self.block_number);
        let entry = (
            Address::repeat_byte(0x22),
            block,
            U256::from(1_700_000_000u64) + block,
            U256::from(n + 1),
            U256::zero(),
            n % 2 == 0,
        );
        self.games.entry(game).or_default().push(entry);
    }

    fn record_game(&mut self, game: GameKind, player: Address, bet: U256, prize: U256, won: bool) {
        let block = U256::from(self.block_number);
        let entry = (player, block, U256::from(1_700_000_000u64) + block, bet, prize, won);
        self.games.entry(game).or_default().push(entry);
    }

    /// Applies a mined transaction. `None` means execution reverted.
    fn execute(&mut self, from: Address, to: Address, data: &[u8], value: U256) -> Option<Vec<Log>> {
        let (coin_flip, slots, token, swap) = (
            self.deployment.coin_flip.address,
            self.deployment.slots.address,
            self.deployment.token.address,
            self.deployment.swap.address,
        );
        if to == coin_flip {
            let CoinFlipCalls::Play(_) = CoinFlipCalls::decode(data).ok()? else {
                return None;
            };
            if value.is_zero() || value > self.max_bet(GameKind::CoinFlip) {
                return None;
            }
            let balance = self.native.entry(from).or_default();
            *balance = balance.checked_sub(value)?;
            let (won, prize) = self.coin_flip_results.pop_front().unwrap_or_default();
            if won {
                *self.native.entry(from).or_default() += prize;
            }
            let prize = if won { prize } else { U256::zero() };
            self.record_game(GameKind::CoinFlip, from, value, prize, won);
            let amount = if won { prize } else { value };
            return Some(vec![game_event(
                to,
                CoinFlippedFilter::signature(),
                from,
                amount,
                won,
            )]);
        }
        if to == slots {
            let SlotsCalls::Spin(call) = SlotsCalls::decode(data).ok()? else {
                return None;
            };
            if call.amount.is_zero() || call.amount > self.max_bet(GameKind::Slots) {
                return None;
            }
            self.spend_allowance(from, slots, call.amount)?;
            let (won, prize) = self.spin_results.pop_front().unwrap_or_default();
            let prize = if won { prize } else { U256::zero() };
            *self.tokens.entry(from).or_default() += prize;
            self.record_game(GameKind::Slots, from, call.amount, prize, won);
            let amount = if won { prize } else { call.amount };
            return Some(vec![game_event(to, SpinFilter::signature(), from, amount, won)]);
        }
        if to == token {
            let RangerTokenCalls::Approve(call) = RangerTokenCalls::decode(data).ok()? else {
                return None;
            };
            self.allowances.insert((from, call.spender), call.amount);
            return Some(vec![event_log(
                to,
                vec![
                    ApprovalFilter::signature(),
                    H256::from(from),
                    H256::from(call.spender),
                ],
                &[Token::Uint(call.amount)],
            )]);
        }
        if to == swap {
            // 1 RANGER (12 decimals) trades for 0.5 MINTME (18 decimals).
            let scale = U256::exp10(6);
            let log = match RangerSwapCalls::decode(data).ok()? {
                RangerSwapCalls::SwapRangerToMintMe(call) => {
                    self.spend_allowance(from, swap, call.amount)?;
                    let out = call.amount * scale / 2;
                    *self.native.entry(from).or_default() += out;
                    event_log(
                        to,
                        vec![SwappedFilter::signature()],
                        &[Token::Address(from), Token::Uint(call.amount), Token::Uint(out)],
                    )
                }
                RangerSwapCalls::SwapMintMeToRanger(call) => {
                    if call.amount != value || value.is_zero() {
                        return None;
                    }
                    let balance = self.native.entry(from).or_default();
                    *balance = balance.checked_sub(value)?;
                    let out = call.amount * 2 / scale;
                    *self.tokens.entry(from).or_default() += out;
                    event_log(
                        to,
                        vec![SwappedFilter::signature()],
                        &[Token::Address(from), Token::Uint(call.amount), Token::Uint(out)],
                    )
                }
                RangerSwapCalls::AddLiquidity(call) => {
                    let native = self.native.get(&from).copied().unwrap_or_default();
                    if native < value {
                        return None;
                    }
                    self.spend_allowance(from, swap, call.token_amount)?;
                    self.native.insert(from, native - value);
                    event_log(
                        to,
                        vec![LiquidityAddedFilter::signature()],
                        &[
                            Token::Address(from),
                            Token::Uint(call.token_amount),
                            Token::Uint(value),
                        ],
                    )
                }
            };
            return Some(vec![log]);
        }
        None
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        chain.counters.request_accounts += 1;
        if let Some(err) = chain.fail_request_accounts.take() {
            return Err(err);
        }
        Ok(vec![chain.account])
    }

    async fn accounts(&self) -> Result<Vec<Address>, WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        Ok(vec![chain.account])
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        Ok(chain.chain_id)
    }

    async fn switch_network(&self, chain_id_hex: &str) -> Result<(), WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        chain.counters.switch += 1;
        if let Some(err) = chain.fail_switch.take() {
            return Err(err);
        }
        let target = u64::from_str_radix(chain_id_hex.trim_start_matches("0x"), 16)
            .map_err(|_| WalletError::rpc(-32602, "invalid chain id"))?;
        if !chain.known_chains.contains(&target) {
            return Err(WalletError::rpc(
                UNRECOGNIZED_CHAIN_CODE,
                format!("Unrecognized chain ID {chain_id_hex}"),
            ));
        }
        chain.chain_id = target;
        Ok(())
    }

    async fn add_network(&self, network: &NetworkDescriptor) -> Result<(), WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        chain.counters.add += 1;
        if let Some(err) = chain.fail_add.take() {
            return Err(err);
        }
        if !chain.ignore_adds {
            chain.known_chains.insert(network.chain_id);
        }
        Ok(())
    }

    async fn balance(&self, account: Address) -> Result<U256, WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        if chain.fail_native_balance {
            return Err(WalletError::rpc(-32603, "balance unavailable"));
        }
        Ok(chain.native.get(&account).copied().unwrap_or_default())
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        let to = target(tx).ok_or_else(|| WalletError::rpc(-32602, "missing call target"))?;
        let data = tx.data.clone().unwrap_or_default();
        chain.read(to, data.as_ref())
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<H256, WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        chain.counters.send += 1;
        chain.sent.push(tx.clone());
        let script = chain.scripts.pop_front().unwrap_or(TxScript::Succeed);
        let hash = H256::from(rand::random::<[u8; 32]>());
        let from = tx.from.unwrap_or(chain.account);
        let to = target(&tx).ok_or_else(|| WalletError::rpc(-32602, "missing target"))?;
        let data = tx.data.clone().unwrap_or_default();
        let value = tx.value.unwrap_or_default();

        let logs = match script {
            TxScript::RejectSend(err) => return Err(err),
            TxScript::NeverConfirm => return Ok(hash),
            TxScript::Revert => None,
            TxScript::Succeed => {
                chain.block_number += 1;
                chain.execute(from, to, data.as_ref(), value)
            }
            TxScript::NoLogs => {
                chain.block_number += 1;
                chain.execute(from, to, data.as_ref(), value).map(|_| Vec::new())
            }
        };
        let status = if logs.is_some() { 1u64 } else { 0 };
        let receipt = TransactionReceipt {
            transaction_hash: hash,
            block_number: Some(U64::from(chain.block_number)),
            status: Some(U64::from(status)),
            logs: logs.unwrap_or_default(),
            ..Default::default()
        };
        chain.receipts.insert(hash, receipt);
        if let Some(game) = chain.foreign_play_after_send.take() {
            chain.seed_game(game, 0);
        }
        Ok(hash)
    }

    async fn transaction_receipt(
        &self,
        hash: H256,
    ) -> Result<Option<TransactionReceipt>, WalletError> {
        let mut chain = self.lock();
        chain.counters.total += 1;
        Ok(chain.receipts.get(&hash).cloned())
    }
}

/// An `Arcade` wired to a fresh `MockWallet`, with a short receipt wait.
pub struct TestContext {
    wallet: Arc<MockWallet>,
    arcade: Arc<Arcade>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_budget(
            WaitBudget::new(Duration::from_millis(500)).with_poll_interval(Duration::from_millis(5)),
        )
    }

    pub fn with_budget(budget: WaitBudget) -> Self {
        let wallet = Arc::new(MockWallet::default());
        let arcade = Arc::new(Arcade::new(
            wallet.clone(),
            Deployment::mintme(),
            None,
            budget,
        ));
        Self { wallet, arcade }
    }

    /// Connects and runs the post-connect sync.
    pub async fn connected() -> Self {
        let context = Self::new();
        context.arcade.connect().await.unwrap();
        context
    }

    pub fn wallet(&self) -> Arc<MockWallet> {
        self.wallet.clone()
    }

    pub fn arcade(&self) -> Arc<Arcade> {
        self.arcade.clone()
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
