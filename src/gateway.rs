use crate::{
    amount::{
        Decimals,
        FixedPointAmount,
    },
    coin_flip_types::{
        self,
        MaxAmountToBetCall,
        PlayCall,
    },
    deployment::{
        Deployment,
        GameContract,
    },
    erc20_types::{
        AllowanceCall,
        ApproveCall,
        BalanceOfCall,
        DecimalsCall,
    },
    error::ClientError,
    executor::{
        CancelToken,
        Confirmation,
        ExpectedEvent,
        PreparedCall,
        TransactionExecutor,
        TxKind,
        WaitBudget,
    },
    history::GameRecord,
    provider::WalletProvider,
    session::Signer,
    slots_types::{
        self,
        MaxBetAmountCall,
        SpinCall,
    },
    surface::ActionSurface,
    swap_types::{
        AddLiquidityCall,
        SwapMintMeToRangerCall,
        SwapRangerToMintMeCall,
    },
};
use ethers::{
    abi::{
        AbiDecode,
        AbiEncode,
    },
    types::{
        Address,
        Bytes,
        TransactionRequest,
        U256,
    },
};
use itertools::Itertools;
use std::{
    cmp::Ordering,
    fmt,
    sync::Arc,
};
use tracing::{
    info,
    warn,
};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum GameKind {
    CoinFlip,
    Slots,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::CoinFlip => write!(f, "coin flip"),
            GameKind::Slots => write!(f, "slots"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwapDirection {
    /// Spends the reward token, so it needs an approval first.
    RangerToMintMe,
    MintMeToRanger,
}

/// What the user typed, before any parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ActionRequest {
    Play {
        amount: String,
    },
    Spin {
        amount: String,
    },
    Swap {
        direction: SwapDirection,
        amount: String,
    },
    AddLiquidity {
        token_amount: String,
        native_amount: String,
    },
}

/// A validated action with amounts at their asset's scale.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    Play {
        bet: FixedPointAmount,
    },
    Spin {
        bet: FixedPointAmount,
    },
    Swap {
        direction: SwapDirection,
        amount: FixedPointAmount,
    },
    AddLiquidity {
        token_amount: FixedPointAmount,
        native_amount: FixedPointAmount,
    },
}

impl Action {
    pub fn surface(&self) -> ActionSurface {
        match self {
            Action::Play { .. } => ActionSurface::CoinFlip,
            Action::Spin { .. } => ActionSurface::Slots,
            Action::Swap { .. } | Action::AddLiquidity { .. } => ActionSurface::Swap,
        }
    }
}

/// Allowed wagers for one game, read once per session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BetConstraint {
    /// `0 < amount <= max`.
    Range { max: FixedPointAmount },
    /// `amount` must equal one of the presets.
    Presets { amounts: Vec<FixedPointAmount> },
}

impl BetConstraint {
    pub fn decimals(&self) -> Option<Decimals> {
        match self {
            BetConstraint::Range { max } => Some(max.decimals()),
            BetConstraint::Presets { amounts } => amounts.first().map(|a| a.decimals()),
        }
    }

    pub fn validate(&self, amount: &FixedPointAmount) -> Result<(), ClientError> {
        match self {
            BetConstraint::Range { max } => {
                if amount.is_zero() {
                    return Err(ClientError::InvalidParams(
                        "bet must be greater than zero".into(),
                    ));
                }
                if amount.checked_cmp(max)? == Ordering::Greater {
                    return Err(ClientError::InvalidParams(format!(
                        "bet {amount} exceeds the maximum of {max}"
                    )));
                }
                Ok(())
            }
            BetConstraint::Presets { amounts } => {
                for preset in amounts {
                    if amount.checked_cmp(preset)? == Ordering::Equal {
                        return Ok(());
                    }
                }
                Err(ClientError::InvalidParams(format!(
                    "bet {amount} is not one of {}",
                    amounts.iter().join(", ")
                )))
            }
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Constraints {
    pub coin_flip: BetConstraint,
    pub slots: BetConstraint,
}

/// Confirmations of a performed action; `approval` is set for token spends.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionOutcome {
    pub approval: Option<Confirmation>,
    pub confirmation: Confirmation,
}

/// Typed access to the game, token and swap contracts of one deployment.
pub struct ContractGateway {
    wallet: Arc<dyn WalletProvider>,
    executor: Arc<TransactionExecutor>,
    deployment: Deployment,
}

impl ContractGateway {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        executor: Arc<TransactionExecutor>,
        deployment: Deployment,
    ) -> Self {
        Self {
            wallet,
            executor,
            deployment,
        }
    }

    pub fn deployment(&self) -> &Deployment {
        &self.deployment
    }

    pub fn executor(&self) -> &TransactionExecutor {
        &self.executor
    }

    fn game(&self, game: GameKind) -> &GameContract {
        match game {
            GameKind::CoinFlip => &self.deployment.coin_flip,
            GameKind::Slots => &self.deployment.slots,
        }
    }

    async fn read<T: AbiDecode>(
        &self,
        to: Address,
        data: Bytes,
        what: &str,
    ) -> Result<T, ClientError> {
        let request = TransactionRequest::new().to(to).data(data);
        let raw = self
            .wallet
            .call(&request)
            .await
            .map_err(|err| ClientError::from_wallet(err, what))?;
        T::decode(raw.as_ref())
            .map_err(|err| ClientError::ChainCallFailed(format!("{what}: {err}")))
    }

    pub async fn game_count(&self, game: GameKind) -> Result<u64, ClientError> {
        let to = self.game(game).address;
        let data = match game {
            GameKind::CoinFlip => coin_flip_types::GetGameCountCall.encode(),
            GameKind::Slots => slots_types::GetGameCountCall.encode(),
        };
        let count: U256 = self.read(to, data.into(), "getGameCount").await?;
        if count > U256::from(u64::MAX) {
            return Err(ClientError::ChainCallFailed(format!(
                "getGameCount returned {count}"
            )));
        }
        Ok(count.as_u64())
    }

    pub async fn game_entry(&self, game: GameKind, index: u64) -> Result<GameRecord, ClientError> {
        let contract = self.game(game);
        let index = U256::from(index);
        let data = match game {
            GameKind::CoinFlip => coin_flip_types::GetGameEntryCall { index }.encode(),
            GameKind::Slots => slots_types::GetGameEntryCall { index }.encode(),
        };
        let (player, block_number, block_timestamp, bet, prize, won): (
            Address,
            U256,
            U256,
            U256,
            U256,
            bool,
        ) = self.read(contract.address, data.into(), "getGameEntry").await?;
        Ok(GameRecord {
            player,
            block_number: block_number.low_u64(),
            block_timestamp: block_timestamp.low_u64(),
            bet: FixedPointAmount::new(bet, contract.decimals),
            prize: FixedPointAmount::new(prize, contract.decimals),
            won,
        })
    }

    pub async fn max_bet(&self, game: GameKind) -> Result<FixedPointAmount, ClientError> {
        let contract = self.game(game);
        let (data, what) = match game {
            GameKind::CoinFlip => (MaxAmountToBetCall.encode(), "MaxAmountToBet"),
            GameKind::Slots => (MaxBetAmountCall.encode(), "maxBetAmount"),
        };
        let max: U256 = self.read(contract.address, data.into(), what).await?;
        Ok(FixedPointAmount::new(max, contract.decimals))
    }

    /// A range for games without presets, otherwise the presets the contract accepts.
    pub async fn bet_constraint(&self, game: GameKind) -> Result<BetConstraint, ClientError> {
        let contract = self.game(game);
        let max = self.max_bet(game).await?;
        if contract.presets.is_empty() {
            return Ok(BetConstraint::Range { max });
        }
        let amounts = contract
            .presets
            .iter()
            .map(|units| FixedPointAmount::from_whole(*units, contract.decimals))
            .filter(|preset| preset.raw() <= max.raw())
            .collect();
        Ok(BetConstraint::Presets { amounts })
    }

    pub async fn constraints(&self) -> Result<Constraints, ClientError> {
        let (coin_flip, slots) = futures::try_join!(
            self.bet_constraint(GameKind::CoinFlip),
            self.bet_constraint(GameKind::Slots)
        )?;
        Ok(Constraints { coin_flip, slots })
    }

    pub async fn native_balance(&self, account: Address) -> Result<FixedPointAmount, ClientError> {
        let raw = self
            .wallet
            .balance(account)
            .await
            .map_err(|err| ClientError::from_wallet(err, "native balance"))?;
        Ok(FixedPointAmount::new(
            raw,
            self.deployment.network.native_currency.decimals,
        ))
    }

    pub async fn token_balance(&self, account: Address) -> Result<FixedPointAmount, ClientError> {
        let token = &self.deployment.token;
        let raw: U256 = self
            .read(token.address, BalanceOfCall { account }.encode().into(), "balanceOf")
            .await?;
        Ok(FixedPointAmount::new(raw, token.decimals))
    }

    pub async fn token_decimals(&self) -> Result<u8, ClientError> {
        self.read(self.deployment.token.address, DecimalsCall.encode().into(), "decimals")
            .await
    }

    pub async fn allowance(
        &self,
        owner: Address,
        spender: Address,
    ) -> Result<FixedPointAmount, ClientError> {
        let token = &self.deployment.token;
        let raw: U256 = self
            .read(
                token.address,
                AllowanceCall { owner, spender }.encode().into(),
                "allowance",
            )
            .await?;
        Ok(FixedPointAmount::new(raw, token.decimals))
    }

    /// Parses and validates a request. Never touches the network.
    pub fn prepare(
        &self,
        request: &ActionRequest,
        constraints: &Constraints,
    ) -> Result<Action, ClientError> {
        let action = self.parse(request)?;
        self.validate(&action, constraints)?;
        Ok(action)
    }

    /// Checks a parsed wager against the session's bet constraints.
    pub fn validate(&self, action: &Action, constraints: &Constraints) -> Result<(), ClientError> {
        match action {
            Action::Play { bet } => constraints.coin_flip.validate(bet),
            Action::Spin { bet } => constraints.slots.validate(bet),
            Action::Swap { .. } | Action::AddLiquidity { .. } => Ok(()),
        }
    }

    /// Turns typed amounts into scaled, positive amounts. Needs only the deployment.
    pub fn parse(&self, request: &ActionRequest) -> Result<Action, ClientError> {
        let native = self.deployment.network.native_currency.decimals;
        let token = self.deployment.token.decimals;
        match request {
            ActionRequest::Play { amount } => {
                let bet = FixedPointAmount::parse(amount, self.deployment.coin_flip.decimals)?;
                Ok(Action::Play {
                    bet: positive(bet, "bet")?,
                })
            }
            ActionRequest::Spin { amount } => {
                let bet = FixedPointAmount::parse(amount, self.deployment.slots.decimals)?
                    .ensure_decimals(token)?;
                Ok(Action::Spin {
                    bet: positive(bet, "bet")?,
                })
            }
            ActionRequest::Swap { direction, amount } => {
                let decimals = match direction {
                    SwapDirection::RangerToMintMe => token,
                    SwapDirection::MintMeToRanger => native,
                };
                let amount = positive(FixedPointAmount::parse(amount, decimals)?, "swap amount")?;
                Ok(Action::Swap {
                    direction: *direction,
                    amount,
                })
            }
            ActionRequest::AddLiquidity {
                token_amount,
                native_amount,
            } => {
                let token_amount = positive(
                    FixedPointAmount::parse(token_amount, token)?,
                    "token amount",
                )?;
                let native_amount = positive(
                    FixedPointAmount::parse(native_amount, native)?,
                    "native amount",
                )?;
                Ok(Action::AddLiquidity {
                    token_amount,
                    native_amount,
                })
            }
        }
    }

    /// Encodes the primary call for `action`.
    pub fn call_for(&self, action: &Action) -> PreparedCall {
        let d = &self.deployment;
        match action {
            Action::Play { bet } => PreparedCall {
                kind: TxKind::Play,
                to: d.coin_flip.address,
                data: PlayCall.encode().into(),
                value: bet.raw(),
                expected: ExpectedEvent::CoinFlipped,
            },
            Action::Spin { bet } => PreparedCall {
                kind: TxKind::Spin,
                to: d.slots.address,
                data: SpinCall { amount: bet.raw() }.encode().into(),
                value: U256::zero(),
                expected: ExpectedEvent::Spin,
            },
            Action::Swap {
                direction: SwapDirection::RangerToMintMe,
                amount,
            } => PreparedCall {
                kind: TxKind::Swap,
                to: d.swap.address,
                data: SwapRangerToMintMeCall {
                    amount: amount.raw(),
                }
                .encode()
                .into(),
                value: U256::zero(),
                expected: ExpectedEvent::Swapped,
            },
            Action::Swap {
                direction: SwapDirection::MintMeToRanger,
                amount,
            } => PreparedCall {
                kind: TxKind::Swap,
                to: d.swap.address,
                data: SwapMintMeToRangerCall {
                    amount: amount.raw(),
                }
                .encode()
                .into(),
                value: amount.raw(),
                expected: ExpectedEvent::Swapped,
            },
            Action::AddLiquidity {
                token_amount,
                native_amount,
            } => PreparedCall {
                kind: TxKind::AddLiquidity,
                to: d.swap.address,
                data: AddLiquidityCall {
                    token_amount: token_amount.raw(),
                }
                .encode()
                .into(),
                value: native_amount.raw(),
                expected: ExpectedEvent::LiquidityAdded,
            },
        }
    }

    /// The token amount `action` moves out of the wallet and who moves it.
    pub fn token_spend(&self, action: &Action) -> Option<(Address, FixedPointAmount)> {
        match action {
            Action::Spin { bet } => Some((self.deployment.slots.address, *bet)),
            Action::Swap {
                direction: SwapDirection::RangerToMintMe,
                amount,
            } => Some((self.deployment.swap.address, *amount)),
            Action::AddLiquidity { token_amount, .. } => {
                Some((self.deployment.swap.address, *token_amount))
            }
            Action::Play { .. }
            | Action::Swap {
                direction: SwapDirection::MintMeToRanger,
                ..
            } => None,
        }
    }

    pub fn approval_for(&self, spender: Address, amount: &FixedPointAmount) -> PreparedCall {
        PreparedCall {
            kind: TxKind::Approve,
            to: self.deployment.token.address,
            data: ApproveCall {
                spender,
                amount: amount.raw(),
            }
            .encode()
            .into(),
            value: U256::zero(),
            expected: ExpectedEvent::Approval,
        }
    }

    /// Submits `action`, approving the exact token amount first when it spends tokens.
    /// The primary call is never sent unless the approval confirmed.
    pub async fn perform(
        &self,
        signer: &Signer,
        action: &Action,
        budget: WaitBudget,
        cancel: &CancelToken,
    ) -> Result<ActionOutcome, ClientError> {
        let approval = match self.token_spend(action) {
            Some((spender, amount)) => {
                info!(spender = ?spender, amount = %amount, "approving token spend");
                let call = self.approval_for(spender, &amount);
                match self.executor.execute(signer, call, budget, cancel).await {
                    Ok(confirmation) => Some(confirmation),
                    Err(ClientError::OutcomeUnknown { tx_hash }) => {
                        warn!(tx_hash = %format!("{tx_hash:#x}"), "approval confirmed without Approval event");
                        None
                    }
                    Err(err) => return Err(err),
                }
            }
            None => None,
        };
        let confirmation = self
            .executor
            .execute(signer, self.call_for(action), budget, cancel)
            .await?;
        Ok(ActionOutcome {
            approval,
            confirmation,
        })
    }
}

fn positive(amount: FixedPointAmount, what: &str) -> Result<FixedPointAmount, ClientError> {
    if amount.is_zero() {
        return Err(ClientError::InvalidParams(format!(
            "{what} must be greater than zero"
        )));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        deployment::GasCeilings,
        test_helpers::MockWallet,
    };
    use proptest::prelude::*;

    fn gateway(wallet: Arc<MockWallet>) -> ContractGateway {
        let executor = Arc::new(TransactionExecutor::new(wallet.clone(), GasCeilings::default()));
        ContractGateway::new(wallet, executor, Deployment::mintme())
    }

    fn constraints() -> Constraints {
        Constraints {
            coin_flip: BetConstraint::Range {
                max: FixedPointAmount::from_whole(100, Decimals::NATIVE),
            },
            slots: BetConstraint::Presets {
                amounts: [1, 5, 10, 25, 50, 100]
                    .into_iter()
                    .map(|n| FixedPointAmount::from_whole(n, Decimals::REWARD_TOKEN))
                    .collect(),
            },
        }
    }

    #[test]
    fn prepare__rejects_bet_above_max_without_network_calls() {
        // given
        let wallet = Arc::new(MockWallet::default());
        let gateway = gateway(wallet.clone());

        // when
        let result = gateway.prepare(
            &ActionRequest::Play {
                amount: "150".into(),
            },
            &constraints(),
        );

        // then
        assert!(matches!(result, Err(ClientError::InvalidParams(_))));
        assert_eq!(wallet.call_count(), 0);
    }

    #[test]
    fn prepare__accepts_only_slot_presets() {
        let gateway = gateway(Arc::new(MockWallet::default()));
        let spin = |amount: &str| {
            gateway.prepare(
                &ActionRequest::Spin {
                    amount: amount.into(),
                },
                &constraints(),
            )
        };

        assert!(spin("25").is_ok());
        assert!(matches!(spin("7"), Err(ClientError::InvalidParams(_))));
        assert!(matches!(spin("0"), Err(ClientError::InvalidParams(_))));
    }

    #[test]
    fn parse__rejects_zero_bet_without_constraints() {
        let gateway = gateway(Arc::new(MockWallet::default()));

        let zero = gateway.parse(&ActionRequest::Play { amount: "0".into() });
        let ten = gateway.parse(&ActionRequest::Play { amount: "10".into() });

        assert!(matches!(zero, Err(ClientError::InvalidParams(_))));
        assert!(matches!(ten, Ok(Action::Play { bet }) if bet.to_string() == "10"));
    }

    #[test]
    fn validate__refuses_amount_at_wrong_scale() {
        let constraint = constraints().coin_flip;
        let token_bet = FixedPointAmount::from_whole(1, Decimals::REWARD_TOKEN);
        assert!(matches!(
            constraint.validate(&token_bet),
            Err(ClientError::InvalidParams(msg)) if msg.contains("decimals")
        ));
    }

    #[test]
    fn prepare__rejects_zero_swap_and_negative_liquidity() {
        let gateway = gateway(Arc::new(MockWallet::default()));
        let zero = gateway.prepare(
            &ActionRequest::Swap {
                direction: SwapDirection::MintMeToRanger,
                amount: "0".into(),
            },
            &constraints(),
        );
        let negative = gateway.prepare(
            &ActionRequest::AddLiquidity {
                token_amount: "-1".into(),
                native_amount: "1".into(),
            },
            &constraints(),
        );
        assert!(matches!(zero, Err(ClientError::InvalidParams(_))));
        assert!(matches!(negative, Err(ClientError::InvalidParams(_))));
    }

    #[test]
    fn call_for__sends_native_value_only_where_payable() {
        let gateway = gateway(Arc::new(MockWallet::default()));
        let amount = FixedPointAmount::from_whole(3, Decimals::NATIVE);
        let to_ranger = gateway.call_for(&Action::Swap {
            direction: SwapDirection::MintMeToRanger,
            amount,
        });
        let tokens = FixedPointAmount::from_whole(3, Decimals::REWARD_TOKEN);
        let to_mintme = gateway.call_for(&Action::Swap {
            direction: SwapDirection::RangerToMintMe,
            amount: tokens,
        });

        assert_eq!(to_ranger.value, amount.raw());
        assert_eq!(to_mintme.value, U256::zero());
        assert!(gateway.token_spend(&Action::Swap {
            direction: SwapDirection::MintMeToRanger,
            amount,
        })
        .is_none());
    }

    #[tokio::test]
    async fn bet_constraint__reads_max_from_contract() {
        // given
        let wallet = Arc::new(MockWallet::default());
        wallet.set_max_bet(GameKind::Slots, FixedPointAmount::from_whole(10, Decimals::REWARD_TOKEN).raw());
        let gateway = gateway(wallet);

        // when
        let coin_flip = gateway.bet_constraint(GameKind::CoinFlip).await.unwrap();
        let slots = gateway.bet_constraint(GameKind::Slots).await.unwrap();

        // then
        assert_eq!(
            coin_flip,
            BetConstraint::Range {
                max: FixedPointAmount::from_whole(100, Decimals::NATIVE)
            }
        );
        let BetConstraint::Presets { amounts } = slots else {
            panic!("slots use presets");
        };
        assert_eq!(amounts.len(), 3);
    }

    #[tokio::test]
    async fn reads__work_without_a_session() {
        let wallet = Arc::new(MockWallet::default());
        let gateway = gateway(wallet.clone());
        wallet.seed_games(GameKind::CoinFlip, 3);

        assert_eq!(gateway.game_count(GameKind::CoinFlip).await.unwrap(), 3);
        let entry = gateway.game_entry(GameKind::CoinFlip, 2).await.unwrap();
        assert_eq!(entry.bet.decimals(), Decimals::NATIVE);
        assert_eq!(gateway.token_decimals().await.unwrap(), 12);
        let balance = gateway.token_balance(wallet.account()).await.unwrap();
        assert_eq!(balance.decimals(), Decimals::REWARD_TOKEN);
    }

    proptest! {
        #[test]
        fn validate__range_accepts_exactly_positive_bets_up_to_max(
            max in 1u64..1_000_000,
            bet in 0u64..2_000_000,
        ) {
            let constraint = BetConstraint::Range {
                max: FixedPointAmount::new(U256::from(max), Decimals::NATIVE),
            };
            let amount = FixedPointAmount::new(U256::from(bet), Decimals::NATIVE);

            let valid = constraint.validate(&amount).is_ok();

            prop_assert_eq!(valid, bet > 0 && bet <= max);
        }
    }
}
