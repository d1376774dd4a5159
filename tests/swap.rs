#![allow(non_snake_case)]
use ethers::types::U256;
use ranger_arcade::{
    arcade::SwapReport,
    deployment::Deployment,
    error::ClientError,
    executor::CancelToken,
    gateway::SwapDirection,
    provider::WalletError,
    surface::ActionSurface,
    test_helpers::{
        TestContext,
        TxScript,
    },
};

fn ranger(units: u64) -> U256 {
    U256::from(units) * U256::exp10(12)
}

fn mintme(units: u64) -> U256 {
    U256::from(units) * U256::exp10(18)
}

#[tokio::test]
async fn swap__mintme_to_ranger_needs_no_approval() {
    // given
    let ctx = TestContext::connected().await;
    let wallet = ctx.wallet();
    let tokens_before = wallet.token_balance(wallet.account());

    // when
    let report = ctx
        .arcade()
        .swap(SwapDirection::MintMeToRanger, "1", &CancelToken::default())
        .await
        .unwrap();

    // then
    let SwapReport::Swapped {
        amount_in,
        amount_out,
        ..
    } = report
    else {
        panic!("expected a swap report");
    };
    assert_eq!(amount_in.to_string(), "1");
    assert_eq!(amount_out.to_string(), "2");
    assert_eq!(wallet.send_count(), 1);
    assert_eq!(
        wallet.token_balance(wallet.account()),
        tokens_before + ranger(2)
    );
}

#[tokio::test]
async fn swap__ranger_to_mintme_approves_first() {
    // given
    let ctx = TestContext::connected().await;
    let wallet = ctx.wallet();
    let swap = Deployment::mintme().swap.address;

    // when
    let report = ctx
        .arcade()
        .swap(SwapDirection::RangerToMintMe, "4", &CancelToken::default())
        .await
        .unwrap();

    // then
    let SwapReport::Swapped { amount_out, .. } = report else {
        panic!("expected a swap report");
    };
    assert_eq!(amount_out.raw(), mintme(2));
    assert_eq!(wallet.send_count(), 2);
    assert_eq!(wallet.allowance(wallet.account(), swap), U256::zero());
}

#[tokio::test]
async fn add_liquidity__spends_both_sides() {
    // given
    let ctx = TestContext::connected().await;
    let wallet = ctx.wallet();
    let account = wallet.account();
    let (native_before, tokens_before) =
        (wallet.native_balance(account), wallet.token_balance(account));

    // when
    let report = ctx
        .arcade()
        .add_liquidity("10", "5", &CancelToken::default())
        .await
        .unwrap();

    // then
    assert!(matches!(report, SwapReport::LiquidityAdded { .. }));
    assert_eq!(wallet.send_count(), 2);
    assert_eq!(wallet.token_balance(account), tokens_before - ranger(10));
    assert_eq!(wallet.native_balance(account), native_before - mintme(5));
}

#[tokio::test]
async fn add_liquidity__zero_side_is_invalid() {
    let ctx = TestContext::connected().await;

    let err = ctx
        .arcade()
        .add_liquidity("10", "0", &CancelToken::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::InvalidParams(_)));
    assert_eq!(ctx.wallet().send_count(), 0);
}

#[tokio::test]
async fn swap__declined_in_wallet_frees_the_surface() {
    // given
    let ctx = TestContext::connected().await;
    let arcade = ctx.arcade();
    ctx.wallet().script_next(TxScript::RejectSend(WalletError::rpc(
        4001,
        "User denied transaction signature.",
    )));

    // when
    let err = arcade
        .swap(SwapDirection::MintMeToRanger, "1", &CancelToken::default())
        .await
        .unwrap_err();

    // then
    assert!(matches!(err, ClientError::UserRejected(_)));
    assert!(!arcade.is_busy(ActionSurface::Swap));
    let retry = arcade
        .swap(SwapDirection::MintMeToRanger, "1", &CancelToken::default())
        .await;
    assert!(retry.is_ok());
}
