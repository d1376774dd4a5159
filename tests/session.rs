#![allow(non_snake_case)]
use ethers::types::Address;
use ranger_arcade::{
    arcade::Arcade,
    deployment::{
        Deployment,
        MINTME_CHAIN_ID,
    },
    error::ClientError,
    executor::{
        CancelToken,
        WaitBudget,
    },
    provider::WalletError,
    store::SessionStore,
    test_helpers::{
        MockWallet,
        TestContext,
    },
};
use std::{
    sync::Arc,
    time::Duration,
};
use tempdir::TempDir;

fn arcade_with_store(wallet: Arc<MockWallet>, dir: &TempDir) -> Arcade {
    Arcade::new(
        wallet,
        Deployment::mintme(),
        Some(SessionStore::new(dir.path()).unwrap()),
        WaitBudget::new(Duration::from_millis(200)).with_poll_interval(Duration::from_millis(5)),
    )
}

#[tokio::test]
async fn connect__loads_constraints_history_and_balances() {
    let ctx = TestContext::new();
    let arcade = ctx.arcade();

    let session = arcade.connect().await.unwrap();

    assert_eq!(session.account, ctx.wallet().account());
    assert_eq!(session.chain_id, MINTME_CHAIN_ID);
    assert!(arcade.cached_constraints().is_some());
    let balances = arcade.balances();
    assert_eq!(balances.native.unwrap().to_string(), "1000");
    assert_eq!(balances.token.unwrap().to_string(), "1000");
}

#[tokio::test]
async fn connect__declined_request_is_user_rejected() {
    let ctx = TestContext::new();
    ctx.wallet().fail_next_request_accounts(WalletError::rpc(4001, "User rejected the request."));

    let err = ctx.arcade().connect().await.unwrap_err();

    assert!(matches!(err, ClientError::UserRejected(_)));
    assert!(ctx.arcade().session().is_none());
}

#[tokio::test]
async fn restore__reuses_cached_account_without_prompting() {
    // given
    let dir = TempDir::new("ranger-session").unwrap();
    let wallet = Arc::new(MockWallet::default());
    arcade_with_store(wallet.clone(), &dir).connect().await.unwrap();
    assert_eq!(wallet.request_accounts_count(), 1);

    // when
    let restored = arcade_with_store(wallet.clone(), &dir)
        .restore()
        .await
        .unwrap();

    // then
    assert_eq!(restored.map(|s| s.account), Some(wallet.account()));
    assert_eq!(wallet.request_accounts_count(), 1);
}

#[tokio::test]
async fn restore__without_cache_stays_disconnected() {
    let dir = TempDir::new("ranger-session").unwrap();
    let wallet = Arc::new(MockWallet::default());

    let restored = arcade_with_store(wallet.clone(), &dir).restore().await.unwrap();

    assert!(restored.is_none());
    assert_eq!(wallet.call_count(), 0);
}

#[tokio::test]
async fn disconnect__clears_session_without_provider_calls() {
    // given
    let dir = TempDir::new("ranger-session").unwrap();
    let wallet = Arc::new(MockWallet::default());
    let arcade = arcade_with_store(wallet.clone(), &dir);
    arcade.connect().await.unwrap();
    let calls = wallet.call_count();

    // when
    arcade.disconnect();

    // then
    assert_eq!(wallet.call_count(), calls);
    assert!(arcade.session().is_none());
    assert!(arcade.balances().native.is_none());
    let err = arcade
        .play_coin_flip("1", &CancelToken::default())
        .await
        .unwrap_err();
    assert_eq!(err, ClientError::NotConnected);
    let restored = arcade_with_store(wallet, &dir).restore().await.unwrap();
    assert!(restored.is_none());
}

#[tokio::test]
async fn on_external_account_change__replaces_the_signer() {
    // given
    let ctx = TestContext::connected().await;
    let arcade = ctx.arcade();
    let old_signer = arcade.chain_session().signer().unwrap();
    let other = Address::repeat_byte(0x33);

    // when
    let session = arcade.on_external_account_change(Some(other)).unwrap();

    // then
    assert_eq!(session.account, other);
    assert!(!arcade.chain_session().is_current(&old_signer));
    assert!(arcade.cached_constraints().is_none());
}

#[tokio::test]
async fn on_external_account_change__empty_list_disconnects() {
    let ctx = TestContext::connected().await;
    let arcade = ctx.arcade();

    assert!(arcade.on_external_account_change(None).is_none());

    assert!(arcade.session().is_none());
}

#[tokio::test]
async fn connect__adds_unknown_network_then_switches_once_more() {
    // given
    let ctx = TestContext::new();
    let wallet = ctx.wallet();
    wallet.set_current_chain(1);
    wallet.forget_network(MINTME_CHAIN_ID);

    // when
    let session = ctx.arcade().connect().await.unwrap();

    // then
    assert_eq!(wallet.add_count(), 1);
    assert_eq!(wallet.switch_count(), 2);
    assert_eq!(wallet.current_chain(), MINTME_CHAIN_ID);
    assert_eq!(
        ctx.arcade().session().map(|s| s.chain_id),
        Some(MINTME_CHAIN_ID)
    );
    assert_eq!(session.account, wallet.account());
}

#[tokio::test]
async fn connect__gives_up_after_one_retry_when_network_stays_unknown() {
    // given
    let ctx = TestContext::new();
    let wallet = ctx.wallet();
    wallet.set_current_chain(1);
    wallet.forget_network(MINTME_CHAIN_ID);
    wallet.ignore_added_networks();

    // when
    let err = ctx.arcade().connect().await.unwrap_err();

    // then
    assert!(matches!(err, ClientError::SwitchRejected(_)));
    assert_eq!(wallet.add_count(), 1);
    assert_eq!(wallet.switch_count(), 2);
    assert_eq!(wallet.current_chain(), 1);
}
