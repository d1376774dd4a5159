use crate::{
    amount::FixedPointAmount,
    error::ClientError,
    gateway::{
        ContractGateway,
        GameKind,
    },
};
use ethers::types::Address;
use futures::future::try_join_all;
use std::{
    collections::VecDeque,
    sync::{
        Mutex,
        MutexGuard,
    },
};

pub const HISTORY_DEPTH: usize = 10;

/// One play as recorded by the game contract.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameRecord {
    pub player: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub bet: FixedPointAmount,
    pub prize: FixedPointAmount,
    pub won: bool,
}

/// The most recent plays of one game, newest first.
pub struct GameHistoryCache {
    game: GameKind,
    records: Mutex<VecDeque<GameRecord>>,
}

impl GameHistoryCache {
    pub fn new(game: GameKind) -> Self {
        Self {
            game,
            records: Mutex::new(VecDeque::with_capacity(HISTORY_DEPTH + 1)),
        }
    }

    pub fn game(&self) -> GameKind {
        self.game
    }

    /// Replaces the cache with the last `HISTORY_DEPTH` entries read from the contract.
    pub async fn refresh_full(
        &self,
        gateway: &ContractGateway,
    ) -> Result<Vec<GameRecord>, ClientError> {
        let count = gateway.game_count(self.game).await?;
        let start = count.saturating_sub(HISTORY_DEPTH as u64);
        let reads = (start..count)
            .rev()
            .map(|index| gateway.game_entry(self.game, index));
        let records = try_join_all(reads).await?;
        *self.lock() = records.iter().cloned().collect();
        Ok(records)
    }

    pub fn prepend_one(&self, record: GameRecord) {
        let mut records = self.lock();
        records.push_front(record);
        records.truncate(HISTORY_DEPTH);
    }

    pub fn snapshot(&self) -> Vec<GameRecord> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<GameRecord>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        amount::Decimals,
        deployment::{
            Deployment,
            GasCeilings,
        },
        executor::TransactionExecutor,
        test_helpers::MockWallet,
    };
    use ethers::types::U256;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn record(block_number: u64) -> GameRecord {
        GameRecord {
            player: Address::repeat_byte(1),
            block_number,
            block_timestamp: 1_700_000_000 + block_number,
            bet: FixedPointAmount::new(U256::from(block_number), Decimals::NATIVE),
            prize: FixedPointAmount::zero(Decimals::NATIVE),
            won: false,
        }
    }

    fn gateway(wallet: Arc<MockWallet>) -> ContractGateway {
        let executor = Arc::new(TransactionExecutor::new(wallet.clone(), GasCeilings::default()));
        ContractGateway::new(wallet, executor, Deployment::mintme())
    }

    #[tokio::test]
    async fn refresh_full__reads_last_entries_newest_first() {
        // given
        let wallet = Arc::new(MockWallet::default());
        wallet.seed_games(GameKind::CoinFlip, 14);
        let gateway = gateway(wallet.clone());
        let cache = GameHistoryCache::new(GameKind::CoinFlip);

        // when
        let records = cache.refresh_full(&gateway).await.unwrap();

        // then
        assert_eq!(records.len(), HISTORY_DEPTH);
        let blocks: Vec<_> = records.iter().map(|r| r.block_number).collect();
        let mut sorted = blocks.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(blocks, sorted);
        assert_eq!(cache.snapshot(), records);
    }

    #[tokio::test]
    async fn refresh_full__is_idempotent_without_new_plays() {
        let wallet = Arc::new(MockWallet::default());
        wallet.seed_games(GameKind::Slots, 4);
        let gateway = gateway(wallet);
        let cache = GameHistoryCache::new(GameKind::Slots);

        let first = cache.refresh_full(&gateway).await.unwrap();
        let second = cache.refresh_full(&gateway).await.unwrap();

        assert_eq!(first.len(), 4);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn refresh_full__handles_empty_game() {
        let wallet = Arc::new(MockWallet::default());
        let cache = GameHistoryCache::new(GameKind::CoinFlip);
        assert!(cache.refresh_full(&gateway(wallet)).await.unwrap().is_empty());
        assert!(cache.is_empty());
    }

    proptest! {
        #[test]
        fn prepend_one__puts_new_record_first_and_caps_length(
            existing in 0usize..15,
        ) {
            // given
            let cache = GameHistoryCache::new(GameKind::CoinFlip);
            for block in 0..existing as u64 {
                cache.prepend_one(record(block));
            }
            let before = cache.snapshot();

            // when
            cache.prepend_one(record(1_000));

            // then
            let after = cache.snapshot();
            prop_assert_eq!(after.len(), (before.len() + 1).min(HISTORY_DEPTH));
            prop_assert_eq!(after[0].block_number, 1_000);
            prop_assert_eq!(&after[1..], &before[..after.len() - 1]);
        }
    }
}
