use anyhow::{Context, Result};
use log::debug;
use num_bigint::BigInt;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::{
    contracts::{Asset, PairInfo, PoolResponse},
    db::models::PoolAmountHistory,
    worker::chain_client::ChainQuerier,
};

/// Reserves of the registered pairs at one height, keyed by pair address.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    pub height: u64,
    pools: FxHashMap<String, PoolResponse>,
}

impl PoolSnapshot {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            pools: FxHashMap::default(),
        }
    }

    pub fn insert(&mut self, pair_addr: String, pool: PoolResponse) {
        self.pools.insert(pair_addr, pool);
    }

    pub fn get(&self, pair_addr: &str) -> Option<&PoolResponse> {
        self.pools.get(pair_addr)
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Rebuild a snapshot from stored pool amount rows.
    pub fn from_history(pairs: &[PairInfo], rows: &[PoolAmountHistory], height: u64) -> Self {
        let mut snapshot = Self::new(height);
        for pair in pairs {
            let pool = match rows.iter().find(|row| row.pair_addr == pair.contract_addr) {
                Some(row) => pool_from_amounts(pair, row),
                None => PoolResponse::empty(&pair.asset_infos),
            };
            snapshot.insert(pair.contract_addr.clone(), pool);
        }
        snapshot
    }

    /// Copy of this snapshot with the latest row of every pair applied.
    pub fn with_history(&self, pairs: &[PairInfo], rows: &[PoolAmountHistory]) -> Self {
        let mut snapshot = self.clone();
        for row in rows {
            if let Some(pair) = pairs.iter().find(|p| p.contract_addr == row.pair_addr) {
                snapshot.insert(row.pair_addr.clone(), pool_from_amounts(pair, row));
                snapshot.height = snapshot.height.max(row.height);
            }
        }
        snapshot
    }
}

fn pool_from_amounts(pair: &PairInfo, row: &PoolAmountHistory) -> PoolResponse {
    let [first, second] = &pair.asset_infos;
    PoolResponse {
        assets: vec![
            Asset {
                info: first.clone(),
                amount: row.offer_pool_amount.clone(),
            },
            Asset {
                info: second.clone(),
                amount: row.ask_pool_amount.clone(),
            },
        ],
        total_share: row.total_share.clone(),
    }
}

/// Loads pair reserves at a given height with one batched query.
#[derive(Clone)]
pub struct PoolStateResolver {
    querier: Arc<dyn ChainQuerier>,
}

impl PoolStateResolver {
    pub fn new(querier: Arc<dyn ChainQuerier>) -> Self {
        Self { querier }
    }

    /// Absent pools (failed or missing results) resolve to zero reserves.
    /// Only a failure of the batched query itself is an error.
    pub async fn resolve(&self, pairs: &[PairInfo], height: u64) -> Result<PoolSnapshot> {
        let pair_addrs: Vec<String> = pairs.iter().map(|p| p.contract_addr.clone()).collect();
        let results = self
            .querier
            .query_pools(&pair_addrs, height)
            .await
            .with_context(|| format!("Failed to query pool reserves at height {}", height))?;

        let mut snapshot = PoolSnapshot::new(height);
        let mut results = results.into_iter();
        for pair in pairs {
            let pool = match results.next().flatten() {
                Some(pool) => pool,
                None => {
                    debug!("Pool {} absent at height {}", pair.contract_addr, height);
                    PoolResponse::empty(&pair.asset_infos)
                },
            };
            snapshot.insert(pair.contract_addr.clone(), pool);
        }

        Ok(snapshot)
    }
}

/// Reserves of a pair's two assets in base/quote order.
pub fn pair_reserves(pair: &PairInfo, pool: &PoolResponse) -> (BigInt, BigInt) {
    (
        pool.amount_of(pair.asset_infos[0].denom()),
        pool.amount_of(pair.asset_infos[1].denom()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{pair, pool, FakeQuerier};
    use num_traits::Zero;

    #[tokio::test]
    async fn test_resolve_maps_results_positionally() {
        let pairs = vec![pair("orai1a", "orai", "orai1usdt"), pair("orai1b", "orai", "uatom")];
        let querier = FakeQuerier::default();
        // only the first pool answers
        querier.set_pool("orai1a", pool("orai", 10, "orai1usdt", 20, 14));

        let snapshot = PoolStateResolver::new(Arc::new(querier))
            .resolve(&pairs, 100)
            .await
            .unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("orai1a").unwrap().amount_of("orai1usdt"), BigInt::from(20));
        let absent = snapshot.get("orai1b").unwrap();
        assert!(absent.total_share.is_zero());
        assert_eq!(absent.assets.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_fails_on_transport_error() {
        let querier = FakeQuerier::default();
        querier.fail_pools(true);
        let result = PoolStateResolver::new(Arc::new(querier))
            .resolve(&[pair("orai1a", "orai", "orai1usdt")], 1)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_with_history_applies_latest_rows() {
        let pairs = vec![pair("orai1a", "orai", "orai1usdt")];
        let snapshot = PoolSnapshot::from_history(&pairs, &[], 5);
        assert!(snapshot.get("orai1a").unwrap().total_share.is_zero());

        let row = PoolAmountHistory {
            unique_key: "1-orai1a".to_string(),
            pair_addr: "orai1a".to_string(),
            offer_pool_amount: BigInt::from(3),
            ask_pool_amount: BigInt::from(4),
            total_share: BigInt::from(5),
            height: 9,
            timestamp: 1,
        };
        let updated = snapshot.with_history(&pairs, &[row]);
        assert_eq!(updated.height, 9);
        let (base, quote) = pair_reserves(&pairs[0], updated.get("orai1a").unwrap());
        assert_eq!((base, quote), (BigInt::from(3), BigInt::from(4)));
    }
}
