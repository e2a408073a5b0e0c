use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    db::schema::{Record, TableSchema, POOL_APR},
    utils::bigint_string,
};

/// APR snapshot of a pair's staking pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolApr {
    pub unique_key: String,
    pub pair_addr: String,
    #[serde(with = "bigint_string")]
    pub total_supply: BigInt,
    #[serde(with = "bigint_string")]
    pub total_bond_amount: BigInt,
    /// JSON list of reward assets per second
    pub reward_per_sec: String,
    pub apr: f64,
    pub height: u64,
    pub timestamp: i64,
}

impl Record for PoolApr {
    fn schema() -> &'static TableSchema {
        &POOL_APR
    }
}
