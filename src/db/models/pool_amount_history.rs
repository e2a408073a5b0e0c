use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    db::schema::{Record, TableSchema, POOL_AMOUNT_HISTORY},
    utils::bigint_string,
};

/// Reserves of a pair at a point in time. `offer_pool_amount` is the
/// reserve of the pair's first asset, `ask_pool_amount` of the second.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolAmountHistory {
    pub unique_key: String,
    pub pair_addr: String,
    #[serde(with = "bigint_string")]
    pub offer_pool_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub ask_pool_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub total_share: BigInt,
    pub height: u64,
    pub timestamp: i64,
}

impl Record for PoolAmountHistory {
    fn schema() -> &'static TableSchema {
        &POOL_AMOUNT_HISTORY
    }
}
