use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    db::schema::{Record, TableSchema, SWAP_OPERATIONS},
    utils::bigint_string,
};

/// One swap hop. Multi-hop router swaps produce one row per hop sharing
/// the same `txhash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapOperation {
    pub unique_key: String,
    pub txhash: String,
    pub txheight: u64,
    pub timestamp: i64,
    pub pair_addr: String,
    pub sender: String,
    pub offer_denom: String,
    #[serde(with = "bigint_string")]
    pub offer_amount: BigInt,
    pub ask_denom: String,
    #[serde(with = "bigint_string")]
    pub return_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub tax_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub commission_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub spread_amount: BigInt,
    /// Offer amount valued in micro-USDT
    #[serde(with = "bigint_string")]
    pub volume_usdt: BigInt,
    /// Commission valued in micro-USDT
    #[serde(with = "bigint_string")]
    pub commission_usdt: BigInt,
}

impl Record for SwapOperation {
    fn schema() -> &'static TableSchema {
        &SWAP_OPERATIONS
    }
}
