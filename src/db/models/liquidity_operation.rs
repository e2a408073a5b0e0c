use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    db::schema::{Record, TableSchema, LIQUIDITY_OPERATIONS},
    utils::bigint_string,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidityOpType {
    Provide,
    Withdraw,
}

/// Provide or withdraw liquidity on a pair.
///
/// `first_token_lp` / `second_token_lp` hold the pair's accumulated pool
/// amounts right after this operation; `tax_rate` is the withdraw fee in
/// micro-USDT (zero for provides).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityOperation {
    pub unique_key: String,
    pub txhash: String,
    pub txheight: u64,
    pub timestamp: i64,
    pub pair_addr: String,
    pub tx_creator: String,
    pub op_type: LiquidityOpType,
    pub first_token_denom: String,
    #[serde(with = "bigint_string")]
    pub first_token_amount: BigInt,
    pub second_token_denom: String,
    #[serde(with = "bigint_string")]
    pub second_token_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub lp_share: BigInt,
    #[serde(with = "bigint_string")]
    pub first_token_lp: BigInt,
    #[serde(with = "bigint_string")]
    pub second_token_lp: BigInt,
    #[serde(with = "bigint_string")]
    pub tax_rate: BigInt,
}

impl Record for LiquidityOperation {
    fn schema() -> &'static TableSchema {
        &LIQUIDITY_OPERATIONS
    }
}
