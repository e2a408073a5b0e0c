use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    db::schema::{Record, TableSchema, EARNING_OPERATIONS, STAKING_OPERATIONS},
    utils::bigint_string,
};

/// LP tokens bonded into the staking contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakingOperation {
    pub unique_key: String,
    pub txhash: String,
    pub txheight: u64,
    pub timestamp: i64,
    pub staker_address: String,
    pub staking_asset_denom: String,
    #[serde(with = "bigint_string")]
    pub stake_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub stake_amount_in_usdt: BigInt,
}

impl Record for StakingOperation {
    fn schema() -> &'static TableSchema {
        &STAKING_OPERATIONS
    }
}

/// Rewards claimed from a staking pool, one row per reward asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningOperation {
    pub unique_key: String,
    pub txhash: String,
    pub txheight: u64,
    pub timestamp: i64,
    pub staker_address: String,
    pub staking_asset_denom: String,
    pub reward_asset_denom: String,
    #[serde(with = "bigint_string")]
    pub earn_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub earn_amount_in_usdt: BigInt,
}

impl Record for EarningOperation {
    fn schema() -> &'static TableSchema {
        &EARNING_OPERATIONS
    }
}
