use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use super::asset::Asset;
use crate::utils::bigint_string;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingQueryMsg {
    PoolInfo { staking_token: String },
    RewardsPerSec { staking_token: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolInfoResponse {
    pub staking_token: String,
    #[serde(with = "bigint_string")]
    pub total_bond_amount: BigInt,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardsPerSecResponse {
    pub assets: Vec<Asset>,
}
