use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use super::PairInfoData;
use crate::utils::bigint_string;

/// Base/quote volume of a pair within one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeRange {
    pub time: i64,
    pub pair: String,
    #[serde(with = "bigint_string")]
    pub base_volume: BigInt,
    #[serde(with = "bigint_string")]
    pub quote_volume: BigInt,
}

/// Current state of a pool as listed by the read API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolOverview {
    pub pair: PairInfoData,
    #[serde(with = "bigint_string")]
    pub offer_pool_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub ask_pool_amount: BigInt,
    #[serde(with = "bigint_string")]
    pub total_share: BigInt,
    pub apr: f64,
    /// Swap volume of the last 24 hours in micro-USDT
    #[serde(with = "bigint_string")]
    pub volume_24h: BigInt,
    /// Swap commission plus withdraw fees of the last 7 days in micro-USDT
    #[serde(with = "bigint_string")]
    pub fee_7_days: BigInt,
}

/// Per-denom totals of an address (staked or earned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenomAmount {
    pub denom: String,
    #[serde(with = "bigint_string")]
    pub amount: BigInt,
    #[serde(with = "bigint_string")]
    pub amount_in_usdt: BigInt,
}
