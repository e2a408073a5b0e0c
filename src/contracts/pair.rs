use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use super::asset::{Asset, AssetInfo};
use crate::utils::bigint_string;

/// Pair contract metadata as returned by the factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfo {
    pub asset_infos: [AssetInfo; 2],
    pub contract_addr: String,
    pub liquidity_token: String,
    #[serde(default)]
    pub oracle_addr: String,
    #[serde(default = "default_commission_rate")]
    pub commission_rate: String,
}

fn default_commission_rate() -> String {
    "0.003".to_string()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairQueryMsg {
    Pool {},
}

/// Reserves and LP supply of a pair at some height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolResponse {
    pub assets: Vec<Asset>,
    #[serde(with = "bigint_string")]
    pub total_share: BigInt,
}

impl PoolResponse {
    /// Empty pool for pairs that did not exist at the queried height.
    pub fn empty(asset_infos: &[AssetInfo; 2]) -> Self {
        Self {
            assets: asset_infos
                .iter()
                .map(|info| Asset { info: info.clone(), amount: BigInt::zero() })
                .collect(),
            total_share: BigInt::zero(),
        }
    }

    /// Reserve of `denom`, zero if the pool does not hold it.
    pub fn amount_of(&self, denom: &str) -> BigInt {
        self.assets
            .iter()
            .find(|asset| asset.info.denom() == denom)
            .map(|asset| asset.amount.clone())
            .unwrap_or_else(BigInt::zero)
    }
}
