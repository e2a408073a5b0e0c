use serde::{Deserialize, Serialize};

use super::{asset::AssetInfo, pair::PairInfo};

/// Page size used when listing pairs.
pub const PAIRS_PAGE_LIMIT: u32 = 30;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FactoryQueryMsg {
    Pairs {
        #[serde(skip_serializing_if = "Option::is_none")]
        start_after: Option<[AssetInfo; 2]>,
        limit: Option<u32>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairsResponse {
    pub pairs: Vec<PairInfo>,
}
