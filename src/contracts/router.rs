use serde::Deserialize;

use super::asset::AssetInfo;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapOperation {
    OraiSwap {
        offer_asset_info: AssetInfo,
        ask_asset_info: AssetInfo,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteSwapOperations {
    pub operations: Vec<SwapOperation>,
    #[serde(default)]
    pub minimum_receive: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}
