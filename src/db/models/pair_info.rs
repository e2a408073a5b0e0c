use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    contracts::{AssetInfo, PairInfo},
    db::schema::{Record, TableSchema, PAIR_INFOS},
};

/// Stored pair registry row. Asset infos are kept as their JSON wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfoData {
    pub pair_addr: String,
    pub first_asset_info: String,
    pub second_asset_info: String,
    pub commission_rate: String,
    pub liquidity_addr: String,
    pub oracle_addr: String,
    pub symbols: String,
}

impl PairInfoData {
    pub fn from_pair_info(info: &PairInfo, symbols: &str) -> anyhow::Result<Self> {
        Ok(Self {
            pair_addr: info.contract_addr.clone(),
            first_asset_info: serde_json::to_string(&info.asset_infos[0])?,
            second_asset_info: serde_json::to_string(&info.asset_infos[1])?,
            commission_rate: info.commission_rate.clone(),
            liquidity_addr: info.liquidity_token.clone(),
            oracle_addr: info.oracle_addr.clone(),
            symbols: symbols.to_string(),
        })
    }

    pub fn asset_infos(&self) -> anyhow::Result<[AssetInfo; 2]> {
        let first = serde_json::from_str(&self.first_asset_info)
            .with_context(|| format!("Invalid first asset info of pair {}", self.pair_addr))?;
        let second = serde_json::from_str(&self.second_asset_info)
            .with_context(|| format!("Invalid second asset info of pair {}", self.pair_addr))?;
        Ok([first, second])
    }
}

impl Record for PairInfoData {
    fn schema() -> &'static TableSchema {
        &PAIR_INFOS
    }
}
