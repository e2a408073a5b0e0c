use anyhow::{Context, Result};
use log::{info, warn};
use moka::future::Cache;
use once_cell::sync::Lazy;
use std::sync::Arc;

use crate::{
    contracts::{AssetInfo, PairInfo},
    db::{insert_records, models::PairInfoData, schema::PAIR_INFOS, Storage},
    worker::chain_client::ChainQuerier,
};

pub const ORAI: &str = "orai";
pub const USDT_CW20: &str = "orai12hzjxfh77wl572gdzct2fxv2arxcwh6gykc7qh";

const AIRI_CW20: &str = "orai10ldgzued6zjp0mkqwsv2mux3ml50l97c74x8sg";
const ORAIX_CW20: &str = "orai1lus0f0rhx8s03gdllx2n6vhkmf0536dv57wfge";
const SCORAI_CW20: &str = "orai1065qe48g7aemju045aeyprflytemx7kecxkf5m7u5h5mphd0qlcs47pclp";
const ATOM_IBC: &str = "ibc/A2E2EEC9057A4A1C2C0A6A4C78B0239118DF5F278830F50B4A6BDD7A66506B78";
const KWT_CW20: &str = "orai1nd4r053e3kgedgld2ymen8l9yrw8xpjyaal7j5";
const OSMO_IBC: &str = "ibc/9C4DCD21B48231D0BC2AC3D1B74A864746B37E4292694C93C617324250D002FC";
const MILKY_CW20: &str = "orai1gzvndtzceqwfymu2kqhta2jn6gmzxvzqwdgvjw";
const USDC_CW20: &str = "orai15un8msx3n5zf9ahlxmfeqd2kwa5wm0nrpxer304m9nd5q6qq0g6sku5pdd";
const WTRX_CW20: &str = "orai1c7tpjenafvgjtgm9aqwm7afnke6c56hpdms8jc6md40xs3ugd0es5encn0";
const SCATOM_CW20: &str = "orai19q4qak2g3cj2xc2y3060t0quzn3gfhzx08rjlrdd3vqxhjtat0cq668phq";

/// A pair the indexer tracks: asset infos in base/quote order.
#[derive(Debug, Clone)]
pub struct PairMapping {
    pub asset_infos: [AssetInfo; 2],
    pub symbols: &'static str,
}

impl PairMapping {
    /// Order-insensitive match on the asset denoms.
    pub fn matches(&self, asset_infos: &[AssetInfo; 2]) -> bool {
        let [a, b] = &self.asset_infos;
        let [x, y] = asset_infos;
        (a.denom() == x.denom() && b.denom() == y.denom())
            || (a.denom() == y.denom() && b.denom() == x.denom())
    }
}

fn mapping(base: AssetInfo, quote: AssetInfo, symbols: &'static str) -> PairMapping {
    PairMapping {
        asset_infos: [base, quote],
        symbols,
    }
}

pub static PAIRS: Lazy<Vec<PairMapping>> = Lazy::new(|| {
    let orai = AssetInfo::native(ORAI);
    vec![
        mapping(AssetInfo::token(AIRI_CW20), orai.clone(), "AIRI/ORAI"),
        mapping(AssetInfo::token(ORAIX_CW20), orai.clone(), "ORAIX/ORAI"),
        mapping(AssetInfo::token(SCORAI_CW20), orai.clone(), "scORAI/ORAI"),
        mapping(orai.clone(), AssetInfo::native(ATOM_IBC), "ORAI/ATOM"),
        mapping(orai.clone(), AssetInfo::token(USDT_CW20), "ORAI/USDT"),
        mapping(AssetInfo::token(KWT_CW20), orai.clone(), "KWT/ORAI"),
        mapping(orai.clone(), AssetInfo::native(OSMO_IBC), "ORAI/OSMO"),
        mapping(AssetInfo::token(MILKY_CW20), AssetInfo::token(USDT_CW20), "MILKY/USDT"),
        mapping(orai.clone(), AssetInfo::token(USDC_CW20), "ORAI/USDC"),
        mapping(orai, AssetInfo::token(WTRX_CW20), "ORAI/WTRX"),
        mapping(AssetInfo::token(SCATOM_CW20), AssetInfo::native(ATOM_IBC), "scATOM/ATOM"),
    ]
});

/// Keep the factory pairs that match a tracked mapping, rewritten to the
/// mapping's base/quote order. Later factories win when two list the
/// same assets.
pub fn reconcile(factory_pairs: &[PairInfo]) -> Vec<(PairInfo, &'static str)> {
    let mut matched: Vec<Option<PairInfo>> = vec![None; PAIRS.len()];

    for pair in factory_pairs {
        if let Some(index) = PAIRS.iter().position(|m| m.matches(&pair.asset_infos)) {
            matched[index] = Some(PairInfo {
                asset_infos: PAIRS[index].asset_infos.clone(),
                ..pair.clone()
            });
        }
    }

    matched
        .into_iter()
        .zip(PAIRS.iter())
        .filter_map(|(pair, mapping)| pair.map(|p| (p, mapping.symbols)))
        .collect()
}

/// Tracked pairs, keyed by pair contract address.
pub struct PairRegistry {
    querier: Arc<dyn ChainQuerier>,
    storage: Arc<dyn Storage>,
    factories: Vec<String>,
    pairs: Cache<String, PairInfo>,
}

impl PairRegistry {
    pub fn new(
        querier: Arc<dyn ChainQuerier>,
        storage: Arc<dyn Storage>,
        factories: Vec<String>,
    ) -> Self {
        let pairs = Cache::builder().max_capacity(1_000).build();

        Self {
            querier,
            storage,
            factories,
            pairs,
        }
    }

    /// List every factory, reconcile against the tracked pairs and persist
    /// the result when the stored pair count differs.
    pub async fn refresh(&self) -> Result<Vec<PairInfo>> {
        let mut factory_pairs = Vec::new();
        for factory in &self.factories {
            let pairs = self
                .querier
                .query_factory_pairs(factory)
                .await
                .with_context(|| format!("Failed to list pairs of factory {}", factory))?;
            factory_pairs.extend(pairs);
        }

        let reconciled = reconcile(&factory_pairs);
        if reconciled.len() < PAIRS.len() {
            warn!(
                "Only {}/{} tracked pairs found on the factories",
                reconciled.len(),
                PAIRS.len()
            );
        }

        let stored = self.storage.count_rows(&PAIR_INFOS).await?;
        if stored != reconciled.len() as u64 {
            let rows = reconciled
                .iter()
                .map(|(pair, symbols)| PairInfoData::from_pair_info(pair, symbols))
                .collect::<Result<Vec<_>>>()?;
            insert_records(self.storage.as_ref(), &rows).await?;
            info!("Stored {} pair infos (previously {})", rows.len(), stored);
        }

        self.pairs.invalidate_all();
        for (pair, _) in &reconciled {
            self.pairs.insert(pair.contract_addr.clone(), pair.clone()).await;
        }

        Ok(reconciled.into_iter().map(|(pair, _)| pair).collect())
    }

    /// Every registered pair in tracked-list order.
    pub fn pairs(&self) -> Vec<PairInfo> {
        let mut pairs: Vec<PairInfo> = self.pairs.iter().map(|(_, pair)| pair).collect();
        pairs.sort_by_key(|pair| {
            PAIRS
                .iter()
                .position(|m| m.matches(&pair.asset_infos))
                .unwrap_or(usize::MAX)
        });
        pairs
    }
}

pub fn find_by_denoms<'a>(pairs: &'a [PairInfo], a: &str, b: &str) -> Option<&'a PairInfo> {
    pairs.iter().find(|pair| {
        let [x, y] = &pair.asset_infos;
        (x.denom() == a && y.denom() == b) || (x.denom() == b && y.denom() == a)
    })
}

pub fn find_by_address<'a>(pairs: &'a [PairInfo], pair_addr: &str) -> Option<&'a PairInfo> {
    pairs.iter().find(|pair| pair.contract_addr == pair_addr)
}

pub fn find_by_liquidity_token<'a>(pairs: &'a [PairInfo], lp_token: &str) -> Option<&'a PairInfo> {
    pairs.iter().find(|pair| pair.liquidity_token == lp_token)
}
