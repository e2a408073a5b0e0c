use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, warn};
use num_bigint::BigInt;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::{
    config::ChainSettings,
    contracts::{
        AggregateResponse, Asset, Call, Cw20QueryMsg, FactoryQueryMsg, MulticallQueryMsg,
        PairInfo, PairQueryMsg, PairsResponse, PoolInfoResponse, PoolResponse,
        RewardsPerSecResponse, StakingQueryMsg, TokenInfoResponse, PAIRS_PAGE_LIMIT,
    },
};

/// Read-only contract queries the indexer needs from the chain.
///
/// Every height-bound query is answered as of that block.
#[async_trait]
pub trait ChainQuerier: Send + Sync {
    /// Reserves of every pair at `height`, positionally aligned with
    /// `pair_addrs`. `None` means the pool did not answer (absent).
    async fn query_pools(&self, pair_addrs: &[String], height: u64)
        -> Result<Vec<Option<PoolResponse>>>;

    /// Every pair registered in a factory, across all pages.
    async fn query_factory_pairs(&self, factory: &str) -> Result<Vec<PairInfo>>;

    async fn query_token_supply(&self, token: &str, height: u64) -> Result<BigInt>;

    /// Total amount of `staking_token` bonded in the staking contract.
    async fn query_total_bond(&self, staking_token: &str, height: u64) -> Result<BigInt>;

    async fn query_rewards_per_sec(&self, staking_token: &str, height: u64) -> Result<Vec<Asset>>;
}

/// Maximum retries for a single smart query
const MAX_RETRIES: u32 = 3;

/// Delay between retries (exponential backoff base)
const RETRY_DELAY_MS: u64 = 100;

/// Pairs per multicall `aggregate` request
const MULTICALL_BATCH_SIZE: usize = 20;

const HEIGHT_HEADER: &str = "x-cosmos-block-height";

#[derive(Deserialize)]
struct SmartQueryResponse<T> {
    data: T,
}

/// [`ChainQuerier`] over the LCD smart-query endpoint.
#[derive(Clone)]
pub struct LcdClient {
    http: Client,
    lcd_url: Url,
    multicall_address: String,
    staking_address: String,
}

impl LcdClient {
    pub fn new(settings: &ChainSettings) -> Result<Self> {
        let lcd_url = Url::parse(&settings.lcd_url).context("Invalid LCD URL")?;
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            lcd_url,
            multicall_address: settings.multicall_address.clone(),
            staking_address: settings.staking_address.clone(),
        })
    }

    fn smart_query_url(&self, contract: &str, msg: &impl Serialize) -> Result<Url> {
        let encoded = STANDARD.encode(serde_json::to_vec(msg)?);
        let mut url = self.lcd_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("LCD URL {} cannot be a base", self.lcd_url))?
            .pop_if_empty()
            .extend(["cosmwasm", "wasm", "v1", "contract", contract, "smart", &encoded]);
        Ok(url)
    }

    /// Smart query with retry. `height` pins the query to a past block.
    async fn smart_query<Q, R>(&self, contract: &str, msg: &Q, height: Option<u64>) -> Result<R>
    where
        Q: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = self.smart_query_url(contract, msg)?;
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match self.send_query::<R>(url.clone(), height).await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    debug!(
                        "Smart query to {} failed (attempt {}/{}): {:#}",
                        contract,
                        attempt + 1,
                        MAX_RETRIES,
                        e
                    );
                    last_error = Some(e);
                    if attempt < MAX_RETRIES - 1 {
                        let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(attempt));
                        tokio::time::sleep(delay).await;
                    }
                },
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("no attempt made"))
            .context(format!("Smart query to {} failed", contract)))
    }

    async fn send_query<R: DeserializeOwned>(&self, url: Url, height: Option<u64>) -> Result<R> {
        let mut request = self.http.get(url);
        if let Some(height) = height {
            request = request.header(HEIGHT_HEADER, height.to_string());
        }
        let response = request.send().await?.error_for_status()?;
        let body: SmartQueryResponse<R> = response.json().await?;
        Ok(body.data)
    }

    async fn aggregate_pools(
        &self,
        pair_addrs: &[String],
        height: u64,
    ) -> Result<Vec<Option<PoolResponse>>> {
        let pool_msg = STANDARD.encode(serde_json::to_vec(&PairQueryMsg::Pool {})?);
        let queries = pair_addrs
            .iter()
            .map(|address| Call {
                address: address.clone(),
                data: pool_msg.clone(),
            })
            .collect();

        let response: AggregateResponse = self
            .smart_query(
                &self.multicall_address,
                &MulticallQueryMsg::Aggregate { queries },
                Some(height),
            )
            .await?;

        // Keep index alignment with the requested pairs
        Ok(pair_addrs
            .iter()
            .enumerate()
            .map(|(i, pair_addr)| {
                let result = response.return_data.get(i).filter(|r| r.success)?;
                match decode_call_data::<PoolResponse>(&result.data) {
                    Ok(pool) => Some(pool),
                    Err(e) => {
                        warn!("Undecodable pool response for {}: {:#}", pair_addr, e);
                        None
                    },
                }
            })
            .collect())
    }
}

fn decode_call_data<T: DeserializeOwned>(data: &str) -> Result<T> {
    let bytes = STANDARD.decode(data).context("Invalid base64 in multicall result")?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ChainQuerier for LcdClient {
    async fn query_pools(
        &self,
        pair_addrs: &[String],
        height: u64,
    ) -> Result<Vec<Option<PoolResponse>>> {
        let mut pools = Vec::with_capacity(pair_addrs.len());
        for chunk in pair_addrs.chunks(MULTICALL_BATCH_SIZE) {
            pools.extend(self.aggregate_pools(chunk, height).await?);
        }
        Ok(pools)
    }

    async fn query_factory_pairs(&self, factory: &str) -> Result<Vec<PairInfo>> {
        let mut pairs: Vec<PairInfo> = Vec::new();
        loop {
            let msg = FactoryQueryMsg::Pairs {
                start_after: pairs.last().map(|p| p.asset_infos.clone()),
                limit: Some(PAIRS_PAGE_LIMIT),
            };
            let page: PairsResponse = self.smart_query(factory, &msg, None).await?;
            let page_len = page.pairs.len();
            pairs.extend(page.pairs);
            if page_len < PAIRS_PAGE_LIMIT as usize {
                break;
            }
        }
        Ok(pairs)
    }

    async fn query_token_supply(&self, token: &str, height: u64) -> Result<BigInt> {
        let info: TokenInfoResponse = self
            .smart_query(token, &Cw20QueryMsg::TokenInfo {}, Some(height))
            .await?;
        Ok(info.total_supply)
    }

    async fn query_total_bond(&self, staking_token: &str, height: u64) -> Result<BigInt> {
        let msg = StakingQueryMsg::PoolInfo {
            staking_token: staking_token.to_string(),
        };
        let info: PoolInfoResponse = self
            .smart_query(&self.staking_address, &msg, Some(height))
            .await?;
        Ok(info.total_bond_amount)
    }

    async fn query_rewards_per_sec(&self, staking_token: &str, height: u64) -> Result<Vec<Asset>> {
        let msg = StakingQueryMsg::RewardsPerSec {
            staking_token: staking_token.to_string(),
        };
        let rewards: RewardsPerSecResponse = self
            .smart_query(&self.staking_address, &msg, Some(height))
            .await?;
        Ok(rewards.assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::AssetInfo;

    fn client(lcd_url: &str) -> LcdClient {
        LcdClient::new(&ChainSettings {
            lcd_url: lcd_url.to_string(),
            multicall_address: "orai1multicall".to_string(),
            factory_addresses: vec![],
            staking_address: "orai1staking".to_string(),
            hub_denom: "orai".to_string(),
            usdt_denom: "orai1usdt".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_smart_query_url_encodes_message() {
        let url = client("https://lcd.orai.io/")
            .smart_query_url("orai1pair", &PairQueryMsg::Pool {})
            .unwrap();
        let expected = format!(
            "https://lcd.orai.io/cosmwasm/wasm/v1/contract/orai1pair/smart/{}",
            STANDARD.encode(br#"{"pool":{}}"#)
        );
        assert_eq!(url.as_str(), expected);
    }

    #[test]
    fn test_decode_call_data() {
        let raw = r#"{"assets":[{"info":{"native_token":{"denom":"orai"}},"amount":"10"},{"info":{"token":{"contract_addr":"orai1usdt"}},"amount":"20"}],"total_share":"14"}"#;
        let pool: PoolResponse = decode_call_data(&STANDARD.encode(raw)).unwrap();
        assert_eq!(pool.total_share, BigInt::from(14));
        assert_eq!(pool.assets[1].info, AssetInfo::token("orai1usdt"));
        assert_eq!(pool.amount_of("orai"), BigInt::from(10));

        assert!(decode_call_data::<PoolResponse>("not base64!").is_err());
    }
}
