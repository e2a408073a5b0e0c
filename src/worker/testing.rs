//! Fixtures shared by the worker unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use num_bigint::BigInt;
use num_traits::Zero;
use rustc_hash::FxHashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use crate::{
    contracts::{Asset, AssetInfo, PairInfo, PoolResponse},
    db::models::{LiquidityOpType, LiquidityOperation, SwapOperation},
    worker::chain_client::ChainQuerier,
};

/// Contract tokens are `orai1...` addresses, everything else is a denom.
pub fn asset_info(denom: &str) -> AssetInfo {
    if denom.starts_with("orai1") {
        AssetInfo::token(denom)
    } else {
        AssetInfo::native(denom)
    }
}

pub fn pair(addr: &str, base: &str, quote: &str) -> PairInfo {
    PairInfo {
        asset_infos: [asset_info(base), asset_info(quote)],
        contract_addr: addr.to_string(),
        liquidity_token: format!("{}_lp", addr),
        oracle_addr: String::new(),
        commission_rate: "0".to_string(),
    }
}

pub fn pool(first: &str, first_amount: u64, second: &str, second_amount: u64, share: u64) -> PoolResponse {
    PoolResponse {
        assets: vec![
            Asset {
                info: asset_info(first),
                amount: BigInt::from(first_amount),
            },
            Asset {
                info: asset_info(second),
                amount: BigInt::from(second_amount),
            },
        ],
        total_share: BigInt::from(share),
    }
}

pub fn liquidity_op(
    pair_addr: &str,
    op_type: LiquidityOpType,
    first: &str,
    first_amount: u64,
    second: &str,
    second_amount: u64,
) -> LiquidityOperation {
    LiquidityOperation {
        unique_key: format!("{}-{}", pair_addr, first_amount),
        txhash: "HASH".to_string(),
        txheight: 1,
        timestamp: 1,
        pair_addr: pair_addr.to_string(),
        tx_creator: "orai1creator".to_string(),
        op_type,
        first_token_denom: first.to_string(),
        first_token_amount: BigInt::from(first_amount),
        second_token_denom: second.to_string(),
        second_token_amount: BigInt::from(second_amount),
        lp_share: BigInt::zero(),
        first_token_lp: BigInt::zero(),
        second_token_lp: BigInt::zero(),
        tax_rate: BigInt::zero(),
    }
}

pub fn swap_op(pair_addr: &str, offer: &str, offer_amount: u64, ask: &str, return_amount: u64) -> SwapOperation {
    SwapOperation {
        unique_key: format!("{}-{}-{}", pair_addr, offer, offer_amount),
        txhash: "HASH".to_string(),
        txheight: 1,
        timestamp: 1,
        pair_addr: pair_addr.to_string(),
        sender: "orai1sender".to_string(),
        offer_denom: offer.to_string(),
        offer_amount: BigInt::from(offer_amount),
        ask_denom: ask.to_string(),
        return_amount: BigInt::from(return_amount),
        tax_amount: BigInt::zero(),
        commission_amount: BigInt::zero(),
        spread_amount: BigInt::zero(),
        volume_usdt: BigInt::zero(),
        commission_usdt: BigInt::zero(),
    }
}

#[derive(Debug, Clone)]
struct StakingState {
    supply: BigInt,
    bond: BigInt,
    rewards: Vec<Asset>,
}

/// In-memory chain. Unknown staking tokens fail their queries.
#[derive(Default)]
pub struct FakeQuerier {
    pools: Mutex<FxHashMap<String, PoolResponse>>,
    factory_pairs: Mutex<FxHashMap<String, Vec<PairInfo>>>,
    staking: Mutex<FxHashMap<String, StakingState>>,
    fail_pools: AtomicBool,
}

impl FakeQuerier {
    pub fn set_pool(&self, pair_addr: &str, pool: PoolResponse) {
        self.pools.lock().unwrap().insert(pair_addr.to_string(), pool);
    }

    pub fn set_factory_pairs(&self, factory: &str, pairs: Vec<PairInfo>) {
        self.factory_pairs
            .lock()
            .unwrap()
            .insert(factory.to_string(), pairs);
    }

    pub fn set_staking(&self, lp_token: &str, supply: u64, bond: u64, rewards: Vec<Asset>) {
        self.staking.lock().unwrap().insert(
            lp_token.to_string(),
            StakingState {
                supply: BigInt::from(supply),
                bond: BigInt::from(bond),
                rewards,
            },
        );
    }

    pub fn fail_pools(&self, fail: bool) {
        self.fail_pools.store(fail, Ordering::SeqCst);
    }

    fn staking_state(&self, lp_token: &str) -> Result<StakingState> {
        self.staking
            .lock()
            .unwrap()
            .get(lp_token)
            .cloned()
            .ok_or_else(|| anyhow!("no staking pool for {}", lp_token))
    }
}

#[async_trait]
impl ChainQuerier for FakeQuerier {
    async fn query_pools(&self, pair_addrs: &[String], _height: u64) -> Result<Vec<Option<PoolResponse>>> {
        if self.fail_pools.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        let pools = self.pools.lock().unwrap();
        Ok(pair_addrs.iter().map(|addr| pools.get(addr).cloned()).collect())
    }

    async fn query_factory_pairs(&self, factory: &str) -> Result<Vec<PairInfo>> {
        Ok(self
            .factory_pairs
            .lock()
            .unwrap()
            .get(factory)
            .cloned()
            .unwrap_or_default())
    }

    async fn query_token_supply(&self, token: &str, _height: u64) -> Result<BigInt> {
        Ok(self.staking_state(token)?.supply)
    }

    async fn query_total_bond(&self, staking_token: &str, _height: u64) -> Result<BigInt> {
        Ok(self.staking_state(staking_token)?.bond)
    }

    async fn query_rewards_per_sec(&self, staking_token: &str, _height: u64) -> Result<Vec<Asset>> {
        Ok(self.staking_state(staking_token)?.rewards)
    }
}
