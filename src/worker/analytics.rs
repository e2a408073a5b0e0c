//! Derived metrics over the events of one chunk.
//!
//! Everything here is pure except [`fetch_apr_inputs`], which queries
//! the staking and token contracts. Inputs are always in chronological
//! order and every amount stays a `BigInt` until a display value
//! (price, APR) is produced.

use bigdecimal::BigDecimal;
use futures::{stream, StreamExt};
use log::warn;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, One, Zero};
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::{
    contracts::{Asset, PairInfo, PoolResponse},
    db::models::{
        EarningOperation, LiquidityOpType, LiquidityOperation, OhlcvCandle, PoolAmountHistory,
        PoolApr, StakingOperation, SwapOperation,
    },
    utils::{
        concat_apr_key, concat_event_key, concat_pool_amount_key, decimal_to_f64, parse_decimal,
        round_to_bigint, round_time, saturating_sub, to_decimal, CANDLE_INTERVAL_SECS,
        SEC_PER_YEAR,
    },
    worker::{
        chain_client::ChainQuerier,
        pair_registry::{find_by_address, find_by_liquidity_token},
        parser::DomainEvent,
        pool_state::{pair_reserves, PoolSnapshot},
        price_resolver::{value_in_usdt, PriceResolver},
    },
};

// ============================================
// Liquidity Fee
// ============================================

/// Withdraw tax on native-token refunds.
#[derive(Debug, Clone)]
pub struct FeeParams {
    pub tax_rate: BigDecimal,
    pub tax_cap: BigInt,
}

impl FeeParams {
    pub fn new(tax_rate: &str, tax_cap: u64) -> anyhow::Result<Self> {
        let tax_rate = parse_decimal(tax_rate)
            .ok_or_else(|| anyhow::anyhow!("Invalid tax rate {:?}", tax_rate))?;
        Ok(Self {
            tax_rate,
            tax_cap: BigInt::from(tax_cap),
        })
    }
}

/// Fee of a withdrawal in USDT units.
///
/// Each native pool asset is refunded `amount * withdrawn / total_share`
/// and taxed `min(refund - refund / (1 + rate), cap)`. Contract tokens
/// are exempt.
pub fn calculate_liquidity_fee(
    pool: &PoolResponse,
    withdrawn_share: &BigInt,
    params: &FeeParams,
    prices: &PriceResolver,
) -> BigInt {
    if pool.total_share.is_zero() {
        return BigInt::zero();
    }

    let share_ratio =
        BigDecimal::from(withdrawn_share.clone()) / BigDecimal::from(pool.total_share.clone());
    let divisor = BigDecimal::from(1) + &params.tax_rate;
    let cap = BigDecimal::from(params.tax_cap.clone());

    let total = pool
        .assets
        .iter()
        .filter(|asset| asset.info.is_native())
        .map(|asset| {
            let refund = BigDecimal::from(asset.amount.clone()) * &share_ratio;
            let fee = &refund - &refund / &divisor;
            let fee = if fee > cap { cap.clone() } else { fee };
            let price = BigDecimal::from_f64(prices.price_in_usdt(asset.info.denom()))
                .unwrap_or_default();
            fee * price
        })
        .fold(BigDecimal::zero(), |acc, fee| acc + fee);

    round_to_bigint(&total)
}

/// Slice of the pool a withdrawal redeemed, rebuilt from its own refund
/// amounts so it reflects the reserves at the withdrawal's height.
fn withdrawn_slice(op: &LiquidityOperation, pair: &PairInfo) -> PoolResponse {
    let assets = [
        (&op.first_token_denom, &op.first_token_amount),
        (&op.second_token_denom, &op.second_token_amount),
    ]
    .into_iter()
    .filter_map(|(denom, amount)| {
        let info = pair.asset_infos.iter().find(|info| info.denom() == denom.as_str())?;
        Some(Asset {
            info: info.clone(),
            amount: amount.clone(),
        })
    })
    .collect();

    PoolResponse {
        assets,
        total_share: BigInt::one(),
    }
}

/// Fill `tax_rate` of every withdrawal. The refund is taxed as a full
/// redemption of [`withdrawn_slice`].
pub fn apply_liquidity_fees(
    ops: &mut [LiquidityOperation],
    pairs: &[PairInfo],
    params: &FeeParams,
    prices: &PriceResolver,
) {
    for op in ops.iter_mut().filter(|op| op.op_type == LiquidityOpType::Withdraw) {
        op.tax_rate = match find_by_address(pairs, &op.pair_addr) {
            Some(pair) => {
                calculate_liquidity_fee(&withdrawn_slice(op, pair), &BigInt::one(), params, prices)
            },
            None => BigInt::zero(),
        };
    }
}

// ============================================
// LP Accumulation
// ============================================

/// Running pool amounts per pair over liquidity operations.
///
/// Each operation's `first_token_lp` / `second_token_lp` becomes the pool
/// amount of that token right after it. Sums are scoped to the pair:
/// operations on other pairs never touch them.
pub fn accumulate_lp_data(ops: &mut [LiquidityOperation], pools: &PoolSnapshot) {
    let mut running: FxHashMap<String, (BigInt, BigInt)> = FxHashMap::default();

    for op in ops.iter_mut() {
        let (first, second) = running.entry(op.pair_addr.clone()).or_insert_with(|| {
            pools
                .get(&op.pair_addr)
                .map(|pool| {
                    (
                        pool.amount_of(&op.first_token_denom),
                        pool.amount_of(&op.second_token_denom),
                    )
                })
                .unwrap_or_default()
        });

        match op.op_type {
            LiquidityOpType::Provide => {
                *first += &op.first_token_amount;
                *second += &op.second_token_amount;
            },
            LiquidityOpType::Withdraw => {
                *first = saturating_sub(first, &op.first_token_amount);
                *second = saturating_sub(second, &op.second_token_amount);
            },
        }

        op.first_token_lp = first.clone();
        op.second_token_lp = second.clone();
    }
}

// ============================================
// Pool Amount History
// ============================================

#[derive(Debug, Clone)]
struct PoolState {
    base: BigInt,
    quote: BigInt,
    share: BigInt,
}

impl PoolState {
    /// Mutable reserve of `denom`, if the pair holds it.
    fn side(&mut self, pair: &PairInfo, denom: &str) -> Option<&mut BigInt> {
        if pair.asset_infos[0].denom() == denom {
            Some(&mut self.base)
        } else if pair.asset_infos[1].denom() == denom {
            Some(&mut self.quote)
        } else {
            None
        }
    }

    fn add(&mut self, pair: &PairInfo, denom: &str, amount: &BigInt) {
        if let Some(side) = self.side(pair, denom) {
            *side += amount;
        }
    }

    fn sub(&mut self, pair: &PairInfo, denom: &str, amount: &BigInt) {
        if let Some(side) = self.side(pair, denom) {
            *side = saturating_sub(side, amount);
        }
    }
}

/// Replay liquidity and swap events over the pool reserves.
///
/// Emits one row per `(pair, timestamp)` holding the state after the
/// last event of that timestamp.
pub fn collect_pool_amount_history(
    events: &[DomainEvent],
    pairs: &[PairInfo],
    pools: &PoolSnapshot,
) -> Vec<PoolAmountHistory> {
    let mut states: FxHashMap<String, PoolState> = FxHashMap::default();
    let mut rows: Vec<PoolAmountHistory> = Vec::new();
    let mut row_index: FxHashMap<String, usize> = FxHashMap::default();

    for event in events {
        let (pair_addr, height, timestamp) = match event {
            DomainEvent::Swap(op) => (&op.pair_addr, op.txheight, op.timestamp),
            DomainEvent::Liquidity(op) => (&op.pair_addr, op.txheight, op.timestamp),
            _ => continue,
        };
        let Some(pair) = find_by_address(pairs, pair_addr) else {
            continue;
        };

        let state = states.entry(pair_addr.clone()).or_insert_with(|| {
            let (base, quote, share) = match pools.get(pair_addr) {
                Some(pool) => {
                    let (base, quote) = pair_reserves(pair, pool);
                    (base, quote, pool.total_share.clone())
                },
                None => Default::default(),
            };
            PoolState { base, quote, share }
        });

        match event {
            DomainEvent::Swap(op) => {
                state.add(pair, &op.offer_denom, &op.offer_amount);
                state.sub(pair, &op.ask_denom, &op.return_amount);
            },
            DomainEvent::Liquidity(op) => match op.op_type {
                LiquidityOpType::Provide => {
                    state.add(pair, &op.first_token_denom, &op.first_token_amount);
                    state.add(pair, &op.second_token_denom, &op.second_token_amount);
                    state.share += &op.lp_share;
                },
                LiquidityOpType::Withdraw => {
                    state.sub(pair, &op.first_token_denom, &op.first_token_amount);
                    state.sub(pair, &op.second_token_denom, &op.second_token_amount);
                    state.share = saturating_sub(&state.share, &op.lp_share);
                },
            },
            DomainEvent::Stake(_) | DomainEvent::Earn(_) => {},
        }

        let row = PoolAmountHistory {
            unique_key: concat_pool_amount_key(timestamp, pair_addr),
            pair_addr: pair_addr.clone(),
            offer_pool_amount: state.base.clone(),
            ask_pool_amount: state.quote.clone(),
            total_share: state.share.clone(),
            height,
            timestamp,
        };
        match row_index.get(&row.unique_key) {
            Some(&index) => rows[index] = row,
            None => {
                row_index.insert(row.unique_key.clone(), rows.len());
                rows.push(row);
            },
        }
    }

    rows
}

/// Initial pool amount rows: one per pair from the resolved reserves.
pub fn initial_pool_amounts(
    pairs: &[PairInfo],
    pools: &PoolSnapshot,
    timestamp: i64,
) -> Vec<PoolAmountHistory> {
    pairs
        .iter()
        .filter_map(|pair| {
            let pool = pools.get(&pair.contract_addr)?;
            let (base, quote) = pair_reserves(pair, pool);
            Some(PoolAmountHistory {
                unique_key: concat_pool_amount_key(timestamp, &pair.contract_addr),
                pair_addr: pair.contract_addr.clone(),
                offer_pool_amount: base,
                ask_pool_amount: quote,
                total_share: pool.total_share.clone(),
                height: pools.height,
                timestamp,
            })
        })
        .collect()
}

// ============================================
// OHLCV
// ============================================

/// One-minute candles per pair. Price is quote per base, volume is in
/// base units. A candle is keyed by its bucket, pair and the height of
/// its first swap.
pub fn build_ohlcv(swaps: &[SwapOperation], pairs: &[PairInfo]) -> Vec<OhlcvCandle> {
    let mut candles: Vec<OhlcvCandle> = Vec::new();
    let mut index: FxHashMap<(String, i64), usize> = FxHashMap::default();

    for swap in swaps {
        let Some(pair) = find_by_address(pairs, &swap.pair_addr) else {
            continue;
        };
        let base_denom = pair.asset_infos[0].denom();
        let quote_denom = pair.asset_infos[1].denom();
        let (base_amount, quote_amount) = if swap.offer_denom == base_denom {
            (&swap.offer_amount, &swap.return_amount)
        } else {
            (&swap.return_amount, &swap.offer_amount)
        };
        if base_amount.is_zero() {
            continue;
        }

        let price = to_decimal(quote_amount, base_amount);
        let pair_key = format!("{}-{}", base_denom, quote_denom);
        let timestamp = round_time(swap.timestamp, CANDLE_INTERVAL_SECS);

        match index.get(&(pair_key.clone(), timestamp)) {
            Some(&i) => {
                let candle = &mut candles[i];
                candle.high = candle.high.max(price);
                candle.low = candle.low.min(price);
                candle.close = price;
                candle.volume += base_amount;
            },
            None => {
                index.insert((pair_key.clone(), timestamp), candles.len());
                candles.push(OhlcvCandle {
                    unique_key: concat_event_key(&[
                        &timestamp.to_string(),
                        &pair_key,
                        &swap.txheight.to_string(),
                    ]),
                    pair: pair_key,
                    timestamp,
                    txheight: swap.txheight,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                    volume: base_amount.clone(),
                });
            },
        }
    }

    candles
}

// ============================================
// Valuation
// ============================================

pub fn value_swaps(swaps: &mut [SwapOperation], prices: &PriceResolver) {
    for swap in swaps.iter_mut() {
        swap.volume_usdt = value_in_usdt(&swap.offer_amount, prices.price_in_usdt(&swap.offer_denom));
        swap.commission_usdt =
            value_in_usdt(&swap.commission_amount, prices.price_in_usdt(&swap.ask_denom));
    }
}

/// USDT price of one LP token of a pool, 0 for an empty pool.
pub fn lp_price(pool: &PoolResponse, prices: &PriceResolver) -> f64 {
    if pool.total_share.is_zero() {
        return 0.0;
    }
    let liquidity = prices.pool_liquidity_usdt(pool);
    decimal_to_f64(&(liquidity / BigDecimal::from(pool.total_share.clone())))
}

/// Value bonded LP tokens at the LP price of their pair.
pub fn value_stakings(
    stakings: &mut [StakingOperation],
    pairs: &[PairInfo],
    pools: &PoolSnapshot,
    prices: &PriceResolver,
) {
    for staking in stakings.iter_mut() {
        let price = find_by_liquidity_token(pairs, &staking.staking_asset_denom)
            .and_then(|pair| pools.get(&pair.contract_addr))
            .map(|pool| lp_price(pool, prices))
            .unwrap_or(0.0);
        staking.stake_amount_in_usdt = value_in_usdt(&staking.stake_amount, price);
    }
}

pub fn value_earnings(earnings: &mut [EarningOperation], prices: &PriceResolver) {
    for earning in earnings.iter_mut() {
        earning.earn_amount_in_usdt = value_in_usdt(
            &earning.earn_amount,
            prices.price_in_usdt(&earning.reward_asset_denom),
        );
    }
}

// ============================================
// APR
// ============================================

/// Staking state of one pair needed for its APR.
#[derive(Debug, Clone)]
pub struct AprInput {
    pub pair: PairInfo,
    pub total_supply: BigInt,
    pub total_bond: BigInt,
    pub rewards_per_sec: Vec<Asset>,
}

/// Query APR inputs for every pair with at most `concurrency` in flight.
///
/// All-settled: every pair gets its own result, a failure never cancels
/// the other queries.
pub async fn fetch_apr_inputs(
    querier: Arc<dyn ChainQuerier>,
    pairs: &[PairInfo],
    height: u64,
    concurrency: usize,
) -> Vec<(String, anyhow::Result<AprInput>)> {
    stream::iter(pairs.iter().cloned())
        .map(|pair| {
            let querier = querier.clone();
            async move {
                let lp_token = pair.liquidity_token.clone();
                let result: anyhow::Result<AprInput> = async {
                    let total_supply = querier.query_token_supply(&lp_token, height).await?;
                    let total_bond = querier.query_total_bond(&lp_token, height).await?;
                    let rewards_per_sec = querier.query_rewards_per_sec(&lp_token, height).await?;
                    Ok(AprInput {
                        pair: pair.clone(),
                        total_supply,
                        total_bond,
                        rewards_per_sec,
                    })
                }
                .await;
                (pair.contract_addr, result)
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Annualized reward yield in percent.
///
/// `bond_value = total_bond * liquidity / total_supply` and
/// `apr = 100 * Σ(reward_per_sec * SEC_PER_YEAR * price) / bond_value`.
pub fn calculate_apr(input: &AprInput, liquidity_usdt: &BigDecimal, prices: &PriceResolver) -> f64 {
    if input.total_supply.is_zero() {
        return 0.0;
    }

    let bond_value = BigDecimal::from(input.total_bond.clone()) * liquidity_usdt
        / BigDecimal::from(input.total_supply.clone());
    if bond_value.is_zero() {
        return 0.0;
    }

    let yearly_rewards = input
        .rewards_per_sec
        .iter()
        .map(|reward| {
            let price = BigDecimal::from_f64(prices.price_in_usdt(reward.info.denom()))
                .unwrap_or_default();
            BigDecimal::from(reward.amount.clone()) * BigDecimal::from(SEC_PER_YEAR) * price
        })
        .fold(BigDecimal::zero(), |acc, value| acc + value);

    decimal_to_f64(&(BigDecimal::from(100) * yearly_rewards / bond_value))
}

/// APR rows for the settled inputs; failed pairs are logged and skipped.
pub fn build_pool_aprs(
    inputs: Vec<(String, anyhow::Result<AprInput>)>,
    pools: &PoolSnapshot,
    prices: &PriceResolver,
    height: u64,
    timestamp: i64,
) -> Vec<PoolApr> {
    inputs
        .into_iter()
        .filter_map(|(pair_addr, result)| match result {
            Ok(input) => Some(input),
            Err(e) => {
                warn!("Skipping APR of pair {}: {:#}", pair_addr, e);
                None
            },
        })
        .map(|input| {
            let liquidity = pools
                .get(&input.pair.contract_addr)
                .map(|pool| prices.pool_liquidity_usdt(pool))
                .unwrap_or_default();
            let apr = calculate_apr(&input, &liquidity, prices);
            let reward_per_sec =
                serde_json::to_string(&input.rewards_per_sec).unwrap_or_else(|_| "[]".to_string());

            PoolApr {
                unique_key: concat_apr_key(
                    timestamp,
                    &input.pair.contract_addr,
                    &input.total_supply,
                    &input.total_bond,
                    &reward_per_sec,
                    apr,
                ),
                pair_addr: input.pair.contract_addr,
                total_supply: input.total_supply,
                total_bond_amount: input.total_bond,
                reward_per_sec,
                apr,
                height,
                timestamp,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::testing::{liquidity_op, pair, pool, swap_op, FakeQuerier};

    fn usdt_prices(pairs: &[PairInfo], pools: &PoolSnapshot) -> PriceResolver {
        PriceResolver::new("orai", "orai1usdt", pairs, pools)
    }

    #[test]
    fn test_accumulate_lp_data_is_scoped_per_pair() {
        let mut pools = PoolSnapshot::new(1);
        pools.insert("orai1a".to_string(), pool("orai", 1, "orai1usdt", 1, 2));
        pools.insert("orai1b".to_string(), pool("orai", 4, "uatom", 4, 8));

        let mut ops = vec![
            liquidity_op("orai1a", LiquidityOpType::Provide, "orai", 1, "orai1usdt", 1),
            liquidity_op("orai1a", LiquidityOpType::Withdraw, "orai", 1, "orai1usdt", 1),
            liquidity_op("orai1b", LiquidityOpType::Withdraw, "orai", 1, "uatom", 1),
        ];
        accumulate_lp_data(&mut ops, &pools);

        let lp: Vec<i64> = ops
            .iter()
            .map(|op| i64::try_from(&op.first_token_lp).unwrap())
            .collect();
        assert_eq!(lp, vec![2, 1, 3]);
        assert_eq!(ops[2].second_token_lp, BigInt::from(3));
    }

    #[test]
    fn test_liquidity_fee_taxes_native_assets_only() {
        let pairs = vec![pair("orai1orai_usdt", "orai", "orai1usdt")];
        let mut pools = PoolSnapshot::new(1);
        // ORAI priced at ~2 USDT
        pools.insert(
            "orai1orai_usdt".to_string(),
            pool("orai", 1_000_000_000_000, "orai1usdt", 2_000_000_000_000, 1_000),
        );
        let prices = usdt_prices(&pairs, &pools);
        let params = FeeParams::new("0.3", 1_000_000_000_000).unwrap();

        // withdraw 1% of the pool: refund 10^10 orai, fee = refund * 0.3/1.3
        let fee = calculate_liquidity_fee(
            pools.get("orai1orai_usdt").unwrap(),
            &BigInt::from(10),
            &params,
            &prices,
        );
        let expected = 10_000_000_000f64 * (0.3 / 1.3) * prices.price_in_usdt("orai");
        let fee = i64::try_from(&fee).unwrap() as f64;
        assert!((fee - expected).abs() / expected < 1e-6);
    }

    #[test]
    fn test_liquidity_fee_is_capped() {
        let pairs = vec![pair("orai1orai_usdt", "orai", "orai1usdt")];
        let mut pools = PoolSnapshot::new(1);
        pools.insert(
            "orai1orai_usdt".to_string(),
            pool("orai", 1_000_000_000_000, "orai1usdt", 1_000_000_000_000, 1_000),
        );
        let prices = usdt_prices(&pairs, &pools);
        let params = FeeParams::new("0.3", 1_000_000).unwrap();

        let pool = pools.get("orai1orai_usdt").unwrap();
        let fee = calculate_liquidity_fee(pool, &BigInt::from(10), &params, &prices);
        let expected = 1_000_000f64 * prices.price_in_usdt("orai");
        let fee = i64::try_from(&fee).unwrap() as f64;
        assert!((fee - expected).abs() <= 1.0);

        let empty = PoolResponse::empty(&pairs[0].asset_infos);
        assert!(calculate_liquidity_fee(&empty, &BigInt::from(10), &params, &prices).is_zero());
    }

    #[test]
    fn test_withdraw_fee_follows_reserves_moved_earlier_in_chunk() {
        let pairs = vec![pair("orai1orai_usdt", "orai", "orai1usdt")];
        let mut pools = PoolSnapshot::new(1);
        pools.insert(
            "orai1orai_usdt".to_string(),
            pool("orai", 1_000_000_000_000, "orai1usdt", 2_000_000_000_000, 1_000),
        );
        let prices = usdt_prices(&pairs, &pools);
        let params = FeeParams::new("0.3", 1_000_000_000_000).unwrap();

        // a swap earlier in the chunk doubled the ORAI reserve, so 10 of
        // 1000 shares now redeem 2 * 10^10 orai instead of 10^10
        let provide = liquidity_op("orai1orai_usdt", LiquidityOpType::Provide, "orai", 1, "orai1usdt", 1);
        let mut withdraw = liquidity_op(
            "orai1orai_usdt",
            LiquidityOpType::Withdraw,
            "orai",
            20_000_000_000,
            "orai1usdt",
            10_000_000_000,
        );
        withdraw.lp_share = BigInt::from(10);
        let mut ops = vec![provide, withdraw];
        apply_liquidity_fees(&mut ops, &pairs, &params, &prices);

        assert!(ops[0].tax_rate.is_zero());
        let expected = 20_000_000_000f64 * (0.3 / 1.3) * prices.price_in_usdt("orai");
        let fee = i64::try_from(&ops[1].tax_rate).unwrap() as f64;
        assert!((fee - expected).abs() / expected < 1e-6);

        // unknown pairs carry no fee
        let mut stray = vec![liquidity_op("orai1other", LiquidityOpType::Withdraw, "orai", 5, "uatom", 5)];
        apply_liquidity_fees(&mut stray, &pairs, &params, &prices);
        assert!(stray[0].tax_rate.is_zero());
    }

    #[test]
    fn test_pool_amount_history_keeps_last_state_per_timestamp() {
        let pairs = vec![pair("orai1a", "orai", "orai1usdt")];
        let mut pools = PoolSnapshot::new(1);
        pools.insert("orai1a".to_string(), pool("orai", 100, "orai1usdt", 100, 10));

        let mut provide = liquidity_op("orai1a", LiquidityOpType::Provide, "orai", 10, "orai1usdt", 10);
        provide.lp_share = BigInt::from(1);
        provide.timestamp = 60;
        let mut first_swap = swap_op("orai1a", "orai", 5, "orai1usdt", 4);
        first_swap.timestamp = 60;
        let mut second_swap = swap_op("orai1a", "orai1usdt", 2, "orai", 3);
        second_swap.timestamp = 120;

        let events = vec![
            DomainEvent::Liquidity(provide),
            DomainEvent::Swap(first_swap),
            DomainEvent::Swap(second_swap),
        ];
        let rows = collect_pool_amount_history(&events, &pairs, &pools);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].unique_key, "60-orai1a");
        assert_eq!(rows[0].offer_pool_amount, BigInt::from(115));
        assert_eq!(rows[0].ask_pool_amount, BigInt::from(106));
        assert_eq!(rows[0].total_share, BigInt::from(11));
        assert_eq!(rows[1].offer_pool_amount, BigInt::from(112));
        assert_eq!(rows[1].ask_pool_amount, BigInt::from(108));
    }

    #[test]
    fn test_build_ohlcv_buckets_by_minute() {
        let pairs = vec![pair("orai1a", "orai", "orai1usdt")];
        let mut swaps = vec![
            swap_op("orai1a", "orai", 100, "orai1usdt", 200),
            swap_op("orai1a", "orai1usdt", 300, "orai", 100),
            swap_op("orai1a", "orai", 100, "orai1usdt", 250),
        ];
        swaps[0].timestamp = 1689174736;
        swaps[1].timestamp = 1689174750;
        swaps[2].timestamp = 1689174781;

        let candles = build_ohlcv(&swaps, &pairs);
        assert_eq!(candles.len(), 2);

        let first = &candles[0];
        assert_eq!(first.pair, "orai-orai1usdt");
        assert_eq!(first.timestamp, 1689174720);
        assert_eq!((first.open, first.close), (2.0, 3.0));
        assert_eq!((first.low, first.high), (2.0, 3.0));
        assert_eq!(first.volume, BigInt::from(200));
        assert_eq!(first.unique_key, concat_event_key(&["1689174720", "orai-orai1usdt", "1"]));
        assert_eq!(candles[1].timestamp, 1689174780);
        assert_eq!(candles[1].open, 2.5);
    }

    #[test]
    fn test_calculate_apr() {
        let pairs = vec![pair("orai1orai_usdt", "orai", "orai1usdt")];
        let mut pools = PoolSnapshot::new(1);
        pools.insert(
            "orai1orai_usdt".to_string(),
            pool("orai", 1_000_000_000_000, "orai1usdt", 1_000_000_000_000, 1_000),
        );
        let prices = usdt_prices(&pairs, &pools);

        let input = AprInput {
            pair: pairs[0].clone(),
            total_supply: BigInt::from(1_000),
            total_bond: BigInt::from(500),
            // 1 USDT per second
            rewards_per_sec: vec![Asset {
                info: crate::contracts::AssetInfo::token("orai1usdt"),
                amount: BigInt::from(1_000_000),
            }],
        };
        let liquidity = BigDecimal::from(1_000_000_000_000i64);
        let apr = calculate_apr(&input, &liquidity, &prices);
        // 100 * 10^6 * 31536000 / (500 * 10^12 / 1000)
        assert!((apr - 6307.2).abs() < 1e-6);

        let no_bond = AprInput {
            total_bond: BigInt::zero(),
            ..input
        };
        assert_eq!(calculate_apr(&no_bond, &liquidity, &prices), 0.0);
    }

    #[tokio::test]
    async fn test_fetch_apr_inputs_is_all_settled() {
        let pairs = vec![pair("orai1a", "orai", "orai1usdt"), pair("orai1b", "orai", "uatom")];
        let querier = FakeQuerier::default();
        querier.set_staking("orai1a_lp", 1_000, 500, vec![]);
        // orai1b_lp has no staking data and fails

        let inputs = fetch_apr_inputs(Arc::new(querier), &pairs, 10, 4).await;
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].0, "orai1a");
        assert!(inputs[0].1.is_ok());
        assert!(inputs[1].1.is_err());

        let pools = PoolSnapshot::new(10);
        let prices = usdt_prices(&pairs, &pools);
        let rows = build_pool_aprs(inputs, &pools, &prices, 10, 1_000);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pair_addr, "orai1a");
        assert_eq!(rows[0].apr, 0.0);
        assert_eq!(rows[0].reward_per_sec, "[]");
    }
}
