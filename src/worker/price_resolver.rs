use bigdecimal::BigDecimal;
use log::debug;
use num_bigint::BigInt;
use num_traits::{FromPrimitive, Zero};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

use crate::{
    contracts::{PairInfo, PoolResponse},
    utils::{parse_decimal, round_to_bigint, to_decimal, truncate_to_bigint},
    worker::{
        pair_registry::find_by_denoms,
        pool_state::{pair_reserves, PoolSnapshot},
    },
};

/// Base units offered when simulating a swap against the pool.
const SIMULATED_OFFER: u64 = 10_000_000;

/// Commission rates are applied with six decimals of precision.
const COMMISSION_SCALE: u64 = 1_000_000;

static PRICE_SCALE: Lazy<BigInt> = Lazy::new(|| BigInt::from(SIMULATED_OFFER));

/// Which side of a pair a ratio is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioDirection {
    /// Price of the base asset in quote units
    BaseInQuote,
    /// Price of the quote asset in base units
    QuoteInBase,
}

/// Quote units returned for [`SIMULATED_OFFER`] base units, after
/// commission. This is the base price in quote scaled by 10^7.
///
/// Integer math only: `(quote - base * quote / (base + offer)) * (1 - c)`.
pub fn calculate_price_by_pool(
    base_pool: &BigInt,
    quote_pool: &BigInt,
    commission_rate: &BigDecimal,
) -> BigInt {
    let offer = BigInt::from(SIMULATED_OFFER);
    let return_amount = quote_pool - base_pool * quote_pool / (base_pool + offer);

    let scale = BigInt::from(COMMISSION_SCALE);
    let commission = truncate_to_bigint(&(commission_rate * BigDecimal::from(scale.clone())));
    return_amount * (&scale - commission) / scale
}

/// Ratio of a pair's pool in the requested direction, 0 when the pool
/// is empty.
pub fn pair_ratio(pair: &PairInfo, pool: &PoolResponse, direction: RatioDirection) -> f64 {
    let (base, quote) = pair_reserves(pair, pool);
    if base.is_zero() || quote.is_zero() {
        return 0.0;
    }

    let commission = parse_decimal(&pair.commission_rate).unwrap_or_default();
    let price = to_decimal(&calculate_price_by_pool(&base, &quote, &commission), &PRICE_SCALE);
    match direction {
        RatioDirection::BaseInQuote => price,
        RatioDirection::QuoteInBase if price > 0.0 => 1.0 / price,
        RatioDirection::QuoteInBase => 0.0,
    }
}

/// Value `amount` at `price`, rounded to the nearest unit.
pub fn value_in_usdt(amount: &BigInt, price: f64) -> BigInt {
    match BigDecimal::from_f64(price) {
        Some(price) if !price.is_zero() => {
            round_to_bigint(&(BigDecimal::from(amount.clone()) * price))
        },
        _ => BigInt::zero(),
    }
}

/// USDT prices of every asset of the registered pairs.
///
/// Resolved through the hub asset:
/// 1. USDT → 1
/// 2. Hub → hub/USDT pair price
/// 3. Assets paired with the hub → price in hub × hub price
/// 4. Anything else → 0 (no price)
pub struct PriceResolver {
    usdt_denom: String,
    prices: FxHashMap<String, f64>,
}

impl PriceResolver {
    pub fn new(hub_denom: &str, usdt_denom: &str, pairs: &[PairInfo], pools: &PoolSnapshot) -> Self {
        let ratio = |pair: &PairInfo, direction| {
            pools
                .get(&pair.contract_addr)
                .map(|pool| pair_ratio(pair, pool, direction))
                .unwrap_or(0.0)
        };

        let hub_price = match find_by_denoms(pairs, hub_denom, usdt_denom) {
            Some(pair) => {
                let direction = if pair.asset_infos[0].denom() == hub_denom {
                    RatioDirection::BaseInQuote
                } else {
                    RatioDirection::QuoteInBase
                };
                ratio(pair, direction)
            },
            None => {
                debug!("No {}/{} pair registered, hub price is 0", hub_denom, usdt_denom);
                0.0
            },
        };

        let mut prices = FxHashMap::default();
        prices.insert(usdt_denom.to_string(), 1.0);
        prices.insert(hub_denom.to_string(), hub_price);

        for asset in pairs.iter().flat_map(|pair| pair.asset_infos.iter()) {
            let denom = asset.denom();
            if prices.contains_key(denom) {
                continue;
            }
            let price = match find_by_denoms(pairs, denom, hub_denom) {
                Some(pair) => {
                    let direction = if pair.asset_infos[0].denom() == hub_denom {
                        RatioDirection::QuoteInBase
                    } else {
                        RatioDirection::BaseInQuote
                    };
                    ratio(pair, direction) * hub_price
                },
                None => 0.0,
            };
            prices.insert(denom.to_string(), price);
        }

        Self {
            usdt_denom: usdt_denom.to_string(),
            prices,
        }
    }

    pub fn price_in_usdt(&self, denom: &str) -> f64 {
        if denom == self.usdt_denom {
            return 1.0;
        }
        self.prices.get(denom).copied().unwrap_or(0.0)
    }

    /// Sum of both reserves valued in USDT.
    pub fn pool_liquidity_usdt(&self, pool: &PoolResponse) -> BigDecimal {
        pool.assets
            .iter()
            .map(|asset| {
                let price = BigDecimal::from_f64(self.price_in_usdt(asset.info.denom()))
                    .unwrap_or_default();
                BigDecimal::from(asset.amount.clone()) * price
            })
            .fold(BigDecimal::zero(), |acc, value| acc + value)
    }
}
