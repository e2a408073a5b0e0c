//! Deterministic row keys for the upsert tables.
//!
//! A key is built only from the logical content of the record, so a
//! replayed chunk produces the exact same keys as the first delivery.

use num_bigint::BigInt;

/// Key for swap and liquidity operations: `"<ts>-<d1>-<a1>-<d2>-<a2>"`.
pub fn concat_data_to_unique_key(
    timestamp: i64,
    first_denom: &str,
    first_amount: &BigInt,
    second_denom: &str,
    second_amount: &BigInt,
) -> String {
    format!("{}-{}-{}-{}-{}", timestamp, first_denom, first_amount, second_denom, second_amount)
}

/// Key for a pool amount snapshot: `"<ts>-<pairAddr>"`.
pub fn concat_pool_amount_key(timestamp: i64, pair_addr: &str) -> String {
    format!("{}-{}", timestamp, pair_addr)
}

/// Key for a pool APR snapshot.
pub fn concat_apr_key(
    timestamp: i64,
    pair_addr: &str,
    total_supply: &BigInt,
    total_bond_amount: &BigInt,
    reward_per_sec: &str,
    apr: f64,
) -> String {
    format!(
        "{}-{}-{}-{}-{}-{}",
        timestamp, pair_addr, total_supply, total_bond_amount, reward_per_sec, apr
    )
}

/// Key for candles, staking and earning rows.
pub fn concat_event_key(parts: &[&str]) -> String {
    parts.join("-")
}
