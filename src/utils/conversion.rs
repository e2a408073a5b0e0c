//! Fixed-point and big-integer helpers.
//!
//! Amounts travel through the indexer as `BigInt` in the token's smallest
//! unit. Conversion to floating point only happens for display values
//! (prices, APR) and always truncates like the on-chain math does.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};
use once_cell::sync::Lazy;
use std::str::FromStr;

/// Decimals used by every asset traded on the exchange.
pub const DEFAULT_DECIMALS: u8 = 6;

// ============================================
// BigInt Arithmetic
// ============================================

/// Subtract `delta` from `current`, saturating at zero.
///
/// Pool reserves and shares can never go negative; a replayed withdrawal
/// larger than the tracked reserve clamps instead of wrapping.
pub fn saturating_sub(current: &BigInt, delta: &BigInt) -> BigInt {
    let result = current - delta;
    if result < BigInt::zero() {
        BigInt::zero()
    } else {
        result
    }
}

/// Drop the fractional part of a decimal (towards zero).
pub fn truncate_to_bigint(value: &BigDecimal) -> BigInt {
    let (digits, _) = value.with_scale(0).into_bigint_and_exponent();
    digits
}

/// Round a decimal to the nearest integer, halves away from zero.
pub fn round_to_bigint(value: &BigDecimal) -> BigInt {
    let half = BigDecimal::new(BigInt::from(5), 1);
    if *value < BigDecimal::zero() {
        -truncate_to_bigint(&(-value + half))
    } else {
        truncate_to_bigint(&(value + half))
    }
}

// ============================================
// Display Conversions
// ============================================

/// Convert a raw amount to its display value.
///
/// # Example
/// ```ignore
/// let display = to_display(&BigInt::from(1_500_000), 6); // 1.5
/// ```
pub fn to_display(amount: &BigInt, decimals: u8) -> f64 {
    let adjusted = BigDecimal::from(amount.clone()) / big_pow10(decimals);
    adjusted.to_f64().unwrap_or(0.0)
}

/// Ratio of two raw amounts truncated to six decimal places.
///
/// Returns 0 when the denominator is zero.
pub fn to_decimal(numerator: &BigInt, denominator: &BigInt) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    let scaled = numerator * BigInt::from(10u32).pow(DEFAULT_DECIMALS as u32) / denominator;
    to_display(&scaled, DEFAULT_DECIMALS)
}

/// Truncate a decimal value to six places and convert it for display.
pub fn decimal_to_f64(value: &BigDecimal) -> f64 {
    let scaled = truncate_to_bigint(&(value * big_pow10(DEFAULT_DECIMALS)));
    to_display(&scaled, DEFAULT_DECIMALS)
}

/// Parse a decimal string such as `"0.003"` into a BigDecimal.
pub fn parse_decimal(value: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(value.trim()).ok()
}

// ============================================
// Serde
// ============================================

/// Serialize `BigInt` as a decimal string.
///
/// Deserialization accepts either a JSON string or a JSON integer, which is
/// what contract query responses and stored rows contain.
pub mod bigint_string {
    use num_bigint::BigInt;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use serde_json::Value;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => BigInt::from_str(s.trim()).map_err(de::Error::custom),
            Value::Number(n) => BigInt::from_str(&n.to_string()).map_err(de::Error::custom),
            other => Err(de::Error::custom(format!("expected integer amount, got {}", other))),
        }
    }
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigDecimal; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigDecimal::from(BigInt::from(10u32).pow(i as u32))));

/// Compute 10^exp as BigDecimal.
pub(crate) fn big_pow10(exp: u8) -> BigDecimal {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigDecimal::from(BigInt::from(10u32).pow(exp as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_saturating_sub_clamps_at_zero() {
        assert_eq!(saturating_sub(&BigInt::from(5), &BigInt::from(3)), BigInt::from(2));
        assert_eq!(saturating_sub(&BigInt::from(3), &BigInt::from(5)), BigInt::zero());
    }

    #[rstest]
    #[case("1.4", 1)]
    #[case("1.5", 2)]
    #[case("2.49999", 2)]
    #[case("0", 0)]
    #[case("-1.5", -2)]
    fn test_round_to_bigint(#[case] input: &str, #[case] expected: i64) {
        let value = BigDecimal::from_str(input).unwrap();
        assert_eq!(round_to_bigint(&value), BigInt::from(expected));
    }

    #[test]
    fn test_truncate_to_bigint() {
        let value = BigDecimal::from_str("9902432.999").unwrap();
        assert_eq!(truncate_to_bigint(&value), BigInt::from(9_902_432));
    }

    #[rstest]
    #[case(1_500_000, 6, 1.5)]
    #[case(250_000, 6, 0.25)]
    #[case(0, 6, 0.0)]
    fn test_to_display(#[case] amount: i64, #[case] decimals: u8, #[case] expected: f64) {
        assert!((to_display(&BigInt::from(amount), decimals) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_to_decimal_truncates() {
        // 2 / 3 = 0.666666 (not rounded up)
        assert!((to_decimal(&BigInt::from(2), &BigInt::from(3)) - 0.666666).abs() < 1e-12);
        assert_eq!(to_decimal(&BigInt::from(2), &BigInt::zero()), 0.0);
    }

    #[test]
    fn test_bigint_string_accepts_string_and_number() {
        #[derive(serde::Deserialize)]
        struct Row {
            #[serde(with = "bigint_string")]
            amount: BigInt,
        }

        let a: Row = serde_json::from_str(r#"{"amount":"123456789012345678901234"}"#).unwrap();
        assert_eq!(a.amount.to_string(), "123456789012345678901234");
        let b: Row = serde_json::from_str(r#"{"amount":42}"#).unwrap();
        assert_eq!(b.amount, BigInt::from(42));
        assert!(serde_json::from_str::<Row>(r#"{"amount":"abcd"}"#).is_err());
    }
}
