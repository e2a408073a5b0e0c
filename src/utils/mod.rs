//! Utility functions for the oraidex indexer.
//!
//! This module is organized into focused submodules:
//!
//! - [`conversion`] - BigInt/BigDecimal fixed-point helpers and serde adapters
//! - [`time`] - Block timestamp parsing and interval bucketing
//! - [`unique_key`] - Deterministic keys for idempotent upserts

pub mod conversion;
mod time;
mod unique_key;

// ============================================
// Common Constants
// ============================================

/// Seconds in a (non-leap) year, used to annualize reward rates.
pub const SEC_PER_YEAR: u64 = 31_536_000;

// ============================================
// Re-exports
// ============================================

// Conversion utilities
pub use conversion::{
    bigint_string, decimal_to_f64, parse_decimal, round_to_bigint, saturating_sub, to_decimal,
    to_display, truncate_to_bigint, DEFAULT_DECIMALS,
};

// Time utilities
pub use time::{bucket, parse_timestamp, round_time, CANDLE_INTERVAL_SECS};

// Unique key utilities
pub use unique_key::{
    concat_apr_key, concat_data_to_unique_key, concat_event_key, concat_pool_amount_key,
};
