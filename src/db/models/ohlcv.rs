use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::{
    db::schema::{Record, TableSchema, SWAP_OHLCV},
    utils::bigint_string,
};

/// Price candle of a pair. `pair` is `"<baseDenom>-<quoteDenom>"`,
/// prices are quote per base and `volume` is in base units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OhlcvCandle {
    pub unique_key: String,
    pub pair: String,
    pub timestamp: i64,
    pub txheight: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(with = "bigint_string")]
    pub volume: BigInt,
}

impl Record for OhlcvCandle {
    fn schema() -> &'static TableSchema {
        &SWAP_OHLCV
    }
}
