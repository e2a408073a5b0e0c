use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use super::router::ExecuteSwapOperations;
use crate::utils::bigint_string;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cw20QueryMsg {
    TokenInfo {},
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfoResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub decimals: u8,
    #[serde(with = "bigint_string")]
    pub total_supply: BigInt,
}

/// `send` envelope: cw20 tokens forwarded to a contract with a base64 hook.
#[derive(Debug, Clone, Deserialize)]
pub struct Cw20Send {
    pub contract: String,
    pub amount: String,
    pub msg: String,
}

/// Hook payloads the exchange contracts accept inside a cw20 `send`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cw20HookMsg {
    Swap {
        #[serde(default)]
        belief_price: Option<String>,
        #[serde(default)]
        max_spread: Option<String>,
        #[serde(default)]
        to: Option<String>,
    },
    ExecuteSwapOperations(ExecuteSwapOperations),
    WithdrawLiquidity {},
    Bond {},
    /// Any hook the indexer does not track
    #[serde(skip_deserializing)]
    Unrecognized,
}
