use serde::{Deserialize, Serialize};

/// Single sub-query of an `aggregate` call; `data` is base64 JSON.
#[derive(Debug, Clone, Serialize)]
pub struct Call {
    pub address: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MulticallQueryMsg {
    Aggregate { queries: Vec<Call> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallResult {
    pub success: bool,
    #[serde(default)]
    pub data: String,
}

/// Results are positional: `return_data[i]` answers `queries[i]`.
#[derive(Debug, Clone, Deserialize)]
pub struct AggregateResponse {
    pub return_data: Vec<CallResult>,
}
