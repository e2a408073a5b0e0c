use config::{Config, ConfigError, File};
use serde::Deserialize;

/// PostgreSQL database connection configuration.
///
/// Used for storing:
/// - Sync checkpoint
/// - Pair registry
/// - Swap, liquidity, staking and earning history
/// - Pool amount and APR snapshots
#[derive(Debug, Deserialize, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    16
}

/// Chain endpoints and the contract addresses the indexer reads from.
#[derive(Debug, Deserialize, Clone)]
pub struct ChainSettings {
    /// LCD (REST) endpoint, e.g. `https://lcd.orai.io`
    pub lcd_url: String,
    #[serde(default = "default_multicall_address")]
    pub multicall_address: String,
    #[serde(default = "default_factory_addresses")]
    pub factory_addresses: Vec<String>,
    #[serde(default = "default_staking_address")]
    pub staking_address: String,
    #[serde(default = "default_hub_denom")]
    pub hub_denom: String,
    #[serde(default = "default_usdt_denom")]
    pub usdt_denom: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_multicall_address() -> String {
    "orai1q7x644gmf7h8u8y6y8t9z9nnwl8djkmspypr6mxavsk9ual7dj0sxpmgwd".to_string()
}

fn default_factory_addresses() -> Vec<String> {
    vec![
        "orai1hemdkz4xx9kukgrunxu3yw0nvpyxf34v82d2c8".to_string(),
        "orai167r4ut7avvgpp3rlzksz6vw5spmykluzagvmj3ht845fjschwugqjsqhst".to_string(),
    ]
}

fn default_staking_address() -> String {
    "orai19p43y0tqnr5qlhfwnxft2u5unph5yn60y7tuvu".to_string()
}

fn default_hub_denom() -> String {
    "orai".to_string()
}

fn default_usdt_denom() -> String {
    "orai12hzjxfh77wl572gdzct2fxv2arxcwh6gykc7qh".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Chunk loop, retry and analytics tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    /// Lowest height the checkpoint is ever seeded to
    #[serde(default = "default_start_height")]
    pub start_height: u64,
    /// Number of blocks requested per chunk
    #[serde(default = "default_chunk_limit")]
    pub chunk_limit: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive failures of one chunk before the worker halts
    #[serde(default = "default_max_chunk_attempts")]
    pub max_chunk_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    /// Parallel contract queries when collecting APR inputs
    #[serde(default = "default_query_concurrency")]
    pub query_concurrency: usize,
    /// Withdraw tax rate applied to native-token refunds
    #[serde(default = "default_tax_rate")]
    pub tax_rate: String,
    #[serde(default = "default_tax_cap")]
    pub tax_cap: u64,
}

fn default_start_height() -> u64 {
    12_388_825
}

fn default_chunk_limit() -> u64 {
    100
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_chunk_attempts() -> u32 {
    10
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    60_000
}

fn default_query_concurrency() -> usize {
    8
}

fn default_tax_rate() -> String {
    "0.3".to_string()
}

fn default_tax_cap() -> u64 {
    1_000_000
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            start_height: default_start_height(),
            chunk_limit: default_chunk_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            max_chunk_attempts: default_max_chunk_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            query_concurrency: default_query_concurrency(),
            tax_rate: default_tax_rate(),
            tax_cap: default_tax_cap(),
        }
    }
}

/// Root application configuration.
///
/// Loaded from `config.yaml` at startup. When the `postgres` section is
/// missing the indexer keeps its state in memory only.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    #[serde(default)]
    pub postgres: Option<PostgresSettings>,
    pub chain: ChainSettings,
    #[serde(default)]
    pub sync: SyncSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let yaml = r#"
chain:
  lcd_url: "http://localhost:1317"
"#;
        let settings: Settings = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert!(settings.postgres.is_none());
        assert_eq!(settings.chain.hub_denom, "orai");
        assert_eq!(settings.chain.factory_addresses.len(), 2);
        assert_eq!(settings.sync.start_height, 12_388_825);
        assert_eq!(settings.sync.chunk_limit, 100);
        assert_eq!(settings.sync.tax_cap, 1_000_000);
    }
}
