use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Settings;

pub mod memory;
pub mod models;
pub mod postgres;
pub mod schema;

pub use memory::MemoryStorage;
pub use postgres::PostgresClient;
pub use schema::{Record, SchemaError, TableSchema};

use models::{
    DenomAmount, EarningOperation, LiquidityOperation, OhlcvCandle, PairInfoData,
    PoolAmountHistory, PoolApr, PoolOverview, StakingOperation, SwapOperation, VolumeRange,
};
use schema::{to_rows, Row};

/// Everything one chunk writes, committed together with its checkpoint.
#[derive(Debug, Clone, Default)]
pub struct ChunkWrite {
    pub new_height: u64,
    pub swap_ops: Vec<SwapOperation>,
    pub liquidity_ops: Vec<LiquidityOperation>,
    pub candles: Vec<OhlcvCandle>,
    pub staking_ops: Vec<StakingOperation>,
    pub earning_ops: Vec<EarningOperation>,
    pub pool_amounts: Vec<PoolAmountHistory>,
    pub pool_aprs: Vec<PoolApr>,
}

impl ChunkWrite {
    pub fn new(new_height: u64) -> Self {
        Self {
            new_height,
            ..Default::default()
        }
    }

    pub fn record_count(&self) -> usize {
        self.swap_ops.len()
            + self.liquidity_ops.len()
            + self.candles.len()
            + self.staking_ops.len()
            + self.earning_ops.len()
            + self.pool_amounts.len()
            + self.pool_aprs.len()
    }

    /// Serialize and validate every batch before anything is written.
    pub fn validated_batches(&self) -> Result<Vec<(&'static TableSchema, Vec<Row>)>, SchemaError> {
        fn batch<R: Record>(
            records: &[R],
        ) -> Result<Option<(&'static TableSchema, Vec<Row>)>, SchemaError> {
            if records.is_empty() {
                return Ok(None);
            }
            let rows = R::schema().validate(&to_rows(records)?)?;
            Ok(Some((R::schema(), rows)))
        }

        Ok([
            batch(&self.swap_ops)?,
            batch(&self.liquidity_ops)?,
            batch(&self.candles)?,
            batch(&self.staking_ops)?,
            batch(&self.earning_ops)?,
            batch(&self.pool_amounts)?,
            batch(&self.pool_aprs)?,
        ]
        .into_iter()
        .flatten()
        .collect())
    }
}

/// Persistence backend of the indexer.
///
/// A single writer (the sync worker) calls the write methods; the read
/// methods serve the query surface and may run concurrently with writes.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Backend name for logging
    fn backend_type(&self) -> &'static str;

    /// Create all tables if they do not exist.
    async fn migrate(&self) -> anyhow::Result<()>;

    async fn load_checkpoint(&self) -> anyhow::Result<Option<u64>>;

    /// Raise the checkpoint to `height` if it is absent or lower.
    /// Returns the stored checkpoint afterwards.
    async fn seed_checkpoint(&self, height: u64) -> anyhow::Result<u64>;

    /// Validated bulk write of raw JSON rows into one table.
    ///
    /// The whole batch is rejected if any row violates the table layout.
    /// Upsert tables skip (or replace) rows whose key already exists.
    /// Returns the number of rows in the batch.
    async fn insert_rows(&self, schema: &'static TableSchema, rows: Vec<Value>)
        -> anyhow::Result<u64>;

    /// Write all records of a chunk and advance the checkpoint atomically.
    async fn commit_chunk(&self, chunk: &ChunkWrite) -> anyhow::Result<()>;

    async fn count_rows(&self, schema: &'static TableSchema) -> anyhow::Result<u64>;

    async fn pair_infos(&self) -> anyhow::Result<Vec<PairInfoData>>;

    /// Most recent pool amount row of every pair, by height.
    async fn latest_pool_amounts(&self) -> anyhow::Result<Vec<PoolAmountHistory>>;

    /// Volume of a pair bucketed by `interval` seconds within `[start, end]`.
    async fn volume_range(
        &self,
        base_denom: &str,
        quote_denom: &str,
        interval: i64,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<VolumeRange>>;

    /// Candles of a pair re-bucketed to `interval` seconds within `[start, end]`.
    async fn ohlcv_candles(
        &self,
        pair: &str,
        interval: i64,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<OhlcvCandle>>;

    /// Every registered pair with its latest reserves, APR, 24h volume
    /// and 7 day fees relative to `now`.
    async fn pool_overviews(&self, now: i64) -> anyhow::Result<Vec<PoolOverview>>;

    async fn staked_by_address(
        &self,
        address: &str,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<DenomAmount>>;

    async fn earned_by_address(
        &self,
        address: &str,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<DenomAmount>>;
}

/// Serialize typed records and bulk write them.
pub async fn insert_records<R: Record>(storage: &dyn Storage, records: &[R]) -> anyhow::Result<u64> {
    if records.is_empty() {
        return Ok(0);
    }
    let rows = to_rows(records)?;
    storage.insert_rows(R::schema(), rows).await
}

/// Open the configured backend.
///
/// PostgreSQL when the `postgres` section is present, otherwise an
/// in-memory store that does not survive restarts.
pub async fn connect(settings: &Settings) -> anyhow::Result<Arc<dyn Storage>> {
    match &settings.postgres {
        Some(pg) => Ok(Arc::new(PostgresClient::new(pg.clone()).await?)),
        None => {
            log::warn!("No postgres section configured, sync state will be kept in memory only");
            Ok(Arc::new(MemoryStorage::new()))
        },
    }
}
