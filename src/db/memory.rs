//! In-memory storage backend.
//!
//! Applies the same validation and conflict rules as the PostgreSQL
//! backend. Used by tests and when no database is configured.

use async_trait::async_trait;
use num_bigint::BigInt;
use num_traits::Zero;
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{
    models::{
        DenomAmount, EarningOperation, LiquidityOperation, OhlcvCandle, PairInfoData,
        PoolAmountHistory, PoolApr, PoolOverview, StakingOperation, SwapOperation,
        SyncCheckpoint, VolumeRange,
    },
    schema::{
        Record, TableSchema, EARNING_OPERATIONS, LIQUIDITY_OPERATIONS, PAIR_INFOS,
        POOL_AMOUNT_HISTORY, POOL_APR, STAKING_OPERATIONS, SWAP_OHLCV, SWAP_OPERATIONS,
    },
    ChunkWrite, Storage,
};
use crate::utils::round_time;

const DAY_SECS: i64 = 86_400;

/// Table whose rows are unique by key; repeated keys are ignored.
struct KeyedTable<R> {
    rows: Vec<R>,
    keys: FxHashSet<String>,
}

impl<R> Default for KeyedTable<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            keys: FxHashSet::default(),
        }
    }
}

impl<R> KeyedTable<R> {
    fn upsert(&mut self, key: &str, record: R) {
        if self.keys.insert(key.to_string()) {
            self.rows.push(record);
        }
    }
}

#[derive(Default)]
struct Tables {
    checkpoint: Option<SyncCheckpoint>,
    pair_infos: BTreeMap<String, PairInfoData>,
    swap_ops: Vec<SwapOperation>,
    liquidity_ops: Vec<LiquidityOperation>,
    candles: Vec<OhlcvCandle>,
    staking_ops: Vec<StakingOperation>,
    earning_ops: Vec<EarningOperation>,
    pool_amounts: KeyedTable<PoolAmountHistory>,
    pool_aprs: KeyedTable<PoolApr>,
}

impl Tables {
    fn raise_checkpoint(&mut self, height: u64) {
        let current = self.checkpoint.as_ref().map(|c| c.height);
        if current.map_or(true, |h| h < height) {
            self.checkpoint = Some(SyncCheckpoint::new(height));
        }
    }

    fn apply_chunk(&mut self, chunk: &ChunkWrite) {
        self.swap_ops.extend(chunk.swap_ops.iter().cloned());
        self.liquidity_ops.extend(chunk.liquidity_ops.iter().cloned());
        self.candles.extend(chunk.candles.iter().cloned());
        self.staking_ops.extend(chunk.staking_ops.iter().cloned());
        self.earning_ops.extend(chunk.earning_ops.iter().cloned());
        for row in &chunk.pool_amounts {
            self.pool_amounts.upsert(&row.unique_key, row.clone());
        }
        for row in &chunk.pool_aprs {
            self.pool_aprs.upsert(&row.unique_key, row.clone());
        }
        self.raise_checkpoint(chunk.new_height);
    }

    fn latest_pool_amount(&self, pair_addr: &str) -> Option<&PoolAmountHistory> {
        self.pool_amounts
            .rows
            .iter()
            .filter(|row| row.pair_addr == pair_addr)
            .max_by_key(|row| (row.height, row.timestamp))
    }

    fn latest_apr(&self, pair_addr: &str) -> Option<&PoolApr> {
        self.pool_aprs
            .rows
            .iter()
            .filter(|row| row.pair_addr == pair_addr)
            .max_by_key(|row| (row.height, row.timestamp))
    }
}

/// Typed rows of a validated batch.
enum Batch {
    Swaps(Vec<SwapOperation>),
    Liquidity(Vec<LiquidityOperation>),
    Candles(Vec<OhlcvCandle>),
    Stakings(Vec<StakingOperation>),
    Earnings(Vec<EarningOperation>),
    PoolAmounts(Vec<PoolAmountHistory>),
    PoolAprs(Vec<PoolApr>),
    PairInfos(Vec<PairInfoData>),
}

fn decode<R: Record>(rows: Vec<Value>) -> anyhow::Result<Vec<R>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(anyhow::Error::from))
        .collect()
}

fn decode_batch(schema: &TableSchema, rows: Vec<Value>) -> anyhow::Result<Batch> {
    let batch = match schema.name {
        n if n == SWAP_OPERATIONS.name => Batch::Swaps(decode(rows)?),
        n if n == LIQUIDITY_OPERATIONS.name => Batch::Liquidity(decode(rows)?),
        n if n == SWAP_OHLCV.name => Batch::Candles(decode(rows)?),
        n if n == STAKING_OPERATIONS.name => Batch::Stakings(decode(rows)?),
        n if n == EARNING_OPERATIONS.name => Batch::Earnings(decode(rows)?),
        n if n == POOL_AMOUNT_HISTORY.name => Batch::PoolAmounts(decode(rows)?),
        n if n == POOL_APR.name => Batch::PoolAprs(decode(rows)?),
        n if n == PAIR_INFOS.name => Batch::PairInfos(decode(rows)?),
        other => anyhow::bail!("Unknown table {}", other),
    };
    Ok(batch)
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn load_checkpoint(&self) -> anyhow::Result<Option<u64>> {
        Ok(self.tables.read().await.checkpoint.as_ref().map(|c| c.height))
    }

    async fn seed_checkpoint(&self, height: u64) -> anyhow::Result<u64> {
        let mut tables = self.tables.write().await;
        tables.raise_checkpoint(height);
        Ok(tables.checkpoint.as_ref().map_or(height, |c| c.height))
    }

    async fn insert_rows(
        &self,
        schema: &'static TableSchema,
        rows: Vec<Value>,
    ) -> anyhow::Result<u64> {
        schema.validate(&rows)?;
        let count = rows.len() as u64;
        let batch = decode_batch(schema, rows)?;

        let mut tables = self.tables.write().await;
        match batch {
            Batch::Swaps(records) => tables.swap_ops.extend(records),
            Batch::Liquidity(records) => tables.liquidity_ops.extend(records),
            Batch::Candles(records) => tables.candles.extend(records),
            Batch::Stakings(records) => tables.staking_ops.extend(records),
            Batch::Earnings(records) => tables.earning_ops.extend(records),
            Batch::PoolAmounts(records) => {
                for record in records {
                    let key = record.unique_key.clone();
                    tables.pool_amounts.upsert(&key, record);
                }
            },
            Batch::PoolAprs(records) => {
                for record in records {
                    let key = record.unique_key.clone();
                    tables.pool_aprs.upsert(&key, record);
                }
            },
            Batch::PairInfos(records) => {
                for record in records {
                    tables.pair_infos.insert(record.pair_addr.clone(), record);
                }
            },
        }
        Ok(count)
    }

    async fn commit_chunk(&self, chunk: &ChunkWrite) -> anyhow::Result<()> {
        chunk.validated_batches()?;
        self.tables.write().await.apply_chunk(chunk);
        Ok(())
    }

    async fn count_rows(&self, schema: &'static TableSchema) -> anyhow::Result<u64> {
        let tables = self.tables.read().await;
        let count = match schema.name {
            n if n == SWAP_OPERATIONS.name => tables.swap_ops.len(),
            n if n == LIQUIDITY_OPERATIONS.name => tables.liquidity_ops.len(),
            n if n == SWAP_OHLCV.name => tables.candles.len(),
            n if n == STAKING_OPERATIONS.name => tables.staking_ops.len(),
            n if n == EARNING_OPERATIONS.name => tables.earning_ops.len(),
            n if n == POOL_AMOUNT_HISTORY.name => tables.pool_amounts.rows.len(),
            n if n == POOL_APR.name => tables.pool_aprs.rows.len(),
            n if n == PAIR_INFOS.name => tables.pair_infos.len(),
            other => anyhow::bail!("Unknown table {}", other),
        };
        Ok(count as u64)
    }

    async fn pair_infos(&self) -> anyhow::Result<Vec<PairInfoData>> {
        Ok(self.tables.read().await.pair_infos.values().cloned().collect())
    }

    async fn latest_pool_amounts(&self) -> anyhow::Result<Vec<PoolAmountHistory>> {
        let tables = self.tables.read().await;
        let mut latest: BTreeMap<&str, &PoolAmountHistory> = BTreeMap::new();
        for row in &tables.pool_amounts.rows {
            let entry = latest.entry(row.pair_addr.as_str()).or_insert(row);
            if (row.height, row.timestamp) > (entry.height, entry.timestamp) {
                *entry = row;
            }
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn volume_range(
        &self,
        base_denom: &str,
        quote_denom: &str,
        interval: i64,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<VolumeRange>> {
        let tables = self.tables.read().await;
        let mut buckets: BTreeMap<i64, (BigInt, BigInt)> = BTreeMap::new();

        for op in tables.swap_ops.iter().filter(|op| {
            op.timestamp >= start
                && op.timestamp <= end
                && ((op.offer_denom == base_denom && op.ask_denom == quote_denom)
                    || (op.offer_denom == quote_denom && op.ask_denom == base_denom))
        }) {
            let (base, quote) = buckets
                .entry(round_time(op.timestamp, interval))
                .or_insert_with(|| (BigInt::zero(), BigInt::zero()));
            if op.offer_denom == base_denom {
                *base += &op.offer_amount;
                *quote += &op.return_amount;
            } else {
                *base += &op.return_amount;
                *quote += &op.offer_amount;
            }
        }

        let pair = format!("{}-{}", base_denom, quote_denom);
        Ok(buckets
            .into_iter()
            .map(|(time, (base_volume, quote_volume))| VolumeRange {
                time,
                pair: pair.clone(),
                base_volume,
                quote_volume,
            })
            .collect())
    }

    async fn ohlcv_candles(
        &self,
        pair: &str,
        interval: i64,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<OhlcvCandle>> {
        let tables = self.tables.read().await;
        let mut candles: Vec<&OhlcvCandle> = tables
            .candles
            .iter()
            .filter(|c| c.pair == pair && c.timestamp >= start && c.timestamp <= end)
            .collect();
        candles.sort_by_key(|c| (c.timestamp, c.txheight));

        let mut buckets: BTreeMap<i64, OhlcvCandle> = BTreeMap::new();
        for candle in candles {
            let time = round_time(candle.timestamp, interval);
            match buckets.get_mut(&time) {
                Some(bucket) => {
                    bucket.high = bucket.high.max(candle.high);
                    bucket.low = bucket.low.min(candle.low);
                    bucket.close = candle.close;
                    bucket.volume += &candle.volume;
                    bucket.txheight = candle.txheight;
                },
                None => {
                    buckets.insert(
                        time,
                        OhlcvCandle {
                            unique_key: format!("{}-{}", time, pair),
                            timestamp: time,
                            ..candle.clone()
                        },
                    );
                },
            }
        }
        Ok(buckets.into_values().collect())
    }

    async fn pool_overviews(&self, now: i64) -> anyhow::Result<Vec<PoolOverview>> {
        let tables = self.tables.read().await;
        let day_ago = now - DAY_SECS;
        let week_ago = now - 7 * DAY_SECS;

        let overviews = tables
            .pair_infos
            .values()
            .map(|pair| {
                let amounts = tables.latest_pool_amount(&pair.pair_addr);
                let volume_24h = tables
                    .swap_ops
                    .iter()
                    .filter(|op| op.pair_addr == pair.pair_addr && op.timestamp >= day_ago)
                    .fold(BigInt::zero(), |acc, op| acc + &op.volume_usdt);
                let swap_fees = tables
                    .swap_ops
                    .iter()
                    .filter(|op| op.pair_addr == pair.pair_addr && op.timestamp >= week_ago)
                    .fold(BigInt::zero(), |acc, op| acc + &op.commission_usdt);
                let lp_fees = tables
                    .liquidity_ops
                    .iter()
                    .filter(|op| op.pair_addr == pair.pair_addr && op.timestamp >= week_ago)
                    .fold(BigInt::zero(), |acc, op| acc + &op.tax_rate);

                PoolOverview {
                    pair: pair.clone(),
                    offer_pool_amount: amounts
                        .map(|a| a.offer_pool_amount.clone())
                        .unwrap_or_default(),
                    ask_pool_amount: amounts.map(|a| a.ask_pool_amount.clone()).unwrap_or_default(),
                    total_share: amounts.map(|a| a.total_share.clone()).unwrap_or_default(),
                    apr: tables.latest_apr(&pair.pair_addr).map_or(0.0, |a| a.apr),
                    volume_24h,
                    fee_7_days: swap_fees + lp_fees,
                }
            })
            .collect();
        Ok(overviews)
    }

    async fn staked_by_address(
        &self,
        address: &str,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<DenomAmount>> {
        let tables = self.tables.read().await;
        let mut totals: BTreeMap<&str, (BigInt, BigInt)> = BTreeMap::new();
        for op in tables.staking_ops.iter().filter(|op| {
            op.staker_address == address && op.timestamp >= start && op.timestamp <= end
        }) {
            let (amount, usdt) = totals.entry(op.staking_asset_denom.as_str()).or_default();
            *amount += &op.stake_amount;
            *usdt += &op.stake_amount_in_usdt;
        }
        Ok(into_denom_amounts(totals))
    }

    async fn earned_by_address(
        &self,
        address: &str,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<DenomAmount>> {
        let tables = self.tables.read().await;
        let mut totals: BTreeMap<&str, (BigInt, BigInt)> = BTreeMap::new();
        for op in tables.earning_ops.iter().filter(|op| {
            op.staker_address == address && op.timestamp >= start && op.timestamp <= end
        }) {
            let (amount, usdt) = totals.entry(op.reward_asset_denom.as_str()).or_default();
            *amount += &op.earn_amount;
            *usdt += &op.earn_amount_in_usdt;
        }
        Ok(into_denom_amounts(totals))
    }
}

fn into_denom_amounts(totals: BTreeMap<&str, (BigInt, BigInt)>) -> Vec<DenomAmount> {
    totals
        .into_iter()
        .map(|(denom, (amount, amount_in_usdt))| DenomAmount {
            denom: denom.to_string(),
            amount,
            amount_in_usdt,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_records, models::LiquidityOpType};
    use serde_json::json;

    fn lp_row(index: u64, first_amount: &str) -> Value {
        json!({
            "unique_key": format!("{}-orai-1-usdt-1", index),
            "txhash": format!("TX{}", index),
            "txheight": index,
            "timestamp": index,
            "pair_addr": "orai1pair",
            "tx_creator": "orai1creator",
            "op_type": "provide",
            "first_token_denom": "orai",
            "first_token_amount": first_amount,
            "second_token_denom": "usdt",
            "second_token_amount": "1",
            "lp_share": "1",
            "first_token_lp": "1",
            "second_token_lp": "1",
            "tax_rate": "0",
        })
    }

    fn swap(timestamp: i64, offer_denom: &str, offer: i64, ask_denom: &str, ret: i64) -> SwapOperation {
        SwapOperation {
            unique_key: format!("{}-{}-{}-{}-{}", timestamp, offer_denom, offer, ask_denom, ret),
            txhash: format!("TX{}", timestamp),
            txheight: timestamp as u64,
            timestamp,
            pair_addr: "orai1pair".to_string(),
            sender: "orai1sender".to_string(),
            offer_denom: offer_denom.to_string(),
            offer_amount: BigInt::from(offer),
            ask_denom: ask_denom.to_string(),
            return_amount: BigInt::from(ret),
            tax_amount: BigInt::zero(),
            commission_amount: BigInt::zero(),
            spread_amount: BigInt::zero(),
            volume_usdt: BigInt::from(offer),
            commission_usdt: BigInt::from(1),
        }
    }

    fn pool_amount(timestamp: i64, offer: i64) -> PoolAmountHistory {
        PoolAmountHistory {
            unique_key: format!("{}-orai1pair", timestamp),
            pair_addr: "orai1pair".to_string(),
            offer_pool_amount: BigInt::from(offer),
            ask_pool_amount: BigInt::from(offer * 2),
            total_share: BigInt::from(offer),
            height: timestamp as u64,
            timestamp,
        }
    }

    fn candle(timestamp: i64, txheight: u64, open: f64, close: f64, volume: i64) -> OhlcvCandle {
        OhlcvCandle {
            unique_key: format!("{}-orai-usdt-{}", timestamp, txheight),
            pair: "orai-usdt".to_string(),
            timestamp,
            txheight,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
            volume: BigInt::from(volume),
        }
    }

    #[tokio::test]
    async fn test_bulk_insert_rejects_whole_batch() {
        let storage = MemoryStorage::new();

        let bad = vec![lp_row(1, "10"), lp_row(2, "abcd"), lp_row(3, "30")];
        assert!(storage.insert_rows(&LIQUIDITY_OPERATIONS, bad).await.is_err());
        assert_eq!(storage.count_rows(&LIQUIDITY_OPERATIONS).await.unwrap(), 0);

        let good = vec![lp_row(1, "10"), lp_row(2, "20"), lp_row(3, "30")];
        assert_eq!(storage.insert_rows(&LIQUIDITY_OPERATIONS, good).await.unwrap(), 3);
        assert_eq!(storage.count_rows(&LIQUIDITY_OPERATIONS).await.unwrap(), 3);

        let tables = storage.tables.read().await;
        assert_eq!(tables.liquidity_ops[1].first_token_amount, BigInt::from(20));
        assert_eq!(tables.liquidity_ops[1].op_type, LiquidityOpType::Provide);
    }

    #[tokio::test]
    async fn test_upsert_tables_ignore_repeated_keys() {
        let storage = MemoryStorage::new();
        let rows = vec![pool_amount(60, 10), pool_amount(120, 20)];

        insert_records(&storage, &rows).await.unwrap();
        insert_records(&storage, &rows).await.unwrap();

        assert_eq!(storage.count_rows(&POOL_AMOUNT_HISTORY).await.unwrap(), 2);
        let latest = storage.latest_pool_amounts().await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].offer_pool_amount, BigInt::from(20));
    }

    #[tokio::test]
    async fn test_checkpoint_is_monotonic() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load_checkpoint().await.unwrap(), None);
        assert_eq!(storage.seed_checkpoint(100).await.unwrap(), 100);
        assert_eq!(storage.seed_checkpoint(50).await.unwrap(), 100);

        storage.commit_chunk(&ChunkWrite::new(150)).await.unwrap();
        assert_eq!(storage.load_checkpoint().await.unwrap(), Some(150));
    }

    #[tokio::test]
    async fn test_commit_chunk_is_all_or_nothing() {
        let storage = MemoryStorage::new();
        storage.seed_checkpoint(10).await.unwrap();

        let mut chunk = ChunkWrite::new(20);
        chunk.swap_ops.push(swap(60, "orai", 10, "usdt", 20));
        // NaN serializes to null and fails validation
        chunk.candles.push(candle(60, 20, f64::NAN, 1.0, 10));

        assert!(storage.commit_chunk(&chunk).await.is_err());
        assert_eq!(storage.count_rows(&SWAP_OPERATIONS).await.unwrap(), 0);
        assert_eq!(storage.load_checkpoint().await.unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_volume_range_buckets_by_interval() {
        let storage = MemoryStorage::new();
        let mut chunk = ChunkWrite::new(1);
        chunk.swap_ops = vec![
            swap(1689174736, "orai", 10, "usdt", 20),
            swap(1689174779, "usdt", 40, "orai", 19),
            swap(1689174781, "orai", 5, "usdt", 10),
            swap(1689174790, "orai", 5, "atom", 1),
        ];
        storage.commit_chunk(&chunk).await.unwrap();

        let volumes = storage.volume_range("orai", "usdt", 60, 0, i64::MAX).await.unwrap();
        assert_eq!(volumes.len(), 2);
        assert_eq!(volumes[0].time, 1689174720);
        assert_eq!(volumes[0].base_volume, BigInt::from(29));
        assert_eq!(volumes[0].quote_volume, BigInt::from(60));
        assert_eq!(volumes[1].time, 1689174780);
        assert_eq!(volumes[1].pair, "orai-usdt");
    }

    #[tokio::test]
    async fn test_ohlcv_candles_rebucket() {
        let storage = MemoryStorage::new();
        let mut chunk = ChunkWrite::new(1);
        chunk.candles = vec![
            candle(120, 2, 2.0, 3.0, 5),
            candle(60, 1, 1.0, 2.0, 10),
            candle(180, 3, 3.0, 0.5, 1),
            candle(3600, 4, 9.0, 9.0, 1),
        ];
        storage.commit_chunk(&chunk).await.unwrap();

        let candles = storage.ohlcv_candles("orai-usdt", 3600, 0, 7200).await.unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].timestamp, 0);
        assert_eq!(candles[0].open, 1.0);
        assert_eq!(candles[0].close, 0.5);
        assert_eq!(candles[0].high, 3.0);
        assert_eq!(candles[0].low, 0.5);
        assert_eq!(candles[0].volume, BigInt::from(16));
        assert_eq!(candles[1].timestamp, 3600);
    }

    #[tokio::test]
    async fn test_pool_overviews_join_latest_state() {
        let storage = MemoryStorage::new();
        let pair = PairInfoData {
            pair_addr: "orai1pair".to_string(),
            first_asset_info: r#"{"native_token":{"denom":"orai"}}"#.to_string(),
            second_asset_info: r#"{"token":{"contract_addr":"usdt"}}"#.to_string(),
            commission_rate: "0.003".to_string(),
            liquidity_addr: "orai1lp".to_string(),
            oracle_addr: "orai1oracle".to_string(),
            symbols: "ORAI/USDT".to_string(),
        };
        insert_records(&storage, &[pair]).await.unwrap();

        let now = 10 * DAY_SECS;
        let mut chunk = ChunkWrite::new(1);
        chunk.swap_ops = vec![swap(now - 100, "orai", 10, "usdt", 20), swap(now - 2 * DAY_SECS, "orai", 7, "usdt", 14)];
        chunk.pool_amounts = vec![pool_amount(now - 50, 42), pool_amount(now - 500, 1)];
        storage.commit_chunk(&chunk).await.unwrap();

        let overviews = storage.pool_overviews(now).await.unwrap();
        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].offer_pool_amount, BigInt::from(42));
        assert_eq!(overviews[0].volume_24h, BigInt::from(10));
        assert_eq!(overviews[0].fee_7_days, BigInt::from(2));
        assert_eq!(overviews[0].apr, 0.0);
    }

    #[tokio::test]
    async fn test_staked_and_earned_by_address() {
        let storage = MemoryStorage::new();
        let mut chunk = ChunkWrite::new(1);
        for (i, amount) in [10, 15].into_iter().enumerate() {
            chunk.staking_ops.push(StakingOperation {
                unique_key: format!("stake-{}", i),
                txhash: format!("TX{}", i),
                txheight: 1,
                timestamp: 100 + i as i64,
                staker_address: "orai1staker".to_string(),
                staking_asset_denom: "orai1lp".to_string(),
                stake_amount: BigInt::from(amount),
                stake_amount_in_usdt: BigInt::from(amount * 2),
            });
        }
        chunk.earning_ops.push(EarningOperation {
            unique_key: "earn-0".to_string(),
            txhash: "TX9".to_string(),
            txheight: 1,
            timestamp: 500,
            staker_address: "orai1staker".to_string(),
            staking_asset_denom: "orai1lp".to_string(),
            reward_asset_denom: "orai".to_string(),
            earn_amount: BigInt::from(3),
            earn_amount_in_usdt: BigInt::from(6),
        });
        storage.commit_chunk(&chunk).await.unwrap();

        let staked = storage.staked_by_address("orai1staker", 0, 200).await.unwrap();
        assert_eq!(staked.len(), 1);
        assert_eq!(staked[0].amount, BigInt::from(25));
        assert_eq!(staked[0].amount_in_usdt, BigInt::from(50));

        assert!(storage.earned_by_address("orai1staker", 0, 200).await.unwrap().is_empty());
        let earned = storage.earned_by_address("orai1staker", 0, 1000).await.unwrap();
        assert_eq!(earned[0].denom, "orai");
        assert_eq!(earned[0].amount_in_usdt, BigInt::from(6));
    }
}
