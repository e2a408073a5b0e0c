use anyhow::Context;
use async_trait::async_trait;
use log::{debug, error};
use num_bigint::BigInt;
use postgres_types::ToSql;
use serde_json::Value;
use std::str::FromStr;

use crate::db::{
    models::{
        DenomAmount, OhlcvCandle, PairInfoData, PoolAmountHistory, PoolOverview, SyncCheckpoint,
        VolumeRange,
    },
    postgres::PostgresClient,
    schema::{Cell, ColumnType, Conflict, Row, TableSchema},
    ChunkWrite, Storage,
};

/// PostgreSQL caps a statement at 65535 bind parameters.
const MAX_PARAMS: usize = 65_535;

/// Upper bound on rows per INSERT statement
const BATCH_SIZE: usize = 1_000;

const DAY_SECS: i64 = 86_400;

const UPSERT_CHECKPOINT: &str = r#"
    INSERT INTO height_snapshot (id, current_ind, updated_at)
    VALUES (1, $1, $2)
    ON CONFLICT (id) DO UPDATE SET
        current_ind = EXCLUDED.current_ind,
        updated_at = EXCLUDED.updated_at
    WHERE height_snapshot.current_ind < EXCLUDED.current_ind
"#;

// ==================== STATEMENT BUILDING ====================

fn placeholder(ty: ColumnType, n: usize) -> String {
    match ty {
        // Bound as text so values wider than i64 survive
        ColumnType::Numeric => format!("${}::TEXT::NUMERIC", n),
        _ => format!("${}", n),
    }
}

/// Build a multi-row INSERT: `VALUES ($1,...,$n), ($n+1,...)` plus the
/// table's conflict clause.
fn insert_statement(schema: &TableSchema, row_count: usize) -> String {
    let cols_per_row = schema.columns.len();
    let values_clauses: Vec<String> = (0..row_count)
        .map(|i| {
            let start = i * cols_per_row + 1;
            let placeholders: Vec<String> = schema
                .columns
                .iter()
                .enumerate()
                .map(|(offset, column)| placeholder(column.ty, start + offset))
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();

    let column_names: Vec<&str> = schema.columns.iter().map(|c| c.name).collect();

    let conflict_clause = match schema.conflict {
        Conflict::Append => String::new(),
        Conflict::Ignore(key) => format!("ON CONFLICT ({}) DO NOTHING", key),
        Conflict::Replace(key) => {
            let updates: Vec<String> = schema
                .columns
                .iter()
                .filter(|c| c.name != key)
                .map(|c| format!("{0} = EXCLUDED.{0}", c.name))
                .collect();
            format!("ON CONFLICT ({}) DO UPDATE SET {}", key, updates.join(", "))
        },
    };

    format!(
        "INSERT INTO {} ({}) VALUES {} {}",
        schema.name,
        column_names.join(", "),
        values_clauses.join(", "),
        conflict_clause
    )
}

fn cell_param(cell: &Cell) -> &(dyn ToSql + Sync) {
    match cell {
        Cell::Text(v) | Cell::Numeric(v) => v as &(dyn ToSql + Sync),
        Cell::BigInt(v) => v as &(dyn ToSql + Sync),
        Cell::Double(v) => v as &(dyn ToSql + Sync),
    }
}

fn rows_per_statement(schema: &TableSchema) -> usize {
    (MAX_PARAMS / schema.columns.len().max(1)).min(BATCH_SIZE)
}

async fn write_rows(
    tx: &deadpool_postgres::Transaction<'_>,
    schema: &TableSchema,
    rows: &[Row],
) -> anyhow::Result<()> {
    for chunk in rows.chunks(rows_per_statement(schema)) {
        let query = insert_statement(schema, chunk.len());
        let params: Vec<&(dyn ToSql + Sync)> = chunk.iter().flatten().map(cell_param).collect();

        tx.execute(&query, &params).await.map_err(|e| {
            error!("Failed to batch insert {} rows into {}: {:?}", chunk.len(), schema.name, e);
            e
        })?;
    }
    Ok(())
}

// ==================== ROW DECODING ====================

fn numeric(row: &tokio_postgres::Row, column: &str) -> anyhow::Result<BigInt> {
    let raw: String = row.try_get(column)?;
    // NUMERIC::TEXT of an integer column has no fractional part
    let digits = raw.split('.').next().unwrap_or("0");
    BigInt::from_str(digits).with_context(|| format!("Invalid numeric `{}` in {}", raw, column))
}

fn row_to_pair_info(row: &tokio_postgres::Row) -> anyhow::Result<PairInfoData> {
    Ok(PairInfoData {
        pair_addr: row.try_get("pair_addr")?,
        first_asset_info: row.try_get("first_asset_info")?,
        second_asset_info: row.try_get("second_asset_info")?,
        commission_rate: row.try_get("commission_rate")?,
        liquidity_addr: row.try_get("liquidity_addr")?,
        oracle_addr: row.try_get("oracle_addr")?,
        symbols: row.try_get("symbols")?,
    })
}

fn row_to_pool_amount(row: &tokio_postgres::Row) -> anyhow::Result<PoolAmountHistory> {
    Ok(PoolAmountHistory {
        unique_key: row.try_get("unique_key")?,
        pair_addr: row.try_get("pair_addr")?,
        offer_pool_amount: numeric(row, "offer_pool_amount")?,
        ask_pool_amount: numeric(row, "ask_pool_amount")?,
        total_share: numeric(row, "total_share")?,
        height: row.try_get::<_, i64>("height")? as u64,
        timestamp: row.try_get("timestamp")?,
    })
}

fn row_to_denom_amount(row: &tokio_postgres::Row) -> anyhow::Result<DenomAmount> {
    Ok(DenomAmount {
        denom: row.try_get("denom")?,
        amount: numeric(row, "amount")?,
        amount_in_usdt: numeric(row, "amount_in_usdt")?,
    })
}

#[async_trait]
impl Storage for PostgresClient {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        self.run_migrations().await
    }

    // ==================== SYNC CHECKPOINT ====================

    async fn load_checkpoint(&self) -> anyhow::Result<Option<u64>> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt("SELECT current_ind FROM height_snapshot WHERE id = 1", &[])
            .await?;
        Ok(row.map(|r| r.get::<_, i64>("current_ind") as u64))
    }

    async fn seed_checkpoint(&self, height: u64) -> anyhow::Result<u64> {
        let checkpoint = SyncCheckpoint::new(height);
        {
            let client = self.pool.get().await?;
            client
                .execute(UPSERT_CHECKPOINT, &[&(checkpoint.height as i64), &checkpoint.updated_at])
                .await
                .map_err(|e| {
                    error!("Failed to seed checkpoint at height {}: {:?}", height, e);
                    e
                })?;
        }
        Ok(self.load_checkpoint().await?.unwrap_or(height))
    }

    // ==================== BULK WRITES ====================

    async fn insert_rows(
        &self,
        schema: &'static TableSchema,
        rows: Vec<Value>,
    ) -> anyhow::Result<u64> {
        let validated = schema.validate(&rows)?;
        if validated.is_empty() {
            return Ok(0);
        }

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        write_rows(&tx, schema, &validated).await?;
        tx.commit().await?;

        Ok(validated.len() as u64)
    }

    async fn commit_chunk(&self, chunk: &ChunkWrite) -> anyhow::Result<()> {
        let batches = chunk.validated_batches()?;
        let checkpoint = SyncCheckpoint::new(chunk.new_height);

        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        for (schema, rows) in &batches {
            write_rows(&tx, schema, rows).await?;
        }

        tx.execute(UPSERT_CHECKPOINT, &[&(checkpoint.height as i64), &checkpoint.updated_at])
            .await
            .map_err(|e| {
                error!("Failed to advance checkpoint to {}: {:?}", chunk.new_height, e);
                e
            })?;

        tx.commit().await.context("Failed to commit chunk transaction")?;

        debug!(
            "Committed {} records across {} tables at height {}",
            chunk.record_count(),
            batches.len(),
            chunk.new_height
        );
        Ok(())
    }

    // ==================== READS ====================

    async fn count_rows(&self, schema: &'static TableSchema) -> anyhow::Result<u64> {
        let client = self.pool.get().await?;
        let query = format!("SELECT COUNT(*) AS count FROM {}", schema.name);
        let row = client.query_one(&query, &[]).await?;
        Ok(row.get::<_, i64>("count") as u64)
    }

    async fn pair_infos(&self) -> anyhow::Result<Vec<PairInfoData>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT pair_addr, first_asset_info, second_asset_info, commission_rate,
                   liquidity_addr, oracle_addr, symbols
            FROM pair_infos
            ORDER BY pair_addr
        "#;
        let rows = client.query(query, &[]).await?;
        rows.iter().map(row_to_pair_info).collect()
    }

    async fn latest_pool_amounts(&self) -> anyhow::Result<Vec<PoolAmountHistory>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT DISTINCT ON (pair_addr)
                unique_key, pair_addr,
                offer_pool_amount::TEXT AS offer_pool_amount,
                ask_pool_amount::TEXT AS ask_pool_amount,
                total_share::TEXT AS total_share,
                height, timestamp
            FROM pool_amount_history
            ORDER BY pair_addr, height DESC, timestamp DESC
        "#;
        let rows = client.query(query, &[]).await?;
        rows.iter().map(row_to_pool_amount).collect()
    }

    async fn volume_range(
        &self,
        base_denom: &str,
        quote_denom: &str,
        interval: i64,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<VolumeRange>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                (timestamp / $3) * $3 AS bucket,
                SUM(CASE WHEN offer_denom = $1 THEN offer_amount ELSE return_amount END)::TEXT AS base_volume,
                SUM(CASE WHEN offer_denom = $2 THEN offer_amount ELSE return_amount END)::TEXT AS quote_volume
            FROM swap_ops_data
            WHERE ((offer_denom = $1 AND ask_denom = $2) OR (offer_denom = $2 AND ask_denom = $1))
              AND timestamp >= $4 AND timestamp <= $5
            GROUP BY bucket
            ORDER BY bucket
        "#;
        let rows = client
            .query(query, &[&base_denom, &quote_denom, &interval, &start, &end])
            .await?;

        let pair = format!("{}-{}", base_denom, quote_denom);
        rows.iter()
            .map(|row| {
                Ok(VolumeRange {
                    time: row.try_get("bucket")?,
                    pair: pair.clone(),
                    base_volume: numeric(row, "base_volume")?,
                    quote_volume: numeric(row, "quote_volume")?,
                })
            })
            .collect()
    }

    async fn ohlcv_candles(
        &self,
        pair: &str,
        interval: i64,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<OhlcvCandle>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                (timestamp / $2) * $2 AS bucket,
                (ARRAY_AGG(open ORDER BY timestamp ASC, txheight ASC))[1] AS open,
                (ARRAY_AGG(close ORDER BY timestamp DESC, txheight DESC))[1] AS close,
                MAX(high) AS high,
                MIN(low) AS low,
                SUM(volume)::TEXT AS volume,
                MAX(txheight) AS txheight
            FROM swap_ohlcv
            WHERE pair = $1 AND timestamp >= $3 AND timestamp <= $4
            GROUP BY bucket
            ORDER BY bucket
        "#;
        let rows = client.query(query, &[&pair, &interval, &start, &end]).await?;

        rows.iter()
            .map(|row| {
                let time: i64 = row.try_get("bucket")?;
                Ok(OhlcvCandle {
                    unique_key: format!("{}-{}", time, pair),
                    pair: pair.to_string(),
                    timestamp: time,
                    txheight: row.try_get::<_, i64>("txheight")? as u64,
                    open: row.try_get("open")?,
                    high: row.try_get("high")?,
                    low: row.try_get("low")?,
                    close: row.try_get("close")?,
                    volume: numeric(row, "volume")?,
                })
            })
            .collect()
    }

    async fn pool_overviews(&self, now: i64) -> anyhow::Result<Vec<PoolOverview>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                p.pair_addr, p.first_asset_info, p.second_asset_info, p.commission_rate,
                p.liquidity_addr, p.oracle_addr, p.symbols,
                COALESCE(pa.offer_pool_amount, 0)::TEXT AS offer_pool_amount,
                COALESCE(pa.ask_pool_amount, 0)::TEXT AS ask_pool_amount,
                COALESCE(pa.total_share, 0)::TEXT AS total_share,
                COALESCE(apr.apr, 0) AS apr,
                COALESCE((
                    SELECT SUM(s.volume_usdt) FROM swap_ops_data s
                    WHERE s.pair_addr = p.pair_addr AND s.timestamp >= $1
                ), 0)::TEXT AS volume_24h,
                (
                    COALESCE((
                        SELECT SUM(s.commission_usdt) FROM swap_ops_data s
                        WHERE s.pair_addr = p.pair_addr AND s.timestamp >= $2
                    ), 0)
                    + COALESCE((
                        SELECT SUM(l.tax_rate) FROM lp_ops_data l
                        WHERE l.pair_addr = p.pair_addr AND l.timestamp >= $2
                    ), 0)
                )::TEXT AS fee_7_days
            FROM pair_infos p
            LEFT JOIN LATERAL (
                SELECT offer_pool_amount, ask_pool_amount, total_share
                FROM pool_amount_history h
                WHERE h.pair_addr = p.pair_addr
                ORDER BY h.height DESC, h.timestamp DESC
                LIMIT 1
            ) pa ON TRUE
            LEFT JOIN LATERAL (
                SELECT a.apr
                FROM pool_apr a
                WHERE a.pair_addr = p.pair_addr
                ORDER BY a.height DESC, a.timestamp DESC
                LIMIT 1
            ) apr ON TRUE
            ORDER BY p.pair_addr
        "#;
        let day_ago = now - DAY_SECS;
        let week_ago = now - 7 * DAY_SECS;
        let rows = client.query(query, &[&day_ago, &week_ago]).await?;

        rows.iter()
            .map(|row| {
                Ok(PoolOverview {
                    pair: row_to_pair_info(row)?,
                    offer_pool_amount: numeric(row, "offer_pool_amount")?,
                    ask_pool_amount: numeric(row, "ask_pool_amount")?,
                    total_share: numeric(row, "total_share")?,
                    apr: row.try_get("apr")?,
                    volume_24h: numeric(row, "volume_24h")?,
                    fee_7_days: numeric(row, "fee_7_days")?,
                })
            })
            .collect()
    }

    async fn staked_by_address(
        &self,
        address: &str,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<DenomAmount>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                staking_asset_denom AS denom,
                SUM(stake_amount)::TEXT AS amount,
                SUM(stake_amount_in_usdt)::TEXT AS amount_in_usdt
            FROM stakings
            WHERE staker_address = $1 AND timestamp >= $2 AND timestamp <= $3
            GROUP BY staking_asset_denom
            ORDER BY staking_asset_denom
        "#;
        let rows = client.query(query, &[&address, &start, &end]).await?;
        rows.iter().map(row_to_denom_amount).collect()
    }

    async fn earned_by_address(
        &self,
        address: &str,
        start: i64,
        end: i64,
    ) -> anyhow::Result<Vec<DenomAmount>> {
        let client = self.pool.get().await?;
        let query = r#"
            SELECT
                reward_asset_denom AS denom,
                SUM(earn_amount)::TEXT AS amount,
                SUM(earn_amount_in_usdt)::TEXT AS amount_in_usdt
            FROM earnings
            WHERE staker_address = $1 AND timestamp >= $2 AND timestamp <= $3
            GROUP BY reward_asset_denom
            ORDER BY reward_asset_denom
        "#;
        let rows = client.query(query, &[&address, &start, &end]).await?;
        rows.iter().map(row_to_denom_amount).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{PAIR_INFOS, POOL_AMOUNT_HISTORY, SWAP_OPERATIONS};

    #[test]
    fn test_insert_statement_append() {
        let query = insert_statement(&SWAP_OPERATIONS, 2);
        assert!(query.starts_with("INSERT INTO swap_ops_data (unique_key, txhash,"));
        assert!(query.contains("$8::TEXT::NUMERIC"));
        assert!(query.contains("($16, $17,"));
        assert!(!query.contains("ON CONFLICT"));
    }

    #[test]
    fn test_insert_statement_conflict_clauses() {
        let ignore = insert_statement(&POOL_AMOUNT_HISTORY, 1);
        assert!(ignore.ends_with("ON CONFLICT (unique_key) DO NOTHING"));

        let replace = insert_statement(&PAIR_INFOS, 1);
        assert!(replace.contains("ON CONFLICT (pair_addr) DO UPDATE SET"));
        assert!(replace.contains("symbols = EXCLUDED.symbols"));
        assert!(!replace.contains("pair_addr = EXCLUDED.pair_addr"));
    }

    #[test]
    fn test_rows_per_statement_respects_param_limit() {
        assert_eq!(rows_per_statement(&SWAP_OPERATIONS), BATCH_SIZE);
        assert!(rows_per_statement(&SWAP_OPERATIONS) * SWAP_OPERATIONS.columns.len() <= MAX_PARAMS);
    }
}
