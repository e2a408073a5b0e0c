use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use rustc_hash::FxHashSet;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};
use tokio::sync::Mutex;

use crate::{
    config::{ChainSettings, SyncSettings},
    contracts::PairInfo,
    db::{
        insert_records,
        models::PoolApr,
        schema::{POOL_AMOUNT_HISTORY, POOL_APR},
        ChunkWrite, Storage,
    },
    worker::{
        analytics::{
            accumulate_lp_data, apply_liquidity_fees, build_ohlcv, build_pool_aprs,
            collect_pool_amount_history, fetch_apr_inputs, initial_pool_amounts, value_earnings,
            value_stakings, value_swaps, FeeParams,
        },
        chain_client::ChainQuerier,
        feed::{Chunk, ChunkProcessor},
        pair_registry::PairRegistry,
        parser::{parse_txs, DomainEvent},
        pool_state::{PoolSnapshot, PoolStateResolver},
        price_resolver::PriceResolver,
    },
};

/// Interval for logging progress updates (10 seconds)
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(10);

/// Lifecycle of the sync worker. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Init,
    Seeding,
    Running,
    Failed,
}

/// State serialized across chunks.
struct RunState {
    state: SyncState,
    checkpoint: u64,
    /// Chunk currently failing and how many times in a row
    failing_height: Option<u64>,
    attempts: u32,
    last_progress_log: Instant,
}

/// Drives the indexing pipeline for delivered chunks.
///
/// Each chunk is processed in one pass:
/// - Parses transactions into swap, liquidity, staking and reward events
/// - Resolves pool reserves at the checkpoint height and USDT prices
/// - Derives fees, LP amounts, pool history, candles and APR
/// - Commits every record together with the new checkpoint
///
/// Chunks are serialized: chunk i+1 waits until chunk i has committed.
pub struct SyncWorker {
    storage: Arc<dyn Storage>,
    querier: Arc<dyn ChainQuerier>,
    registry: PairRegistry,
    pool_resolver: PoolStateResolver,
    fee_params: FeeParams,
    hub_denom: String,
    usdt_denom: String,
    start_height: u64,
    max_chunk_attempts: u32,
    query_concurrency: usize,
    run_state: Mutex<RunState>,
    halted: AtomicBool,
}

impl SyncWorker {
    pub fn new(
        storage: Arc<dyn Storage>,
        querier: Arc<dyn ChainQuerier>,
        chain: &ChainSettings,
        sync: &SyncSettings,
    ) -> anyhow::Result<Self> {
        let fee_params = FeeParams::new(&sync.tax_rate, sync.tax_cap)?;
        let registry = PairRegistry::new(
            querier.clone(),
            storage.clone(),
            chain.factory_addresses.clone(),
        );

        Ok(Self {
            storage,
            querier: querier.clone(),
            registry,
            pool_resolver: PoolStateResolver::new(querier),
            fee_params,
            hub_denom: chain.hub_denom.clone(),
            usdt_denom: chain.usdt_denom.clone(),
            start_height: sync.start_height,
            max_chunk_attempts: sync.max_chunk_attempts.max(1),
            query_concurrency: sync.query_concurrency,
            run_state: Mutex::new(RunState {
                state: SyncState::Init,
                checkpoint: 0,
                failing_height: None,
                attempts: 0,
                last_progress_log: Instant::now(),
            }),
            halted: AtomicBool::new(false),
        })
    }

    pub async fn state(&self) -> SyncState {
        self.run_state.lock().await.state
    }

    /// Last committed height.
    pub async fn checkpoint(&self) -> u64 {
        self.run_state.lock().await.checkpoint
    }

    pub fn registry(&self) -> &PairRegistry {
        &self.registry
    }

    /// Prepare storage and derived state before the first chunk.
    ///
    /// Any failure is fatal: the worker moves to `Failed` and the error
    /// is returned to the caller.
    pub async fn seed(&self) -> anyhow::Result<()> {
        let mut run = self.run_state.lock().await;
        run.state = SyncState::Seeding;

        match self.seed_storage().await {
            Ok(checkpoint) => {
                run.checkpoint = checkpoint;
                run.state = SyncState::Running;
                info!(
                    "Sync worker seeded on {} at height {} with {} pairs",
                    self.storage.backend_type(),
                    checkpoint,
                    self.registry.pairs().len()
                );
                Ok(())
            },
            Err(e) => {
                run.state = SyncState::Failed;
                self.halted.store(true, Ordering::SeqCst);
                Err(e.context("Failed to seed sync worker"))
            },
        }
    }

    async fn seed_storage(&self) -> anyhow::Result<u64> {
        self.storage.migrate().await.context("Failed to migrate storage")?;
        let checkpoint = self.storage.seed_checkpoint(self.start_height).await?;
        let pairs = self.registry.refresh().await?;

        if self.storage.count_rows(&POOL_AMOUNT_HISTORY).await? == 0 {
            let pools = self.pool_resolver.resolve(&pairs, checkpoint).await?;
            let rows = initial_pool_amounts(&pairs, &pools, Utc::now().timestamp());
            let inserted = insert_records(self.storage.as_ref(), &rows).await?;
            info!("Seeded {} pool amount rows at height {}", inserted, checkpoint);
        }

        if self.storage.count_rows(&POOL_APR).await? == 0 {
            let latest = self.storage.latest_pool_amounts().await?;
            let pools = PoolSnapshot::from_history(&pairs, &latest, checkpoint);
            let rows = self
                .pool_aprs(&pairs, &pools, checkpoint, Utc::now().timestamp())
                .await;
            let inserted = insert_records(self.storage.as_ref(), &rows).await?;
            info!("Seeded {} pool APR rows at height {}", inserted, checkpoint);
        }

        Ok(checkpoint)
    }

    async fn pool_aprs(
        &self,
        pairs: &[PairInfo],
        pools: &PoolSnapshot,
        height: u64,
        timestamp: i64,
    ) -> Vec<PoolApr> {
        if pairs.is_empty() {
            return Vec::new();
        }
        let prices = PriceResolver::new(&self.hub_denom, &self.usdt_denom, pairs, pools);
        let inputs =
            fetch_apr_inputs(self.querier.clone(), pairs, height, self.query_concurrency).await;
        build_pool_aprs(inputs, pools, &prices, height, timestamp)
    }

    /// Turn one chunk into the records to commit. Reserves are read at
    /// `checkpoint`, the state right before the chunk.
    async fn build_chunk(&self, chunk: &Chunk, checkpoint: u64) -> anyhow::Result<ChunkWrite> {
        let mut write = ChunkWrite::new(chunk.new_height);
        let events = parse_txs(&chunk.txs);
        if events.is_empty() {
            return Ok(write);
        }

        let pairs = self.registry.pairs();
        let pools = self.pool_resolver.resolve(&pairs, checkpoint).await?;
        let prices = PriceResolver::new(&self.hub_denom, &self.usdt_denom, &pairs, &pools);

        for event in &events {
            match event {
                DomainEvent::Swap(op) => write.swap_ops.push(op.clone()),
                DomainEvent::Liquidity(op) => write.liquidity_ops.push(op.clone()),
                DomainEvent::Stake(op) => write.staking_ops.push(op.clone()),
                DomainEvent::Earn(op) => write.earning_ops.push(op.clone()),
            }
        }

        value_swaps(&mut write.swap_ops, &prices);
        apply_liquidity_fees(&mut write.liquidity_ops, &pairs, &self.fee_params, &prices);
        accumulate_lp_data(&mut write.liquidity_ops, &pools);
        value_stakings(&mut write.staking_ops, &pairs, &pools, &prices);
        value_earnings(&mut write.earning_ops, &prices);

        write.pool_amounts = collect_pool_amount_history(&events, &pairs, &pools);
        write.candles = build_ohlcv(&write.swap_ops, &pairs);

        let touched = touched_pairs(&write, &pairs);
        if !touched.is_empty() {
            let post_chunk = pools.with_history(&pairs, &write.pool_amounts);
            let timestamp = events
                .iter()
                .map(DomainEvent::timestamp)
                .max()
                .unwrap_or_else(|| Utc::now().timestamp());
            write.pool_aprs = self
                .pool_aprs(&touched, &post_chunk, chunk.new_height, timestamp)
                .await;
        }

        Ok(write)
    }
}

/// Pairs whose reserves or staking changed in the chunk.
fn touched_pairs(write: &ChunkWrite, pairs: &[PairInfo]) -> Vec<PairInfo> {
    let mut touched: FxHashSet<&str> = FxHashSet::default();
    touched.extend(write.swap_ops.iter().map(|op| op.pair_addr.as_str()));
    touched.extend(write.liquidity_ops.iter().map(|op| op.pair_addr.as_str()));
    let staked: FxHashSet<&str> = write
        .staking_ops
        .iter()
        .map(|op| op.staking_asset_denom.as_str())
        .chain(write.earning_ops.iter().map(|op| op.staking_asset_denom.as_str()))
        .collect();

    pairs
        .iter()
        .filter(|pair| {
            touched.contains(pair.contract_addr.as_str())
                || staked.contains(pair.liquidity_token.as_str())
        })
        .cloned()
        .collect()
}

#[async_trait]
impl ChunkProcessor for SyncWorker {
    async fn process(&self, chunk: &Chunk) -> bool {
        let mut run = self.run_state.lock().await;

        match run.state {
            SyncState::Running => {},
            SyncState::Failed => return false,
            state => {
                warn!("Chunk ending at {} delivered while {:?}", chunk.new_height, state);
                return false;
            },
        }

        if chunk.new_height <= run.checkpoint {
            debug!(
                "Skipping chunk ending at {}, already at {}",
                chunk.new_height, run.checkpoint
            );
            return true;
        }

        let result = match self.build_chunk(chunk, run.checkpoint).await {
            Ok(write) => self
                .storage
                .commit_chunk(&write)
                .await
                .map(|_| write.record_count())
                .context("Failed to commit chunk"),
            Err(e) => Err(e),
        };

        match result {
            Ok(records) => {
                run.checkpoint = chunk.new_height;
                run.failing_height = None;
                run.attempts = 0;

                if run.last_progress_log.elapsed() >= PROGRESS_LOG_INTERVAL {
                    info!(
                        "Synced to height {} ({} txs, {} records in last chunk)",
                        run.checkpoint,
                        chunk.txs.len(),
                        records
                    );
                    run.last_progress_log = Instant::now();
                }
                true
            },
            Err(e) => {
                if run.failing_height == Some(chunk.new_height) {
                    run.attempts += 1;
                } else {
                    run.failing_height = Some(chunk.new_height);
                    run.attempts = 1;
                }
                warn!(
                    "Chunk ending at {} failed (attempt {}/{}): {:#}",
                    chunk.new_height, run.attempts, self.max_chunk_attempts, e
                );

                if run.attempts >= self.max_chunk_attempts {
                    error!(
                        "Chunk ending at {} failed {} times, halting sync at height {}",
                        chunk.new_height, run.attempts, run.checkpoint
                    );
                    run.state = SyncState::Failed;
                    self.halted.store(true, Ordering::SeqCst);
                }
                false
            },
        }
    }

    fn halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}
