use std::sync::Arc;

use anyhow::Context;
use jemallocator::Jemalloc;
use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;
use tokio_util::sync::CancellationToken;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use oraidex_sync::{db, ChunkProcessor, LcdClient, LcdFeed, Settings, SyncWorker};

#[tokio::main()]
async fn main() -> anyhow::Result<()> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    // Load configuration
    let settings = Arc::new(
        Settings::new()
            .context("Failed to load config.yaml. Please ensure it exists and is valid")?,
    );

    let storage = db::connect(&settings)
        .await
        .context("Failed to initialize storage")?;

    let querier = Arc::new(LcdClient::new(&settings.chain).context("Failed to create LCD client")?);

    let worker = Arc::new(SyncWorker::new(
        storage,
        querier,
        &settings.chain,
        &settings.sync,
    )?);

    // Seeding failures are fatal
    worker.seed().await?;

    let cancellation_token = CancellationToken::new();

    run_sync(settings, worker, cancellation_token).await
}

async fn run_sync(
    settings: Arc<Settings>,
    worker: Arc<SyncWorker>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    let offset = worker.checkpoint().await + 1;
    let feed = LcdFeed::new(&settings.chain, &settings.sync, offset)?;

    let processor: Arc<dyn ChunkProcessor> = worker.clone();
    let feed_token = cancellation_token.child_token();
    let feed_handle = tokio::spawn(async move {
        if let Err(e) = feed.run(processor, feed_token).await {
            error!("Chunk feed failed: {:#}", e);
        }
    });

    info!("Sync started from height {}", offset);

    #[cfg(unix)]
    let mut sigterm_stream = {
        use tokio::signal::unix::{signal, SignalKind};
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?
    };

    info!("Indexer running. Press Ctrl+C to stop.");

    let mut feed_handle = feed_handle;

    #[cfg(unix)]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = sigterm_stream.recv() => {
                info!("Received SIGTERM, exiting gracefully...");
            },
            _ = &mut feed_handle => {
                error!("Chunk feed stopped, sync halted at height {}", worker.checkpoint().await);
                return Err(anyhow::anyhow!("Sync halted"));
            },
        };
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal (Ctrl+C), exiting gracefully...");
            },
            _ = &mut feed_handle => {
                error!("Chunk feed stopped, sync halted at height {}", worker.checkpoint().await);
                return Err(anyhow::anyhow!("Sync halted"));
            },
        };
    }

    // Cancel the feed; an in-flight chunk finishes first
    info!("Finishing all tasks...");

    cancellation_token.cancel();

    info!("Waiting for chunk feed to stop...");
    let _ = feed_handle.await;

    info!("Sync stopped at height {}", worker.checkpoint().await);
    Ok(())
}
