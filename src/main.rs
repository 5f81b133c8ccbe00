use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use photo_match_lib::db::{connect, fetch_pending_photo_ids, get_pool_status};
use photo_match_lib::pipeline::{EnqueueError, MatchWorkerPool, PhotoMatcher, WorkerPoolConfig};
use photo_match_lib::utils::env::load_env;

/// Background worker that drives pending photos through the
/// photo-to-property matching pipeline.
#[derive(Parser, Debug)]
#[command(name = "photo_match")]
struct Args {
    /// Maximum number of pending photos to pick up this run.
    #[arg(long, default_value_t = 100)]
    limit: i64,

    /// Worker tasks. 1 runs the throttled sequential batch loop.
    #[arg(long)]
    workers: Option<usize>,

    /// Queue capacity for the worker pool.
    #[arg(long)]
    queue_depth: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting photo-to-property matching worker");
    load_env();

    let args = Args::parse();
    let start_time = Instant::now();

    let pool = connect().await.context("Failed to connect to database")?;
    info!("Successfully connected to the database");

    let matcher = PhotoMatcher::from_env(pool.clone())
        .context("Failed to construct matching pipeline from environment")?;

    let photo_ids = fetch_pending_photo_ids(&pool, args.limit)
        .await
        .context("Failed to fetch pending photos")?;
    info!("Found {} pending photo(s)", photo_ids.len());
    if photo_ids.is_empty() {
        return Ok(());
    }

    let mut pool_config = WorkerPoolConfig::default();
    if let Some(workers) = args.workers {
        pool_config.workers = workers;
    }
    if let Some(queue_depth) = args.queue_depth {
        pool_config.queue_depth = queue_depth;
    }

    let stats = if pool_config.workers <= 1 {
        let pb = ProgressBar::new(photo_ids.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
                )
                .context("Failed to set progress bar style")?
                .progress_chars("#>-"),
        );
        let mut stats = photo_match_lib::results::BatchStats::default();
        for photo_id in &photo_ids {
            pb.set_message(format!("photo {}", photo_id));
            stats.record(matcher.process_photo(photo_id).await);
            pb.inc(1);
        }
        pb.finish_with_message("done");
        stats
    } else {
        info!(
            "Running worker pool: {} workers, queue depth {}",
            pool_config.workers, pool_config.queue_depth
        );
        let worker_pool = MatchWorkerPool::start(Arc::new(matcher), pool_config);
        for photo_id in photo_ids {
            let mut pending = photo_id;
            loop {
                match worker_pool.try_enqueue(pending) {
                    Ok(()) => break,
                    Err(EnqueueError::Full(id)) => {
                        // Backpressure: wait for the pool to drain a slot.
                        pending = id;
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                    Err(EnqueueError::Closed(id)) => {
                        warn!("Pool closed before photo {} was enqueued", id);
                        break;
                    }
                }
            }
        }
        worker_pool.shutdown().await
    };

    info!("=== Matching Run Summary ===");
    info!("Photos processed: {}", stats.processed);
    info!("Matched to existing properties: {}", stats.matched_existing);
    info!("New properties created: {}", stats.created_new);
    info!("Failed (visible for manual reassignment): {}", stats.failed);
    info!("Average match confidence: {:.3}", stats.avg_confidence());
    info!("Total execution time: {:.2?}", start_time.elapsed());

    let (connections, idle) = get_pool_status(&pool);
    info!(
        "Final DB Connection Pool Status: Total: {}, Idle: {}",
        connections, idle
    );

    info!("Matching worker run completed successfully");
    Ok(())
}
