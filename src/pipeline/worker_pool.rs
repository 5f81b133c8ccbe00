// src/pipeline/worker_pool.rs
use futures::future::BoxFuture;
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::config;
use crate::models::PhotoId;
use crate::results::{BatchStats, PhotoOutcome};

/// Seam between the pool and the matcher, so the pool's queueing and
/// timeout behavior is testable without a database.
pub trait PhotoProcessor: Send + Sync + 'static {
    fn process(&self, photo_id: PhotoId) -> BoxFuture<'_, PhotoOutcome>;
    /// Called after a worker's invocation exceeds the overall timeout; the
    /// implementation should mark the photo failed.
    fn on_timeout(&self, photo_id: &PhotoId) -> BoxFuture<'_, ()>;
}

/// Why an enqueue was rejected.
#[derive(Debug)]
pub enum EnqueueError {
    /// The queue is at capacity. The caller decides whether to retry.
    Full(PhotoId),
    /// The pool has shut down.
    Closed(PhotoId),
}

impl std::fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnqueueError::Full(id) => write!(f, "match queue full; photo {} rejected", id),
            EnqueueError::Closed(id) => write!(f, "match pool closed; photo {} rejected", id),
        }
    }
}

impl std::error::Error for EnqueueError {}

/// Sizing for a pool instance. `Default` reads the config statics.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPoolConfig {
    pub workers: usize,
    pub queue_depth: usize,
    pub photo_timeout: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: *config::WORKER_COUNT,
            queue_depth: *config::QUEUE_DEPTH,
            photo_timeout: Duration::from_secs(*config::PHOTO_TIMEOUT_SECS),
        }
    }
}

/// Bounded FIFO worker pool for photo matching.
///
/// Owns its queue and worker count; there is no module-level mutable state.
/// Enqueueing past capacity fails fast instead of blocking or growing an
/// unbounded backlog.
pub struct MatchWorkerPool {
    tx: mpsc::Sender<PhotoId>,
    workers: Vec<JoinHandle<()>>,
    stats: Arc<Mutex<BatchStats>>,
}

impl MatchWorkerPool {
    pub fn start<P: PhotoProcessor>(processor: Arc<P>, pool_config: WorkerPoolConfig) -> Self {
        let (tx, rx) = mpsc::channel::<PhotoId>(pool_config.queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(Mutex::new(BatchStats::default()));

        let workers = (0..pool_config.workers.max(1))
            .map(|worker_idx| {
                let rx = Arc::clone(&rx);
                let processor = Arc::clone(&processor);
                let stats = Arc::clone(&stats);
                let photo_timeout = pool_config.photo_timeout;
                tokio::spawn(async move {
                    loop {
                        let next = { rx.lock().await.recv().await };
                        let Some(photo_id) = next else {
                            break;
                        };
                        debug!("Worker {} picked up photo {}", worker_idx, photo_id);
                        let outcome =
                            match timeout(photo_timeout, processor.process(photo_id.clone())).await
                            {
                                Ok(outcome) => outcome,
                                Err(_) => {
                                    warn!(
                                        "Worker {}: photo {} exceeded {:?} timeout",
                                        worker_idx, photo_id, photo_timeout
                                    );
                                    processor.on_timeout(&photo_id).await;
                                    PhotoOutcome::Failed
                                }
                            };
                        stats.lock().await.record(outcome);
                    }
                })
            })
            .collect();

        Self { tx, workers, stats }
    }

    /// Queues a photo for processing. Fails fast when the queue is at
    /// capacity — explicit backpressure, the caller owns the retry policy.
    pub fn try_enqueue(&self, photo_id: PhotoId) -> Result<(), EnqueueError> {
        self.tx.try_send(photo_id).map_err(|e| match e {
            TrySendError::Full(id) => EnqueueError::Full(id),
            TrySendError::Closed(id) => EnqueueError::Closed(id),
        })
    }

    /// Snapshot of the counters so far.
    pub async fn stats(&self) -> BatchStats {
        self.stats.lock().await.clone()
    }

    /// Closes the queue, drains remaining work, and returns final counters.
    pub async fn shutdown(self) -> BatchStats {
        drop(self.tx);
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!("Match worker task ended abnormally: {}", e);
            }
        }
        Arc::try_unwrap(self.stats)
            .map(|m| m.into_inner())
            .unwrap_or_default()
    }
}
