//! Task distribution and reduction
//!
//! Blocks of work run on the blocking thread pool with at most
//! `concurrent_tasks` in flight. Results are folded by the caller's reduce
//! function as they complete, in completion order. When distribution is
//! disabled blocks run one at a time on the calling task.
//!
//! **Failure policy:** a failed block is logged and the remaining blocks
//! still run. Once every block has completed, the failure with the lowest
//! block id is returned as `Error::BlockComputation` along with the number
//! of failed blocks.

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use hazard_common::config::TaskConfig;
use hazard_common::events::{CalculationEvent, EventBus};
use hazard_common::{Error, Result};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Identifies one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId {
    pub realization: usize,
    pub index: usize,
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rlz-{}/block-{}", self.realization, self.index)
    }
}

/// Pending result of a submitted block
pub type BlockHandle<T> = Pin<Box<dyn Future<Output = (BlockId, Result<T>)> + Send>>;

/// Progress reporting target
#[derive(Clone)]
struct Progress {
    calculation_id: Uuid,
    event_bus: EventBus,
}

#[derive(Clone)]
pub struct TaskManager {
    concurrent_tasks: usize,
    distribute: bool,
    cancel_token: CancellationToken,
    progress: Option<Progress>,
}

impl TaskManager {
    pub fn new(config: &TaskConfig, cancel_token: CancellationToken) -> Self {
        Self {
            concurrent_tasks: config.concurrent_tasks.max(1),
            distribute: config.distribute,
            cancel_token,
            progress: None,
        }
    }

    /// Emit `BlockCompleted` events for this calculation
    pub fn with_events(mut self, calculation_id: Uuid, event_bus: EventBus) -> Self {
        self.progress = Some(Progress {
            calculation_id,
            event_bus,
        });
        self
    }

    pub fn concurrent_tasks(&self) -> usize {
        self.concurrent_tasks
    }

    pub fn is_distributed(&self) -> bool {
        self.distribute
    }

    /// Submit one block
    ///
    /// Distributed: the job starts immediately on the blocking pool.
    /// Sequential: the job runs when the handle is first polled.
    pub fn submit<T, F>(&self, block: BlockId, job: F) -> BlockHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        if self.distribute {
            let handle = tokio::task::spawn_blocking(job);
            Box::pin(async move {
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => Err(Error::Internal(format!("worker task failed: {}", e))),
                };
                (block, result)
            })
        } else {
            Box::pin(async move { (block, job()) })
        }
    }

    /// Stream of results in completion order
    pub fn as_completed<T>(
        handles: impl IntoIterator<Item = BlockHandle<T>>,
    ) -> impl Stream<Item = (BlockId, Result<T>)>
    where
        T: Send + 'static,
    {
        handles.into_iter().collect::<FuturesUnordered<_>>()
    }

    /// Run `worker` over every block of `args` and fold the results
    ///
    /// `total` is the number of blocks `args` will yield, used for progress
    /// reporting only. `reduce` runs on the calling task; an error from it
    /// aborts the run immediately.
    pub async fn map_reduce<A, T, Acc, W, R>(
        &self,
        args: impl IntoIterator<Item = (BlockId, A)>,
        total: usize,
        worker: W,
        init: Acc,
        mut reduce: R,
    ) -> Result<Acc>
    where
        A: Send + 'static,
        T: Send + 'static,
        W: Fn(A) -> Result<T> + Send + Sync + 'static,
        R: FnMut(&mut Acc, BlockId, T) -> Result<()>,
    {
        if self.cancel_token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let worker = Arc::new(worker);
        let window = if self.distribute {
            self.concurrent_tasks
        } else {
            1
        };
        info!(
            total,
            concurrent_tasks = window,
            distribute = self.distribute,
            "Dispatching blocks"
        );

        let mut args = args.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut submit_next = |in_flight: &mut FuturesUnordered<BlockHandle<T>>| {
            if let Some((block, arg)) = args.next() {
                let worker = Arc::clone(&worker);
                in_flight.push(self.submit(block, move || (*worker)(arg)));
                true
            } else {
                false
            }
        };

        // Seed initial batch
        for _ in 0..window {
            if !submit_next(&mut in_flight) {
                break;
            }
        }

        let mut acc = init;
        let mut completed = 0usize;
        let mut failures: Vec<(BlockId, Error)> = Vec::new();

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!(completed, total, "Calculation cancelled, dropping pending blocks");
                    return Err(Error::Cancelled);
                }

                next = in_flight.next() => {
                    let Some((block, result)) = next else {
                        break;
                    };
                    completed += 1;
                    let succeeded = result.is_ok();
                    match result {
                        Ok(partial) => {
                            debug!(block = %block, completed, total, "Block completed");
                            reduce(&mut acc, block, partial)?;
                        }
                        Err(e) => {
                            error!(block = %block, error = %e, "Block computation failed");
                            failures.push((block, e));
                        }
                    }
                    self.report(block, succeeded, completed, total);
                    submit_next(&mut in_flight);
                }
            }
        }

        if failures.is_empty() {
            return Ok(acc);
        }
        let failed_blocks = failures.len();
        failures.sort_by_key(|(block, _)| *block);
        let (block, e) = failures.swap_remove(0);
        error!(
            failed_blocks,
            first_failed = %block,
            "Calculation aborted after block failures"
        );
        Err(Error::BlockComputation {
            block: block.to_string(),
            failed_blocks,
            message: e.to_string(),
        })
    }

    fn report(&self, block: BlockId, succeeded: bool, completed: usize, total: usize) {
        if let Some(progress) = &self.progress {
            progress.event_bus.emit_lossy(CalculationEvent::BlockCompleted {
                calculation_id: progress.calculation_id,
                block: block.to_string(),
                succeeded,
                completed,
                total,
                timestamp: chrono::Utc::now(),
            });
        }
    }
}
