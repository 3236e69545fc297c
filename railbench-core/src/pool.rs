//! Pre-spawned, phase-gated worker pool

use crate::phases::{PhaseFamily, PhaseGates};
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Every worker the run will ever use, spawned up front and parked on its
/// tranche's latch.
pub struct WorkerPool {
    workers: JoinSet<()>,
    size: usize,
}

impl WorkerPool {
    /// Spawn one task per tranche slot in both families. Each task waits for
    /// its `(family, phase)` latch, then calls `job(worker_id)` back to back
    /// until `cancel` fires.
    pub fn spawn<F, Fut>(gates: Arc<PhaseGates>, cancel: CancellationToken, job: F) -> Self
    where
        F: Fn(usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let job = Arc::new(job);
        let mut workers = JoinSet::new();
        let mut worker_id = 0;

        for family in PhaseFamily::ALL {
            for (phase, &count) in family.tranches().iter().enumerate() {
                for _ in 0..count {
                    let gates = Arc::clone(&gates);
                    let cancel = cancel.clone();
                    let job = Arc::clone(&job);
                    let id = worker_id;

                    workers.spawn(async move {
                        if !gates.wait(family, phase, &cancel).await {
                            return;
                        }
                        debug!(worker = id, family = %family, phase, "Worker activated");
                        while !cancel.is_cancelled() {
                            job(id).await;
                            tokio::task::yield_now().await;
                        }
                    });
                    worker_id += 1;
                }
            }
        }

        debug!("Spawned {} gated workers", worker_id);
        Self {
            workers,
            size: worker_id,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Wait for every worker to exit
    pub async fn drain(mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                if e.is_panic() {
                    error!("Worker panicked: {}", e);
                }
            }
        }
    }
}
