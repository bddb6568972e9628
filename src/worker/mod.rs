pub mod run_worker;

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::report::ReportEngine;
use crate::runs::RunRegistry;

pub use run_worker::{process_run, remove_dirs, RunQueue, RunTicket, RunWorker};

/// Sending end of the run queue, held by the HTTP layer
#[derive(Clone)]
pub struct RunDispatcher {
    tx: mpsc::Sender<RunTicket>,
}

impl RunDispatcher {
    /// Queue a run; fails when all workers are gone
    pub async fn dispatch(&self, ticket: RunTicket) -> Result<(), RunTicket> {
        debug!("Queueing run {}", ticket.run_id);
        self.tx.send(ticket).await.map_err(|e| e.0)
    }
}

/// Create a bounded run queue
pub fn run_queue(capacity: usize) -> (RunDispatcher, RunQueue) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RunDispatcher { tx }, Arc::new(Mutex::new(rx)))
}

/// Spawn `num_workers` workers sharing `queue`, bounded by `max_concurrent_runs`
pub fn spawn_workers<E: ReportEngine + 'static>(
    num_workers: u32,
    max_concurrent_runs: usize,
    registry: RunRegistry,
    engine: Arc<E>,
    queue: RunQueue,
    shutdown_rx: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent_runs));
    let mut worker_handles = Vec::new();

    for worker_id in 1..=num_workers {
        let worker = RunWorker::new(registry.clone(), engine.clone(), queue.clone());
        let worker_semaphore = semaphore.clone();
        let worker_shutdown_rx = shutdown_rx.clone();

        let handle = tokio::spawn(async move {
            worker.run(worker_id, worker_semaphore, worker_shutdown_rx).await;
        });

        worker_handles.push(handle);
        info!("Spawned worker {}", worker_id);
    }

    worker_handles
}
