use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::report::results::{load_report, results_from_report};
use crate::report::{ReportEngine, RuntimeConfig};
use crate::runs::{RunCompletion, RunRegistry};

/// A registered run waiting for a worker
#[derive(Debug, Clone)]
pub struct RunTicket {
    pub run_id: String,
    pub config: RuntimeConfig,
    /// Directories removed once the run finishes
    pub cleanup_dirs: Vec<PathBuf>,
}

/// Receiving end of the run queue, shared by all workers
pub type RunQueue = Arc<Mutex<mpsc::Receiver<RunTicket>>>;

/// Background worker executing queued runs
pub struct RunWorker<E> {
    registry: RunRegistry,
    engine: Arc<E>,
    queue: RunQueue,
}

impl<E: ReportEngine + 'static> RunWorker<E> {
    /// Create a new RunWorker instance
    pub fn new(registry: RunRegistry, engine: Arc<E>, queue: RunQueue) -> Self {
        Self {
            registry,
            engine,
            queue,
        }
    }

    /// Run worker with semaphore-based bounded concurrency
    ///
    /// # Architecture
    /// - Waits for the next queued run (workers share one queue)
    /// - Acquires a semaphore permit before spawning the processing task
    /// - Each task runs the report engine and records the outcome
    /// - On shutdown, stops taking runs and waits for its tasks to finish
    /// - A run still waiting for a permit at shutdown is failed
    ///
    /// # Arguments
    /// - `worker_id` - Identifier for this worker instance
    /// - `semaphore` - Semaphore bounding concurrent runs across workers
    /// - `shutdown_rx` - Flips to `true` when the process is shutting down
    pub async fn run(
        &self,
        worker_id: u32,
        semaphore: Arc<Semaphore>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!("Worker {} started with semaphore-based concurrency", worker_id);
        let mut tasks = JoinSet::new();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let next = tokio::select! {
                _ = shutdown_rx.changed() => None,
                ticket = async { self.queue.lock().await.recv().await } => ticket,
            };
            let Some(ticket) = next else {
                break;
            };
            info!("Worker {} acquired run {}", worker_id, ticket.run_id);

            let acquired = tokio::select! {
                _ = shutdown_rx.changed() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = acquired else {
                warn!(
                    "Worker {} stopping before run {} got a permit",
                    worker_id, ticket.run_id
                );
                self.registry
                    .fail(&ticket.run_id, "Worker pool is shutting down")
                    .await;
                remove_dirs(&ticket.cleanup_dirs).await;
                break;
            };

            let registry = self.registry.clone();
            let engine = self.engine.clone();
            tasks.spawn(async move {
                let run_id = ticket.run_id.clone();
                process_run(&registry, engine.as_ref(), ticket).await;
                drop(permit);
                info!("Released semaphore permit for run {}", run_id);
            });

            // Reap finished tasks so the set does not grow unbounded
            while let Some(result) = tasks.try_join_next() {
                if let Err(e) = result {
                    error!("Worker {} run task panicked: {:?}", worker_id, e);
                }
            }
        }

        if !tasks.is_empty() {
            info!("Worker {} waiting for {} runs to finish", worker_id, tasks.len());
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!("Worker {} run task panicked: {:?}", worker_id, e);
            }
        }
        info!("Worker {} stopped", worker_id);
    }
}

/// Execute one run and record its outcome in the registry
pub async fn process_run<E: ReportEngine>(registry: &RunRegistry, engine: &E, ticket: RunTicket) {
    let RunTicket {
        run_id,
        config,
        cleanup_dirs,
    } = ticket;

    registry
        .update_progress(
            &run_id,
            10,
            format!("Found {} common tables", config.selected_tables.len()),
        )
        .await;

    let generated = engine.generate(&config).await;

    // Uploads are removed before the run turns terminal
    remove_dirs(&cleanup_dirs).await;

    match generated {
        Ok(outcome) if outcome.success => {
            let mut completion = RunCompletion {
                report_id: outcome.report_id,
                html_report: outcome.html_report,
                json_report: outcome.json_report,
                ..Default::default()
            };
            if let Some(path) = completion.json_report.as_deref() {
                match load_report(Path::new(path)).await {
                    Ok(report) => {
                        completion.results = results_from_report(&report);
                        completion.report_data = Some(report);
                    }
                    Err(e) => error!("Error reading report data for run {}: {}", run_id, e),
                }
            }
            info!(
                "Run {} completed: {} table results",
                run_id,
                completion.results.len()
            );
            registry.complete(&run_id, completion).await;
        }
        Ok(outcome) => {
            let message = outcome.error.unwrap_or_else(|| "Unknown error".to_string());
            warn!("Run {} failed: {}", run_id, message);
            registry.fail(&run_id, message).await;
        }
        Err(e) => {
            error!("Error during validation of run {}: {}", run_id, e);
            registry.fail(&run_id, e.to_string()).await;
        }
    }
}

/// Remove run directories, ignoring ones that are already gone
pub async fn remove_dirs(dirs: &[PathBuf]) {
    for dir in dirs {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Error cleaning up {}: {}", dir.display(), e);
            }
        }
    }
}
