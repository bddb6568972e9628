use actix_web::dev::ServerHandle;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Handles graceful shutdown of the job host
///
/// On SIGTERM or CTRL+C the HTTP server stops accepting requests, workers
/// stop taking queued runs, and in-flight runs are allowed to finish.
pub struct ShutdownCoordinator {
    server_handle: ServerHandle,
    server_task: JoinHandle<Result<(), std::io::Error>>,
    worker_handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new(
        server_handle: ServerHandle,
        server_task: JoinHandle<Result<(), std::io::Error>>,
        worker_handles: Vec<JoinHandle<()>>,
        shutdown_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            server_handle,
            server_task,
            worker_handles,
            shutdown_tx,
        }
    }

    /// Wait for a shutdown signal, then shut down gracefully
    pub async fn wait_for_shutdown(self) -> Result<(), std::io::Error> {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = ctrl_c => {
                if let Err(e) = result {
                    error!("Failed to listen for CTRL+C: {}", e);
                }
                info!("Received CTRL+C signal, initiating graceful shutdown...");
            }
            _ = terminate => {
                info!("Received SIGTERM signal, initiating graceful shutdown...");
            }
        }

        self.shutdown().await
    }

    async fn shutdown(self) -> Result<(), std::io::Error> {
        info!("Stopping HTTP server (no longer accepting new requests)...");
        self.server_handle.stop(true).await;

        info!("Signaling workers to stop taking new runs...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal to workers: {:?}", e);
        }

        let num_workers = self.worker_handles.len();
        info!("Waiting for {} workers to finish in-flight runs...", num_workers);
        for (i, result) in join_all(self.worker_handles).await.into_iter().enumerate() {
            if let Err(e) = result {
                error!("Worker {} failed to stop: {:?}", i + 1, e);
            }
        }
        info!("All workers stopped");

        match self.server_task.await {
            Ok(Ok(_)) => info!("HTTP server shut down successfully"),
            Ok(Err(e)) => error!("HTTP server encountered error during shutdown: {:?}", e),
            Err(e) => error!("HTTP server task panicked: {:?}", e),
        }

        info!("Graceful shutdown completed successfully");
        Ok(())
    }
}
