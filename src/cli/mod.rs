pub mod console;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use self::console::ConsoleObserver;
use crate::client::{
    clamp_batch_size, ClientError, CompletedRun, FileSet, HttpJobApi, JobClient, JobObserver,
    JobRequest, PollerConfig,
};
use crate::config::ClientConfig;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the validation job host
    Serve,
    /// Upload dumps, then follow the validation run until it finishes
    Submit(SubmitArgs),
}

#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Source dump file (repeatable)
    #[arg(long = "source", required = true, num_args = 1..)]
    pub source: Vec<PathBuf>,

    /// Destination dump file (repeatable)
    #[arg(long = "dest", required = true, num_args = 1..)]
    pub dest: Vec<PathBuf>,

    /// Rows per batch, clamped to 1..=500
    #[arg(long, default_value = "100")]
    pub batch_size: String,

    /// Job host base URL (overrides VALIDATION_SERVER_URL)
    #[arg(long)]
    pub server: Option<String>,

    /// Seconds between status checks (overrides POLL_INTERVAL_SECS)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_secs: Option<u64>,

    /// Status checks before giving up (overrides MAX_POLLS)
    #[arg(long)]
    pub max_polls: Option<u32>,
}

impl SubmitArgs {
    /// Merge flags over the environment configuration
    pub fn client_config(&self, mut config: ClientConfig) -> ClientConfig {
        if let Some(server) = &self.server {
            config.server_url = server.clone();
        }
        if let Some(secs) = self.poll_interval_secs {
            config.poll_interval = Duration::from_secs(secs);
        }
        if let Some(max_polls) = self.max_polls {
            config.max_polls = max_polls;
        }
        config
    }
}

/// Read the files named on the command line
pub async fn load_files(paths: &[PathBuf]) -> Result<FileSet, ClientError> {
    let mut files = FileSet::new();
    for path in paths {
        files.add_path(path).await?;
    }
    Ok(files)
}

/// Submit a job and poll it to completion, cancelling on CTRL+C
///
/// Every error except cancellation has been shown on the console by the
/// time this returns.
pub async fn submit(args: &SubmitArgs, config: &ClientConfig) -> Result<CompletedRun, ClientError> {
    let observer = ConsoleObserver::new(config.server_url.clone());

    let prepared = async {
        let source_files = load_files(&args.source).await?;
        let dest_files = load_files(&args.dest).await?;
        let api = HttpJobApi::new(config.server_url.clone())?;
        Ok::<_, ClientError>((source_files, dest_files, api))
    }
    .await;
    let (source_files, dest_files, api) = match prepared {
        Ok(prepared) => prepared,
        Err(e) => {
            observer.error(&e);
            return Err(e);
        }
    };
    eprintln!("Source files: {}", source_files.summary());
    eprintln!("Destination files: {}", dest_files.summary());

    let request = JobRequest::new(source_files, dest_files, clamp_batch_size(&args.batch_size));
    let client = JobClient::new(
        api,
        observer,
        PollerConfig {
            interval: config.poll_interval,
            max_polls: config.max_polls,
        },
    );

    let cancel = client.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling polling");
            cancel.cancel();
        }
    });

    info!("Submitting to {}", config.server_url);
    let result = client.run(&request).await;
    interrupt.abort();
    result
}
