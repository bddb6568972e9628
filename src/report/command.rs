//! Report generator running as a child process.
//!
//! The runtime configuration is piped to the command's stdin as JSON. The
//! command prints a [`ReportOutcome`] JSON document as the last non-empty
//! line of its stdout; anything printed before that is treated as log output.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::engine::{EngineError, ReportEngine, ReportOutcome, RuntimeConfig};

/// Maximum stderr characters kept in error messages
const STDERR_EXCERPT_CHARS: usize = 2048;

/// [`ReportEngine`] that delegates to an external program
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: Option<Vec<String>>,
    timeout: Duration,
}

impl CommandEngine {
    pub fn new(command: Option<Vec<String>>, timeout: Duration) -> Self {
        Self { command, timeout }
    }
}

impl ReportEngine for CommandEngine {
    async fn generate(&self, config: &RuntimeConfig) -> Result<ReportOutcome, EngineError> {
        let Some((program, args)) = self.command.as_ref().and_then(|c| c.split_first()) else {
            return Err(EngineError::NotConfigured);
        };

        let payload = serde_json::to_vec(config)
            .map_err(|e| EngineError::InvalidOutput(format!("cannot encode config: {e}")))?;

        info!("Starting report generator {} for run {}", program, config.run_id);
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(EngineError::IoError)?;

        let start = Instant::now();
        let stdin = child.stdin.take();
        let exchange = async move {
            if let Some(mut stdin) = stdin {
                // The generator may close stdin early; its exit status tells the rest
                if let Err(e) = stdin.write_all(&payload).await {
                    warn!("Failed to write config to report generator: {}", e);
                }
                drop(stdin);
            }
            child.wait_with_output().await
        };

        // Dropping the exchange on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result.map_err(EngineError::IoError)?,
            Err(_elapsed) => {
                return Err(EngineError::Timeout {
                    elapsed_secs: start.elapsed().as_secs(),
                })
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(
            "Report generator for run {} exited with {:?} after {}ms",
            config.run_id,
            output.status.code(),
            start.elapsed().as_millis()
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let excerpt: String = stderr.trim().chars().take(STDERR_EXCERPT_CHARS).collect();
            return Err(EngineError::ExecutionFailed {
                exit_code: output.status.code().unwrap_or(-1),
                stderr: excerpt,
            });
        }

        parse_outcome(&stdout)
    }

    fn is_configured(&self) -> bool {
        self.command.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Decode the last non-empty stdout line
fn parse_outcome(stdout: &str) -> Result<ReportOutcome, EngineError> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| EngineError::InvalidOutput("empty output".to_string()))?;
    serde_json::from_str(line.trim()).map_err(|e| EngineError::InvalidOutput(e.to_string()))
}
