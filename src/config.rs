use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::client::poller::{DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL};

/// Job host configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Maximum payload size for all requests (in bytes)
    /// Default: 16MB (16 * 1024 * 1024)
    pub max_payload_size: usize,

    /// Root directory for uploaded files
    pub upload_dir: PathBuf,

    /// Directory holding rendered HTML reports
    pub report_dir: PathBuf,

    /// External report generator, split on whitespace
    pub report_command: Option<Vec<String>>,

    pub report_timeout: Duration,

    pub num_workers: u32,

    pub max_concurrent_runs: usize,

    /// Schema names recognised in uploaded filenames
    pub known_schemas: Vec<String>,

    pub default_source_schema: String,

    pub default_dest_schema: String,

    pub log_dir: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables:
    /// - BIND_ADDR: listen address (default: 127.0.0.1:5002)
    /// - MAX_PAYLOAD_SIZE: maximum request payload size in bytes (default: 16777216 = 16MB)
    /// - UPLOAD_DIR / REPORT_DIR: storage directories (default: uploads / validation_reports)
    /// - REPORT_COMMAND: report generator command line (runs fail when unset)
    /// - REPORT_TIMEOUT_SECS: report generator time limit (default: 3600)
    /// - NUM_WORKERS / MAX_CONCURRENT_RUNS: worker pool sizing (default: 1 / 2)
    /// - KNOWN_SCHEMAS: comma separated schema names
    /// - SOURCE_SCHEMA / DEST_SCHEMA: fallback schema names
    /// - LOG_DIR: directory for rolling log files (default: logs)
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let num_workers: u32 = parse_var("NUM_WORKERS", 1)?;
        let max_concurrent_runs: usize = parse_var("MAX_CONCURRENT_RUNS", 2)?;
        if num_workers == 0 || max_concurrent_runs == 0 {
            return Err("NUM_WORKERS and MAX_CONCURRENT_RUNS must be at least 1".to_string());
        }

        let report_command = env::var("REPORT_COMMAND")
            .ok()
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|parts| !parts.is_empty());

        let known_schemas = env::var("KNOWN_SCHEMAS")
            .map(|list| {
                list.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                vec![
                    "employee_management".to_string(),
                    "contractor_management".to_string(),
                ]
            });

        Ok(ServerConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:5002".to_string()),
            max_payload_size: parse_var("MAX_PAYLOAD_SIZE", 16 * 1024 * 1024)?,
            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string())),
            report_dir: PathBuf::from(
                env::var("REPORT_DIR").unwrap_or_else(|_| "validation_reports".to_string()),
            ),
            report_command,
            report_timeout: Duration::from_secs(parse_var("REPORT_TIMEOUT_SECS", 3600)?),
            num_workers,
            max_concurrent_runs,
            known_schemas,
            default_source_schema: env::var("SOURCE_SCHEMA")
                .unwrap_or_else(|_| "employee_management".to_string()),
            default_dest_schema: env::var("DEST_SCHEMA")
                .unwrap_or_else(|_| "contractor_management".to_string()),
            log_dir: log_dir(),
        })
    }
}

/// Submission client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the job host
    pub server_url: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
    pub log_dir: String,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Optional environment variables:
    /// - VALIDATION_SERVER_URL: job host base URL (default: http://127.0.0.1:5002)
    /// - POLL_INTERVAL_SECS: seconds between status checks (default: 2)
    /// - MAX_POLLS: status checks before giving up (default: 300)
    /// - LOG_DIR: directory for rolling log files (default: logs)
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        Ok(ClientConfig {
            server_url: env::var("VALIDATION_SERVER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5002".to_string()),
            poll_interval: poll_interval(parse_var(
                "POLL_INTERVAL_SECS",
                DEFAULT_POLL_INTERVAL.as_secs(),
            )?)?,
            max_polls: parse_var("MAX_POLLS", DEFAULT_MAX_POLLS)?,
            log_dir: log_dir(),
        })
    }
}

/// Seconds between status checks; the poll timer needs a non-zero period
fn poll_interval(secs: u64) -> Result<Duration, String> {
    if secs == 0 {
        return Err("POLL_INTERVAL_SECS must be at least 1".to_string());
    }
    Ok(Duration::from_secs(secs))
}

fn log_dir() -> String {
    env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string())
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, String> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: {}", name, raw)),
        Err(_) => Ok(default),
    }
}
