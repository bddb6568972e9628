use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// Parameters handed to the report generator for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeConfig {
    pub run_id: String,
    /// Source schema first, destination schema second
    pub schemas: Vec<String>,
    /// Directory holding the uploaded files of each schema
    pub schema_paths: BTreeMap<String, String>,
    pub data_directory: String,
    pub report_directory: String,
    pub batch_size: u32,
    pub chunk_size: u32,
    pub use_direct_comparison: bool,
    pub selected_tables: Vec<String>,
    pub file_types: Vec<String>,
    pub source_files: Vec<String>,
    pub dest_files: Vec<String>,
    pub uploaded_files: Vec<String>,
    pub temp_dirs: TempDirs,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TempDirs {
    pub source: String,
    pub dest: String,
}

/// Result document printed by the report generator
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReportOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub report_id: Option<String>,
    #[serde(default)]
    pub html_report: Option<String>,
    #[serde(default)]
    pub json_report: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Errors that can occur while generating a report
#[derive(Debug)]
pub enum EngineError {
    /// No report generator is configured
    NotConfigured,
    /// The generator exceeded its time limit and was killed
    Timeout { elapsed_secs: u64 },
    /// The generator exited with a non-zero status
    ExecutionFailed { exit_code: i32, stderr: String },
    /// The generator's output could not be understood
    InvalidOutput(String),
    /// Spawning or talking to the generator failed
    IoError(std::io::Error),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "No report generator configured (set REPORT_COMMAND)"),
            Self::Timeout { elapsed_secs } => {
                write!(f, "Report generation timed out after {elapsed_secs}s")
            }
            Self::ExecutionFailed { exit_code, stderr } => {
                write!(f, "Report generator failed with exit code {exit_code}: {stderr}")
            }
            Self::InvalidOutput(msg) => write!(f, "Report generator returned invalid output: {msg}"),
            Self::IoError(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(err) => Some(err),
            _ => None,
        }
    }
}

/// Something that turns uploaded dumps into a validation report
pub trait ReportEngine: Send + Sync {
    fn generate(
        &self,
        config: &RuntimeConfig,
    ) -> impl Future<Output = Result<ReportOutcome, EngineError>> + Send;

    /// Whether `generate` can succeed at all
    fn is_configured(&self) -> bool {
        true
    }
}
