use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Multipart field carrying source files
pub const SOURCE_FILES_FIELD: &str = "source_files";
/// Multipart field carrying destination files
pub const DEST_FILES_FIELD: &str = "dest_files";
pub const BATCH_SIZE_FIELD: &str = "batch_size";
pub const CHUNK_SIZE_FIELD: &str = "chunk_size";

/// Chunk size sent with every submission
pub const CHUNK_SIZE: u32 = 1000;

pub const MIN_BATCH_SIZE: u32 = 1;
pub const MAX_BATCH_SIZE: u32 = 500;
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Path of the job creation endpoint
pub const RUN_VALIDATION_PATH: &str = "/api/run-validation";
/// Path prefix of the job status endpoint, followed by the run id
pub const VALIDATION_STATUS_PATH: &str = "/api/validation-status";
/// Path prefix of rendered HTML reports, followed by the report id
pub const REPORTS_PATH: &str = "/reports";

/// Response of the job creation endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmitResponse {
    pub fn accepted(run_id: impl Into<String>) -> Self {
        Self {
            success: true,
            run_id: Some(run_id.into()),
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            run_id: None,
            error: Some(error.into()),
        }
    }
}

/// Run status as reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    /// Any status string this client does not know about
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Response of the job status endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<ResultRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
}

impl StatusResponse {
    pub fn running(progress: u8, current_table: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Running,
            progress: Some(progress),
            current_table: Some(current_table.into()),
            error: None,
            results: None,
            report_data: None,
            report_id: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Failed,
            progress: None,
            current_table: None,
            error: Some(error.into()),
            results: None,
            report_data: None,
            report_id: None,
        }
    }
}

/// Per-table comparison summary shown in the results table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub table_name: String,
    pub source_count: u64,
    pub destination_count: u64,
    #[serde(rename = "match")]
    pub is_match: bool,
    #[serde(default)]
    pub matching_rows: u64,
    pub different_rows: u64,
    pub missing_rows: u64,
    pub processing_time: f64,
}
