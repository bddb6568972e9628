use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;

use crate::protocol::{ResultRow, RunStatus, StatusResponse};

/// In-memory record of one validation run
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub progress: u8,
    pub current_table: Option<String>,
    pub error: Option<String>,
    pub results: Vec<ResultRow>,
    pub report_data: Option<Value>,
    pub report_id: Option<String>,
    pub html_report: Option<String>,
    pub json_report: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl RunRecord {
    pub fn new(run_id: String, now: NaiveDateTime) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            progress: 0,
            current_table: Some("Initializing...".to_string()),
            error: None,
            results: Vec::new(),
            report_data: None,
            report_id: None,
            html_report: None,
            json_report: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Wire view served by the status endpoint
    pub fn to_status(&self) -> StatusResponse {
        let completed = self.status == RunStatus::Completed;
        StatusResponse {
            status: self.status,
            progress: Some(self.progress),
            current_table: self.current_table.clone(),
            error: self.error.clone(),
            results: completed.then(|| self.results.clone()),
            report_data: if completed { self.report_data.clone() } else { None },
            report_id: if completed { self.report_id.clone() } else { None },
        }
    }
}

/// Artifacts of a successful report generation
#[derive(Debug, Clone, Default)]
pub struct RunCompletion {
    pub report_id: Option<String>,
    pub html_report: Option<String>,
    pub json_report: Option<String>,
    pub results: Vec<ResultRow>,
    pub report_data: Option<Value>,
}
