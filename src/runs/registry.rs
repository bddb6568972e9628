use std::collections::HashMap;
use std::sync::Arc;

use chrono::Local;
use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::models::{RunCompletion, RunRecord};
use crate::protocol::{RunStatus, StatusResponse};

/// Status table of every run started since the process came up
#[derive(Clone, Default)]
pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, RunRecord>>>,
}

/// Run counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunCounts {
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run in `running` state and return its id
    ///
    /// Ids are the local start time (`%Y%m%d_%H%M%S`) with a random suffix,
    /// regenerated until unused.
    pub async fn create(&self) -> String {
        let mut runs = self.runs.write().await;
        let now = Local::now();
        let run_id = loop {
            let suffix: u16 = rand::thread_rng().gen();
            let candidate = format!("{}_{:04x}", now.format("%Y%m%d_%H%M%S"), suffix);
            if !runs.contains_key(&candidate) {
                break candidate;
            }
        };
        runs.insert(run_id.clone(), RunRecord::new(run_id.clone(), now.naive_local()));
        debug!("Registered run {}", run_id);
        run_id
    }

    pub async fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.read().await.get(run_id).cloned()
    }

    pub async fn status(&self, run_id: &str) -> Option<StatusResponse> {
        self.runs.read().await.get(run_id).map(RunRecord::to_status)
    }

    pub async fn update_progress(&self, run_id: &str, progress: u8, current_table: impl Into<String>) {
        let current_table = current_table.into();
        self.modify(run_id, |run| {
            run.progress = progress.min(100);
            run.current_table = Some(current_table);
        })
        .await;
    }

    pub async fn complete(&self, run_id: &str, completion: RunCompletion) {
        self.modify(run_id, |run| {
            run.status = RunStatus::Completed;
            run.progress = 100;
            run.report_id = completion.report_id;
            run.html_report = completion.html_report;
            run.json_report = completion.json_report;
            run.results = completion.results;
            run.report_data = completion.report_data;
        })
        .await;
    }

    pub async fn fail(&self, run_id: &str, error: impl Into<String>) {
        let error = error.into();
        self.modify(run_id, |run| {
            run.status = RunStatus::Failed;
            run.error = Some(error);
        })
        .await;
    }

    /// Drop a run whose id never reached a client
    pub async fn discard(&self, run_id: &str) -> bool {
        let removed = self.runs.write().await.remove(run_id).is_some();
        if removed {
            debug!("Discarded run {}", run_id);
        }
        removed
    }

    pub async fn counts(&self) -> RunCounts {
        let runs = self.runs.read().await;
        runs.values().fold(RunCounts::default(), |mut acc, run| {
            match run.status {
                RunStatus::Running => acc.running += 1,
                RunStatus::Completed => acc.completed += 1,
                RunStatus::Failed => acc.failed += 1,
                RunStatus::Unknown => {}
            }
            acc
        })
    }

    /// Apply `change` to a run that has not reached a terminal state yet
    async fn modify(&self, run_id: &str, change: impl FnOnce(&mut RunRecord)) {
        let mut runs = self.runs.write().await;
        match runs.get_mut(run_id) {
            Some(run) if run.status.is_terminal() => {
                warn!("Ignoring update for finished run {}", run_id);
            }
            Some(run) => {
                change(run);
                run.updated_at = Local::now().naive_local();
            }
            None => warn!("Ignoring update for unknown run {}", run_id),
        }
    }
}
