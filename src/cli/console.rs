use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};

use crate::client::{ClientError, CompletedRun, JobObserver, ProgressUpdate};
use crate::protocol::{ResultRow, REPORTS_PATH};

/// Terminal rendering of a submission
///
/// Progress and errors go to stderr; the results table and report link go
/// to stdout.
pub struct ConsoleObserver {
    server_url: String,
}

impl ConsoleObserver {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn report_url(&self, report_id: &str) -> String {
        format!("{}{}/{}", self.server_url, REPORTS_PATH, report_id)
    }
}

impl JobObserver for ConsoleObserver {
    fn progress_shown(&self) {
        eprintln!("Submitting validation job...");
    }

    fn progress_hidden(&self) {}

    fn progress(&self, update: &ProgressUpdate) {
        if let Some(line) = progress_line(update) {
            eprintln!("{}", line);
        }
    }

    fn completed(&self, run: &CompletedRun) {
        if run.results.is_empty() {
            println!("Validation {} completed with no table results", run.run_id);
        } else {
            println!("{}", results_table(&run.results));
        }
        if let Some(report_id) = &run.report_id {
            println!("Full report: {}", self.report_url(report_id));
        }
    }

    fn error(&self, error: &ClientError) {
        eprintln!("Error: {}", error);
    }
}

/// One line describing a progress update, if it carries anything to show
pub fn progress_line(update: &ProgressUpdate) -> Option<String> {
    match (update.percentage, update.current_table.as_deref()) {
        (Some(pct), Some(table)) => Some(format!("Processing... {}% ({})", pct, table)),
        (Some(pct), None) => Some(format!("Processing... {}%", pct)),
        (None, Some(table)) => Some(format!("Processing... ({})", table)),
        (None, None) => None,
    }
}

/// `Match`, or the mismatch details of a row
pub fn status_label(row: &ResultRow) -> String {
    if row.is_match {
        return "Match".to_string();
    }

    let mut details = Vec::new();
    if row.different_rows > 0 {
        details.push(format!("{} different", row.different_rows));
    }
    if row.missing_rows > 0 {
        details.push(format!("{} missing", row.missing_rows));
    }
    if details.is_empty() {
        "No Match".to_string()
    } else {
        details.join(", ")
    }
}

pub fn results_table(rows: &[ResultRow]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "Table",
        "Source Count",
        "Destination Count",
        "Status",
        "Processing Time",
    ]);

    for row in rows {
        let color = if row.is_match { Color::Green } else { Color::Red };
        table.add_row(vec![
            Cell::new(&row.table_name),
            Cell::new(row.source_count),
            Cell::new(row.destination_count),
            Cell::new(status_label(row)).fg(color),
            Cell::new(format!("{:.2}s", row.processing_time)),
        ]);
    }
    table
}
