use std::path::Path;

use serde_json::Value;

use crate::protocol::ResultRow;

/// Processing time shown when the report does not record one
const DEFAULT_PROCESSING_TIME: f64 = 1.0;

/// Read a JSON report produced by the generator
pub async fn load_report(path: &Path) -> Result<Value, String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    serde_json::from_slice(&bytes).map_err(|e| format!("cannot parse {}: {}", path.display(), e))
}

/// One result row per entry of the report's `table_comparisons`
pub fn results_from_report(report: &Value) -> Vec<ResultRow> {
    let Some(tables) = report.get("table_comparisons").and_then(Value::as_object) else {
        return Vec::new();
    };

    tables
        .iter()
        .map(|(table_name, table)| {
            let summary = table.get("summary").cloned().unwrap_or(Value::Null);
            let count = |key: &str| summary.get(key).and_then(Value::as_u64).unwrap_or(0);
            let has_differences = summary
                .get("has_differences")
                .and_then(Value::as_bool)
                .unwrap_or(false);

            ResultRow {
                table_name: table_name.clone(),
                source_count: count("rows_in_source"),
                destination_count: count("rows_in_destination"),
                is_match: !has_differences,
                matching_rows: count("matching_rows"),
                different_rows: count("different_rows"),
                missing_rows: count("missing_rows"),
                processing_time: summary
                    .get("processing_time")
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_PROCESSING_TIME),
            }
        })
        .collect()
}
