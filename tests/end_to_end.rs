use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpServer};
use assert_matches::assert_matches;

use validation_runner::api::{app_config, run::ValidationService};
use validation_runner::client::{
    ClientError, FileBlob, FileSet, HttpJobApi, JobClient, JobRequest, NoopObserver, PollerConfig,
};
use validation_runner::config::ServerConfig;
use validation_runner::report::{EngineError, ReportEngine, ReportOutcome, RuntimeConfig};
use validation_runner::runs::RunRegistry;
use validation_runner::worker::{run_queue, spawn_workers};

/// Writes a one-table JSON report for every selected table
struct FakeEngine {
    report_dir: PathBuf,
}

impl ReportEngine for FakeEngine {
    async fn generate(&self, config: &RuntimeConfig) -> Result<ReportOutcome, EngineError> {
        let comparisons: serde_json::Map<String, serde_json::Value> = config
            .selected_tables
            .iter()
            .map(|table| {
                (
                    table.clone(),
                    serde_json::json!({"summary": {
                        "rows_in_source": 2,
                        "rows_in_destination": 1,
                        "has_differences": true,
                        "matching_rows": 1,
                        "missing_rows": 1
                    }}),
                )
            })
            .collect();
        let report = serde_json::json!({ "table_comparisons": comparisons });

        let path = self
            .report_dir
            .join(format!("validation_report_{}.json", config.run_id));
        tokio::fs::create_dir_all(&self.report_dir)
            .await
            .map_err(EngineError::IoError)?;
        tokio::fs::write(&path, report.to_string())
            .await
            .map_err(EngineError::IoError)?;

        Ok(ReportOutcome {
            success: true,
            report_id: Some(config.run_id.clone()),
            json_report: Some(path.to_string_lossy().into_owned()),
            ..Default::default()
        })
    }
}

fn server_config(root: &Path) -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        max_payload_size: 1024 * 1024,
        upload_dir: root.join("uploads"),
        report_dir: root.join("reports"),
        report_command: None,
        report_timeout: Duration::from_secs(5),
        num_workers: 1,
        max_concurrent_runs: 1,
        known_schemas: vec![
            "employee_management".to_string(),
            "contractor_management".to_string(),
        ],
        default_source_schema: "employee_management".to_string(),
        default_dest_schema: "contractor_management".to_string(),
        log_dir: root.join("logs").to_string_lossy().into_owned(),
    }
}

/// Job host running on an ephemeral port; workers stop when dropped
struct TestHost {
    base_url: String,
    _shutdown_tx: tokio::sync::watch::Sender<bool>,
}

fn start_server(root: &Path) -> TestHost {
    let config = server_config(root);
    let registry = RunRegistry::new();
    let (dispatcher, queue) = run_queue(4);
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let engine = Arc::new(FakeEngine {
        report_dir: config.report_dir.clone(),
    });
    spawn_workers(1, 1, registry.clone(), engine, queue, shutdown_rx);

    let service = web::Data::new(ValidationService::new(registry, dispatcher, &config, true));
    let server = HttpServer::new(move || App::new().configure(app_config(service.clone(), 1024 * 1024)))
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());

    TestHost {
        base_url: format!("http://{addr}"),
        _shutdown_tx: shutdown_tx,
    }
}

fn poller_config() -> PollerConfig {
    PollerConfig {
        interval: Duration::from_millis(50),
        max_polls: 100,
    }
}

#[actix_web::test]
async fn submitted_run_completes_with_results() {
    let dir = tempfile::tempdir().unwrap();
    let host = start_server(dir.path());

    let source = FileSet::from_iter([FileBlob::new(
        "employee_management.sql",
        "INSERT INTO employees VALUES (1, 'a');\nINSERT INTO employees VALUES (2, 'b');",
    )]);
    let dest = FileSet::from_iter([FileBlob::new(
        "contractor_management.sql",
        "INSERT INTO contractor_management.employees VALUES (1, 'a');",
    )]);

    let client = JobClient::new(HttpJobApi::new(&host.base_url).unwrap(), NoopObserver, poller_config());
    let run = client
        .run(&JobRequest::new(source, dest, 100))
        .await
        .unwrap();

    assert_eq!(run.results.len(), 1);
    let row = &run.results[0];
    assert_eq!(row.table_name, "employees");
    assert!(!row.is_match);
    assert_eq!(row.missing_rows, 1);
    assert_eq!(run.report_id.as_deref(), Some(run.run_id.as_str()));
    assert!(run.report_data.is_some());

    // Uploaded files are cleaned up once the run finishes
    let leftovers = std::fs::read_dir(dir.path().join("uploads")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[actix_web::test]
async fn run_without_common_tables_is_reported_as_failure() {
    let dir = tempfile::tempdir().unwrap();
    let host = start_server(dir.path());

    let source = FileSet::from_iter([FileBlob::new("a.sql", "INSERT INTO employees VALUES (1);")]);
    let dest = FileSet::from_iter([FileBlob::new("b.sql", "INSERT INTO projects VALUES (1);")]);

    let client = JobClient::new(HttpJobApi::new(&host.base_url).unwrap(), NoopObserver, poller_config());
    let err = client
        .run(&JobRequest::new(source, dest, 100))
        .await
        .unwrap_err();

    assert_matches!(err, ClientError::JobFailed(msg) if msg.contains("No common tables"));
}

#[actix_web::test]
async fn rejected_upload_is_a_submission_error() {
    let dir = tempfile::tempdir().unwrap();
    let host = start_server(dir.path());

    let source = FileSet::from_iter([FileBlob::new("a.exe", "binary")]);
    let dest = FileSet::from_iter([FileBlob::new("b.sql", "INSERT INTO projects VALUES (1);")]);

    let client = JobClient::new(HttpJobApi::new(&host.base_url).unwrap(), NoopObserver, poller_config());
    let err = client
        .run(&JobRequest::new(source, dest, 100))
        .await
        .unwrap_err();

    assert_matches!(err, ClientError::Submission(msg) if msg == "Both source and destination files are required");
}
