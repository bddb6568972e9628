use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use actix_multipart::form::tempfile::TempFile;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use tracing::{error, info, warn};

use super::models::{RunParameters, RunValidationForm};
use crate::api::validation::ErrorResponse;
use crate::config::ServerConfig;
use crate::discovery::discover_tables;
use crate::protocol::StatusResponse;
use crate::report::{RuntimeConfig, TempDirs};
use crate::runs::{RunCounts, RunRegistry};
use crate::worker::{remove_dirs, RunDispatcher, RunTicket};

/// Extensions accepted for uploaded dumps
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["docx", "sql", "txt"];

/// Service-level errors
#[derive(Debug)]
pub enum ServiceError {
    /// The request was rejected before a run was registered
    ValidationError(String),

    /// Uploaded files could not be stored
    StorageError(std::io::Error),

    /// Run or report not found
    NotFound(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::ValidationError(msg) => write!(f, "{}", msg),
            ServiceError::StorageError(e) => write!(f, "Error saving uploaded files: {}", e),
            ServiceError::NotFound(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ServiceError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ServiceError::ValidationError(msg) => {
                warn!("Validation error: {}", msg);
                HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Validation failed".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
            ServiceError::StorageError(e) => {
                error!("Storage error: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse {
                    error: "Failed to process request".to_string(),
                    fields: serde_json::json!({"message": "Storage error occurred"}),
                })
            }
            ServiceError::NotFound(msg) => {
                warn!("Not found: {}", msg);
                HttpResponse::NotFound().json(ErrorResponse {
                    error: "Not found".to_string(),
                    fields: serde_json::json!({"message": msg}),
                })
            }
        }
    }
}

/// An accepted upload, renamed to a safe filename
struct Upload {
    name: String,
    file: TempFile,
}

/// Run orchestration shared by the HTTP handlers
pub struct ValidationService {
    registry: RunRegistry,
    dispatcher: RunDispatcher,
    upload_dir: PathBuf,
    report_dir: PathBuf,
    known_schemas: Vec<String>,
    default_source_schema: String,
    default_dest_schema: String,
    report_configured: bool,
}

impl ValidationService {
    /// Create a new ValidationService instance
    pub fn new(
        registry: RunRegistry,
        dispatcher: RunDispatcher,
        config: &ServerConfig,
        report_configured: bool,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            upload_dir: config.upload_dir.clone(),
            report_dir: config.report_dir.clone(),
            known_schemas: config.known_schemas.clone(),
            default_source_schema: config.default_source_schema.clone(),
            default_dest_schema: config.default_dest_schema.clone(),
            report_configured,
        }
    }

    pub fn report_configured(&self) -> bool {
        self.report_configured
    }

    pub async fn run_counts(&self) -> RunCounts {
        self.registry.counts().await
    }

    /// Start a validation run from an uploaded form
    ///
    /// # Business Logic
    /// - Keeps only allowed dump files, under sanitized names
    /// - Validates batch and chunk size
    /// - Registers the run and stores each side in its own directory
    /// - Discovers the tables common to both sides
    /// - Queues the run for the worker pool
    ///
    /// Failures after the uploads are stored mark the run failed but still
    /// return its id, so the caller learns the outcome by polling. A storage
    /// failure discards the run and rejects the request.
    ///
    /// # Returns
    /// - `Ok(run_id)` - Run registered
    /// - `Err(ServiceError)` - Request rejected
    pub async fn start_run(&self, form: RunValidationForm) -> Result<String, ServiceError> {
        let source = accept_uploads(form.source_files);
        let dest = accept_uploads(form.dest_files);
        if source.is_empty() || dest.is_empty() {
            return Err(ServiceError::ValidationError(
                "Both source and destination files are required".to_string(),
            ));
        }

        let params = RunParameters::parse(
            form.batch_size.as_ref().map(|t| t.0.as_str()),
            form.chunk_size.as_ref().map(|t| t.0.as_str()),
        )
        .map_err(ServiceError::ValidationError)?;

        let run_id = self.registry.create().await;
        info!(
            "Service: Starting run {} with {} source and {} destination files",
            run_id,
            source.len(),
            dest.len()
        );

        let source_names: Vec<String> = source.iter().map(|u| u.name.clone()).collect();
        let dest_names: Vec<String> = dest.iter().map(|u| u.name.clone()).collect();
        let source_schema = self.infer_schema(&source_names, &self.default_source_schema);
        let dest_schema = self.infer_schema(&dest_names, &self.default_dest_schema);

        let source_dir = self.upload_dir.join(format!("{}_{}", source_schema, run_id));
        let dest_dir = if dest_schema == source_schema {
            self.upload_dir.join(format!("{}_{}_dest", dest_schema, run_id))
        } else {
            self.upload_dir.join(format!("{}_{}", dest_schema, run_id))
        };
        let cleanup_dirs = vec![source_dir.clone(), dest_dir.clone()];

        let stored = async {
            let source_files = store_uploads(source, &source_dir).await?;
            let dest_files = store_uploads(dest, &dest_dir).await?;
            Ok::<_, std::io::Error>((source_files, dest_files))
        }
        .await;
        let (source_files, dest_files) = match stored {
            Ok(files) => files,
            Err(e) => {
                // The id was never handed out
                self.registry.discard(&run_id).await;
                remove_dirs(&cleanup_dirs).await;
                return Err(ServiceError::StorageError(e));
            }
        };

        let common_tables = {
            let source_files = source_files.clone();
            let dest_files = dest_files.clone();
            tokio::task::spawn_blocking(move || {
                let source_tables = discover_tables(&source_files);
                let dest_tables = discover_tables(&dest_files);
                source_tables
                    .intersection(&dest_tables)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .await
        };
        let selected_tables = match common_tables {
            Ok(tables) if tables.is_empty() => {
                warn!("Run {} has no common tables", run_id);
                self.registry
                    .fail(
                        &run_id,
                        "No common tables found between source and destination files",
                    )
                    .await;
                remove_dirs(&cleanup_dirs).await;
                return Ok(run_id);
            }
            Ok(tables) => tables,
            Err(e) => {
                error!("Table discovery for run {} failed: {}", run_id, e);
                self.registry
                    .fail(&run_id, format!("Error discovering tables: {}", e))
                    .await;
                remove_dirs(&cleanup_dirs).await;
                return Ok(run_id);
            }
        };
        info!("Run {}: found {} common tables", run_id, selected_tables.len());

        let config = RuntimeConfig {
            run_id: run_id.clone(),
            schemas: vec![source_schema.clone(), dest_schema.clone()],
            schema_paths: BTreeMap::from([
                (source_schema, path_string(&source_dir)),
                (dest_schema, path_string(&dest_dir)),
            ]),
            data_directory: path_string(&self.upload_dir),
            report_directory: path_string(&self.report_dir),
            batch_size: params.batch_size,
            chunk_size: params.chunk_size,
            use_direct_comparison: true,
            selected_tables,
            file_types: file_types(source_files.iter().chain(dest_files.iter())),
            source_files: source_files.iter().map(|p| path_string(p)).collect(),
            dest_files: dest_files.iter().map(|p| path_string(p)).collect(),
            uploaded_files: source_files
                .iter()
                .chain(dest_files.iter())
                .map(|p| path_string(p))
                .collect(),
            temp_dirs: TempDirs {
                source: path_string(&source_dir),
                dest: path_string(&dest_dir),
            },
        };

        let ticket = RunTicket {
            run_id: run_id.clone(),
            config,
            cleanup_dirs,
        };
        if let Err(ticket) = self.dispatcher.dispatch(ticket).await {
            error!("Worker pool is not running; run {} dropped", ticket.run_id);
            self.registry
                .fail(&ticket.run_id, "Worker pool is not running")
                .await;
            remove_dirs(&ticket.cleanup_dirs).await;
        }

        Ok(run_id)
    }

    /// Current status of a run
    pub async fn status(&self, run_id: &str) -> Result<StatusResponse, ServiceError> {
        self.registry
            .status(run_id)
            .await
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown run id: {}", run_id)))
    }

    /// Rendered HTML report of a finished run
    pub async fn report_html(&self, report_id: &str) -> Result<Vec<u8>, ServiceError> {
        let not_found = || ServiceError::NotFound("Report not found".to_string());
        if !is_valid_report_id(report_id) {
            return Err(not_found());
        }

        let path = self
            .report_dir
            .join(format!("validation_report_{}.html", report_id));
        tokio::fs::read(&path).await.map_err(|e| {
            warn!("Cannot read report {}: {}", path.display(), e);
            not_found()
        })
    }

    fn infer_schema(&self, names: &[String], fallback: &str) -> String {
        infer_schema(names, &self.known_schemas, fallback)
    }
}

/// Schemas recognized anywhere inside a filename
const EMBEDDED_SCHEMAS: [&str; 2] = ["employee_management", "contractor_management"];

/// Schema for a set of uploaded filenames
///
/// A stem containing one of the embedded schema names maps to it; any other
/// stem is taken whole. The first candidate found in `known_schemas` wins,
/// otherwise `fallback` is used.
pub fn infer_schema(names: &[String], known_schemas: &[String], fallback: &str) -> String {
    for name in names {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lowered = stem.to_lowercase();
        let candidate = EMBEDDED_SCHEMAS
            .iter()
            .find(|embedded| lowered.contains(**embedded))
            .map_or(stem.as_str(), |embedded| *embedded);
        if let Some(schema) = known_schemas
            .iter()
            .find(|schema| schema.eq_ignore_ascii_case(candidate))
        {
            return schema.clone();
        }
    }
    fallback.to_string()
}

/// Whether `name` has one of the accepted extensions
pub fn allowed_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Reduce a client-supplied filename to a safe basename
///
/// Whitespace becomes `_`, characters outside `[A-Za-z0-9._-]` are dropped
/// and leading dots are stripped.
pub fn secure_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some('_')
            } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                Some(c)
            } else {
                None
            }
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Report ids are restricted to `[A-Za-z0-9_-]`
pub fn is_valid_report_id(report_id: &str) -> bool {
    !report_id.is_empty()
        && report_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn accept_uploads(files: Vec<TempFile>) -> Vec<Upload> {
    files
        .into_iter()
        .filter_map(|file| {
            let original = file.file_name.clone().unwrap_or_default();
            let name = secure_filename(&original);
            if name.is_empty() || !allowed_file(&name) {
                warn!("Skipping upload with disallowed name: {:?}", original);
                return None;
            }
            Some(Upload { name, file })
        })
        .collect()
}

async fn store_uploads(uploads: Vec<Upload>, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let mut stored = Vec::with_capacity(uploads.len());
    for upload in uploads {
        let target = dir.join(&upload.name);
        tokio::fs::copy(upload.file.file.path(), &target).await?;
        stored.push(target);
    }
    Ok(stored)
}

/// Distinct lowercase extensions of `paths`
fn file_types<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> Vec<String> {
    paths
        .filter_map(|p| p.extension())
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_dump_extensions_are_allowed() {
        assert!(allowed_file("dump.sql"));
        assert!(allowed_file("Export.DOCX"));
        assert!(allowed_file("notes.txt"));
        assert!(!allowed_file("archive.zip"));
        assert!(!allowed_file("sql"));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(secure_filename("../../etc/passwd.sql"), "passwd.sql");
        assert_eq!(secure_filename("C:\\dumps\\my dump.sql"), "my_dump.sql");
        assert_eq!(secure_filename("..hidden.txt"), "hidden.txt");
        assert_eq!(secure_filename("rés*umé.docx"), "rsum.docx");
        assert_eq!(secure_filename("../"), "");
    }

    #[test]
    fn report_ids_are_restricted() {
        assert!(is_valid_report_id("20240101_120000-a1"));
        assert!(!is_valid_report_id("../secret"));
        assert!(!is_valid_report_id("a.b"));
        assert!(!is_valid_report_id(""));
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn schema_is_the_whole_stem_when_known() {
        let known = names(&["hr", "employee_management"]);

        assert_eq!(infer_schema(&names(&["three.sql"]), &known, "fallback"), "fallback");
        assert_eq!(infer_schema(&names(&["hr_dump.sql"]), &known, "fallback"), "fallback");
        assert_eq!(infer_schema(&names(&["HR.sql"]), &known, "fallback"), "hr");
        assert_eq!(
            infer_schema(&names(&["notes.txt", "hr.sql"]), &known, "fallback"),
            "hr"
        );
    }

    #[test]
    fn embedded_schema_names_are_matched_anywhere() {
        let known = names(&["employee_management", "contractor_management"]);

        assert_eq!(
            infer_schema(&names(&["My_Employee_Management_dump.sql"]), &known, "x"),
            "employee_management"
        );
        assert_eq!(
            infer_schema(&names(&["2024_contractor_management.docx"]), &known, "x"),
            "contractor_management"
        );
    }

    #[test]
    fn embedded_schema_must_still_be_known() {
        let known = names(&["hr"]);
        assert_eq!(
            infer_schema(&names(&["employee_management.sql"]), &known, "hr"),
            "hr"
        );
    }

    #[test]
    fn file_types_are_distinct_and_sorted() {
        let paths = [
            PathBuf::from("a/x.SQL"),
            PathBuf::from("a/y.sql"),
            PathBuf::from("b/z.docx"),
        ];
        assert_eq!(file_types(paths.iter()), vec!["docx", "sql"]);
    }
}
