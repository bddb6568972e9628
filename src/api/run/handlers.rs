use actix_multipart::form::MultipartForm;
use actix_web::{
    get, post,
    web::{scope, Data, Path, ServiceConfig},
    HttpResponse, Responder, ResponseError,
};

use super::models::RunValidationForm;
use super::service::{ServiceError, ValidationService};
use crate::protocol::{StatusResponse, SubmitResponse};

#[post("/run-validation")]
async fn run_validation(
    service: Data<ValidationService>,
    MultipartForm(form): MultipartForm<RunValidationForm>,
) -> impl Responder {
    match service.start_run(form).await {
        Ok(run_id) => HttpResponse::Ok().json(SubmitResponse::accepted(run_id)),
        Err(err) => {
            if matches!(err, ServiceError::StorageError(_)) {
                tracing::error!("Failed to start run: {}", err);
            } else {
                tracing::warn!("Rejected run: {}", err);
            }
            HttpResponse::build(err.status_code()).json(SubmitResponse::rejected(err.to_string()))
        }
    }
}

#[get("/validation-status/{run_id}")]
async fn validation_status(service: Data<ValidationService>, path: Path<String>) -> impl Responder {
    let run_id = path.into_inner();
    match service.status(&run_id).await {
        Ok(status) => HttpResponse::Ok().json(status),
        // A failed status tells pollers to stop
        Err(err) => HttpResponse::NotFound().json(StatusResponse::failed(err.to_string())),
    }
}

pub fn run_config(config: &mut ServiceConfig) {
    config.service(
        scope("/api")
            .service(run_validation)
            .service(validation_status),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::app_config;
    use crate::config::ServerConfig;
    use crate::protocol::RunStatus;
    use crate::runs::RunRegistry;
    use crate::worker::{run_queue, RunQueue};
    use actix_web::{http::header, test, App};
    use std::path::Path;
    use std::time::Duration;

    const BOUNDARY: &str = "XX-validation-runner-boundary";

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

    fn make_service(root: &Path) -> (Data<ValidationService>, RunRegistry, RunQueue) {
        let registry = RunRegistry::new();
        let (dispatcher, queue) = run_queue(8);
        let service = ValidationService::new(registry.clone(), dispatcher, &server_config(root), false);
        (Data::new(service), registry, queue)
    }

    fn multipart_body(files: &[(&str, &str, &str)], fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = String::new();
        for (field, filename, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{content}\r\n"
            ));
        }
        for (field, value) in fields {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"\r\n\r\n{value}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body.into_bytes()
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/run-validation")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn missing_destination_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry, _queue) = make_service(dir.path());
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let body = multipart_body(
            &[
                ("source_files", "employee_management.sql", "INSERT INTO employees VALUES (1);"),
                ("dest_files", "contractor_management.exe", "binary"),
            ],
            &[("batch_size", "100")],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), 400);

        let body: SubmitResponse = test::read_body_json(resp).await;
        assert!(!body.success);
        assert_eq!(
            body.error.as_deref(),
            Some("Both source and destination files are required")
        );
        assert_eq!(registry.counts().await.running, 0);
    }

    #[actix_web::test]
    async fn invalid_batch_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _registry, _queue) = make_service(dir.path());
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let body = multipart_body(
            &[
                ("source_files", "a.sql", "INSERT INTO t VALUES (1);"),
                ("dest_files", "b.sql", "INSERT INTO t VALUES (1);"),
            ],
            &[("batch_size", "900"), ("chunk_size", "1000")],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        let body: SubmitResponse = test::read_body_json(resp).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Batch size must be between 1 and 500"));
    }

    #[actix_web::test]
    async fn accepted_run_is_queued_with_common_tables() {
        let dir = tempfile::tempdir().unwrap();
        let (service, registry, queue) = make_service(dir.path());
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let body = multipart_body(
            &[
                (
                    "source_files",
                    "employee_management_dump.sql",
                    "INSERT INTO employees VALUES (1);\nINSERT INTO audit VALUES (1);",
                ),
                (
                    "dest_files",
                    "contractor_management.sql",
                    "INSERT INTO contractor_management.employees VALUES (1);",
                ),
            ],
            &[("batch_size", "50"), ("chunk_size", "1000")],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), 200);
        let body: SubmitResponse = test::read_body_json(resp).await;
        assert!(body.success);
        let run_id = body.run_id.unwrap();

        let ticket = queue.lock().await.try_recv().unwrap();
        assert_eq!(ticket.run_id, run_id);
        assert_eq!(ticket.config.selected_tables, vec!["employees"]);
        assert_eq!(ticket.config.batch_size, 50);
        assert_eq!(
            ticket.config.schemas,
            vec!["employee_management", "contractor_management"]
        );
        assert!(ticket.config.temp_dirs.source.ends_with(&format!("employee_management_{run_id}")));
        assert_eq!(ticket.config.source_files.len(), 1);
        assert!(Path::new(&ticket.config.source_files[0]).exists());

        let status = registry.status(&run_id).await.unwrap();
        assert_eq!(status.status, RunStatus::Running);
    }

    #[actix_web::test]
    async fn no_common_tables_fails_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _registry, queue) = make_service(dir.path());
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let body = multipart_body(
            &[
                ("source_files", "a.sql", "INSERT INTO employees VALUES (1);"),
                ("dest_files", "b.txt", "INSERT INTO projects VALUES (1);"),
            ],
            &[],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        let body: SubmitResponse = test::read_body_json(resp).await;
        assert!(body.success);
        let run_id = body.run_id.unwrap();
        assert!(queue.lock().await.try_recv().is_err());

        let req = test::TestRequest::get()
            .uri(&format!("/api/validation-status/{run_id}"))
            .to_request();
        let status: StatusResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(
            status.error.as_deref(),
            Some("No common tables found between source and destination files")
        );
    }

    #[actix_web::test]
    async fn storage_failure_leaves_no_run_behind() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the upload directory should be
        std::fs::write(dir.path().join("uploads"), "not a directory").unwrap();
        let (service, registry, queue) = make_service(dir.path());
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let body = multipart_body(
            &[
                ("source_files", "a.sql", "INSERT INTO employees VALUES (1);"),
                ("dest_files", "b.sql", "INSERT INTO employees VALUES (1);"),
            ],
            &[],
        );
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), 500);

        let body: SubmitResponse = test::read_body_json(resp).await;
        assert!(!body.success);
        assert!(body.run_id.is_none());
        assert!(body.error.unwrap().starts_with("Error saving uploaded files"));
        assert_eq!(registry.counts().await, crate::runs::RunCounts::default());
        assert!(queue.lock().await.try_recv().is_err());
    }

    #[actix_web::test]
    async fn unknown_run_answers_failed_status() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _registry, _queue) = make_service(dir.path());
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let req = test::TestRequest::get()
            .uri("/api/validation-status/nope")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let status: StatusResponse = test::read_body_json(resp).await;
        assert_eq!(status.status, RunStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("Unknown run id: nope"));
    }

    #[actix_web::test]
    async fn reports_are_served_by_sanitized_id() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _registry, _queue) = make_service(dir.path());
        std::fs::create_dir_all(dir.path().join("reports")).unwrap();
        std::fs::write(
            dir.path().join("reports/validation_report_r1.html"),
            "<h1>report</h1>",
        )
        .unwrap();
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let req = test::TestRequest::get().uri("/reports/r1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(test::read_body(resp).await, "<h1>report</h1>");

        let req = test::TestRequest::get().uri("/reports/r1.html").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);

        let req = test::TestRequest::get().uri("/reports/missing").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn readiness_requires_report_generator() {
        let dir = tempfile::tempdir().unwrap();
        let (service, _registry, _queue) = make_service(dir.path());
        let app = test::init_service(App::new().configure(app_config(service, 1024 * 1024))).await;

        let req = test::TestRequest::get().uri("/ready").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 503);
        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
        let req = test::TestRequest::get().uri("/live").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 200);
    }
}
