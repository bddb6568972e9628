use std::future::Future;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::error::ClientError;
use super::file_set::FileSet;
use super::request::JobRequest;
use super::JobHandle;
use crate::protocol::{
    StatusResponse, SubmitResponse, BATCH_SIZE_FIELD, CHUNK_SIZE_FIELD, DEST_FILES_FIELD,
    RUN_VALIDATION_PATH, SOURCE_FILES_FIELD, VALIDATION_STATUS_PATH,
};

/// Remote side of the job protocol
///
/// Implementations return the decoded response body; deciding what a
/// response means is left to the submitter and poller.
pub trait JobApi: Send + Sync {
    /// Send a job creation request
    fn create_job(
        &self,
        request: &JobRequest,
    ) -> impl Future<Output = Result<SubmitResponse, ClientError>> + Send;

    /// Fetch the current status of a job
    fn job_status(
        &self,
        handle: &JobHandle,
    ) -> impl Future<Output = Result<StatusResponse, ClientError>> + Send;
}

/// `JobApi` over HTTP
#[derive(Clone, Debug)]
pub struct HttpJobApi {
    client: Client,
    base_url: String,
}

impl HttpJobApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_form(request: &JobRequest) -> Form {
        let form = append_files(Form::new(), SOURCE_FILES_FIELD, &request.source_files);
        append_files(form, DEST_FILES_FIELD, &request.dest_files)
            .text(BATCH_SIZE_FIELD, request.batch_size.to_string())
            .text(CHUNK_SIZE_FIELD, request.chunk_size().to_string())
    }
}

fn append_files(mut form: Form, field: &'static str, files: &FileSet) -> Form {
    for file in files.iter() {
        let part = Part::bytes(file.bytes.clone()).file_name(file.name.clone());
        form = form.part(field, part);
    }
    form
}

impl JobApi for HttpJobApi {
    async fn create_job(&self, request: &JobRequest) -> Result<SubmitResponse, ClientError> {
        let url = format!("{}{}", self.base_url, RUN_VALIDATION_PATH);
        debug!(
            "Submitting {} source and {} destination files to {}",
            request.source_files.len(),
            request.dest_files.len(),
            url
        );

        let response = self
            .client
            .post(&url)
            .multipart(Self::build_form(request))
            .send()
            .await?;

        // Error statuses still carry a JSON body describing the failure
        let body = response.json::<SubmitResponse>().await?;
        Ok(body)
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<StatusResponse, ClientError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            VALIDATION_STATUS_PATH,
            handle.run_id()
        );
        let body = self
            .client
            .get(&url)
            .send()
            .await?
            .json::<StatusResponse>()
            .await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::file_set::FileBlob;
    use crate::client::{NoopObserver, PollState, Poller, PollerConfig};
    use actix_web::{web, App, HttpResponse, HttpServer};
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves malformed bodies: plain text for submissions, and for status
    /// checks a numeric status, then plain text, then a completed run
    fn start_host() -> String {
        let status_calls = web::Data::new(AtomicUsize::new(0));
        let server = HttpServer::new(move || {
            App::new()
                .app_data(status_calls.clone())
                .route(
                    RUN_VALIDATION_PATH,
                    web::post().to(|| async {
                        HttpResponse::Ok().content_type("text/plain").body("queued")
                    }),
                )
                .route(
                    &format!("{VALIDATION_STATUS_PATH}/{{run_id}}"),
                    web::get().to(|calls: web::Data<AtomicUsize>| async move {
                        match calls.fetch_add(1, Ordering::SeqCst) {
                            0 => HttpResponse::Ok().json(serde_json::json!({"status": 7})),
                            1 => HttpResponse::Ok().content_type("text/plain").body("busy"),
                            _ => HttpResponse::Ok().json(serde_json::json!({"status": "completed"})),
                        }
                    }),
                )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{addr}")
    }

    fn request() -> JobRequest {
        JobRequest::new(
            FileSet::from_iter([FileBlob::new("a.sql", "INSERT INTO t VALUES (1);")]),
            FileSet::from_iter([FileBlob::new("b.sql", "INSERT INTO t VALUES (1);")]),
            100,
        )
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let api = HttpJobApi::new("http://localhost:5000/").unwrap();
        assert_eq!(api.base_url(), "http://localhost:5000");
    }

    #[actix_web::test]
    async fn plain_text_submission_is_a_transport_error() {
        let api = HttpJobApi::new(start_host()).unwrap();
        assert_matches!(api.create_job(&request()).await, Err(ClientError::Transport(_)));
    }

    #[actix_web::test]
    async fn malformed_status_is_a_transport_error() {
        let api = HttpJobApi::new(start_host()).unwrap();
        let handle = JobHandle::new("20240101_000000_abcd");

        assert_matches!(api.job_status(&handle).await, Err(ClientError::Transport(_)));
        assert_matches!(api.job_status(&handle).await, Err(ClientError::Transport(_)));
        assert_eq!(
            api.job_status(&handle).await.unwrap().status,
            crate::protocol::RunStatus::Completed
        );
    }

    #[actix_web::test]
    async fn poller_keeps_polling_past_malformed_status() {
        let api = HttpJobApi::new(start_host()).unwrap();
        let config = PollerConfig {
            interval: Duration::from_millis(20),
            max_polls: 10,
        };
        let mut poller = Poller::new(&api, &NoopObserver, config);

        let run = poller.poll(&JobHandle::new("r1")).await.unwrap();

        assert_eq!(run.run_id, "r1");
        assert!(run.results.is_empty());
        assert_eq!(poller.attempts(), 3);
        assert_eq!(poller.state(), PollState::Completed);
    }
}
