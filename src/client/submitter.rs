use tracing::{error, info, warn};

use super::api::JobApi;
use super::error::ClientError;
use super::observer::JobObserver;
use super::request::JobRequest;
use super::JobHandle;

/// Sends a job request and turns the backend answer into a `JobHandle`
pub struct Submitter<'a, A, O> {
    api: &'a A,
    observer: &'a O,
}

impl<'a, A: JobApi, O: JobObserver> Submitter<'a, A, O> {
    pub fn new(api: &'a A, observer: &'a O) -> Self {
        Self { api, observer }
    }

    /// Submit a job
    ///
    /// # Returns
    /// - `Ok(JobHandle)` - backend accepted the job
    /// - `Err(ClientError::Validation)` - a precondition failed, nothing was sent
    /// - `Err(ClientError::Submission)` - backend rejected the job
    /// - `Err(ClientError::Transport)` - request or response decoding failed
    pub async fn submit(&self, request: &JobRequest) -> Result<JobHandle, ClientError> {
        if let Err(err) = request.check() {
            warn!("Submission blocked: {}", err);
            self.observer.error(&err);
            return Err(err);
        }

        info!(
            "Submitting validation: source={:?}, dest={:?}, batch_size={}",
            request.source_files.names(),
            request.dest_files.names(),
            request.batch_size
        );
        self.observer.progress_shown();

        let result = match self.api.create_job(request).await {
            Ok(response) if response.success => match response.run_id {
                Some(run_id) => Ok(JobHandle::new(run_id)),
                None => Err(ClientError::Transport(
                    "job creation response is missing run_id".to_string(),
                )),
            },
            Ok(response) => Err(ClientError::Submission(
                response.error.unwrap_or_else(|| "Unknown error".to_string()),
            )),
            Err(err) => Err(err),
        };

        match result {
            Ok(handle) => {
                info!("Validation started with run_id={}", handle.run_id());
                Ok(handle)
            }
            Err(err) => {
                error!("Error running validation: {}", err);
                self.observer.progress_hidden();
                self.observer.error(&err);
                Err(err)
            }
        }
    }
}
