//! Job submission and status polling client.
//!
//! A [`Submitter`] turns a [`JobRequest`] into a [`JobHandle`], a [`Poller`]
//! follows that handle until the run reaches a terminal state. Everything the
//! user should see goes through a [`JobObserver`].

pub mod api;
pub mod error;
pub mod file_set;
pub mod observer;
pub mod poller;
pub mod request;
pub mod submitter;

use std::fmt;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use api::{HttpJobApi, JobApi};
pub use error::ClientError;
pub use file_set::{FileBlob, FileSet};
pub use observer::{JobObserver, NoopObserver, ProgressUpdate};
pub use poller::{PollState, Poller, PollerConfig};
pub use request::{clamp_batch_size, JobRequest};
pub use submitter::Submitter;

use crate::protocol::ResultRow;

/// Identifier of a submitted run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self(run_id.into())
    }

    pub fn run_id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Terminal payload of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub run_id: String,
    pub results: Vec<ResultRow>,
    pub report_data: Option<Value>,
    pub report_id: Option<String>,
}

/// Submits a job and follows it to completion
pub struct JobClient<A, O> {
    api: A,
    observer: O,
    config: PollerConfig,
    cancel: CancellationToken,
}

impl<A: JobApi, O: JobObserver> JobClient<A, O> {
    pub fn new(api: A, observer: O, config: PollerConfig) -> Self {
        Self {
            api,
            observer,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops polling when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub async fn run(&self, request: &JobRequest) -> Result<CompletedRun, ClientError> {
        let handle = Submitter::new(&self.api, &self.observer)
            .submit(request)
            .await?;
        Poller::new(&self.api, &self.observer, self.config)
            .with_cancellation(self.cancel.clone())
            .poll(&handle)
            .await
    }
}
