use super::error::ClientError;
use super::CompletedRun;

/// Progress reported by a `running` status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percentage: Option<u8>,
    pub current_table: Option<String>,
}

/// Receiver of everything the user should see while a job runs
pub trait JobObserver: Send + Sync {
    /// Submission is about to be sent
    fn progress_shown(&self);

    /// Progress display is no longer needed
    fn progress_hidden(&self);

    fn progress(&self, update: &ProgressUpdate);

    /// Terminal payload of a successful run, delivered once
    fn completed(&self, run: &CompletedRun);

    fn error(&self, error: &ClientError);
}

/// Observer that ignores every notification
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl JobObserver for NoopObserver {
    fn progress_shown(&self) {}
    fn progress_hidden(&self) {}
    fn progress(&self, _update: &ProgressUpdate) {}
    fn completed(&self, _run: &CompletedRun) {}
    fn error(&self, _error: &ClientError) {}
}
