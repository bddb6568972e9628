/// Errors surfaced by the submission and polling client
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Client-side precondition not met, no request was sent
    #[error("{0}")]
    Validation(String),

    /// Backend rejected the submission
    #[error("Error starting validation: {0}")]
    Submission(String),

    /// Network failure or unreadable response body
    #[error("Transport error: {0}")]
    Transport(String),

    /// Poll budget exhausted before the job reached a terminal state
    #[error("Validation timeout after {polls} status checks: the process is taking too long. Please try again with smaller batch size.")]
    Timeout { polls: u32 },

    /// Backend reported the job as failed
    #[error("Validation failed: {0}")]
    JobFailed(String),

    /// Polling was cancelled by the caller
    #[error("Polling cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Validation(format!("Failed to read file: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            ClientError::Submission("bad".to_string()).to_string(),
            "Error starting validation: bad"
        );
        assert_eq!(
            ClientError::JobFailed("no tables".to_string()).to_string(),
            "Validation failed: no tables"
        );
        assert!(ClientError::Timeout { polls: 300 }.to_string().contains("300"));
    }
}
