use validator::Validate;

use super::error::ClientError;
use super::file_set::FileSet;
use crate::protocol::{CHUNK_SIZE, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE, MIN_BATCH_SIZE};

/// Everything needed to start a validation job
#[derive(Debug, Clone, Validate)]
pub struct JobRequest {
    pub source_files: FileSet,
    pub dest_files: FileSet,
    #[validate(range(min = 1, max = 500, message = "Batch size must be between 1 and 500"))]
    pub batch_size: u32,
}

impl JobRequest {
    pub fn new(source_files: FileSet, dest_files: FileSet, batch_size: u32) -> Self {
        Self {
            source_files,
            dest_files,
            batch_size,
        }
    }

    /// Chunk size is not user-configurable
    pub fn chunk_size(&self) -> u32 {
        CHUNK_SIZE
    }

    /// Check preconditions that must hold before anything is sent
    pub fn check(&self) -> Result<(), ClientError> {
        if self.source_files.is_empty() {
            return Err(ClientError::Validation(
                "Please upload at least one source file".to_string(),
            ));
        }
        if self.dest_files.is_empty() {
            return Err(ClientError::Validation(
                "Please upload at least one destination file".to_string(),
            ));
        }
        self.validate().map_err(|errors| {
            let messages: Vec<String> = errors
                .field_errors()
                .values()
                .flat_map(|errors| {
                    errors.iter().map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "Invalid parameter".to_string())
                    })
                })
                .collect();
            ClientError::Validation(messages.join("; "))
        })
    }
}

/// Coerce free-form batch size input into the accepted range
///
/// Unparseable input and values below the minimum become the minimum,
/// values above the maximum become the maximum.
pub fn clamp_batch_size(input: &str) -> u32 {
    match input.trim().parse::<i64>() {
        Ok(value) if value < MIN_BATCH_SIZE as i64 => MIN_BATCH_SIZE,
        Ok(value) if value > MAX_BATCH_SIZE as i64 => MAX_BATCH_SIZE,
        Ok(value) => value as u32,
        Err(_) => MIN_BATCH_SIZE,
    }
}

pub fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}
