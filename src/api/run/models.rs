use actix_multipart::form::{tempfile::TempFile, text::Text, MultipartForm};
use validator::Validate;

use crate::protocol::{CHUNK_SIZE, DEFAULT_BATCH_SIZE};

/// Multipart body of a run-validation request
///
/// Numeric fields arrive as text so malformed values get a readable message
/// instead of a multipart parse error.
#[derive(Debug, MultipartForm)]
pub struct RunValidationForm {
    pub source_files: Vec<TempFile>,
    pub dest_files: Vec<TempFile>,
    pub batch_size: Option<Text<String>>,
    pub chunk_size: Option<Text<String>>,
}

/// Tuning parameters of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct RunParameters {
    #[validate(range(min = 1, max = 500, message = "Batch size must be between 1 and 500"))]
    pub batch_size: u32,
    #[validate(range(min = 1, message = "Chunk size must be at least 1"))]
    pub chunk_size: u32,
}

impl RunParameters {
    /// Parse raw form values, using defaults for missing or blank fields
    pub fn parse(batch_size: Option<&str>, chunk_size: Option<&str>) -> Result<Self, String> {
        let params = RunParameters {
            batch_size: parse_field("batch size", batch_size, DEFAULT_BATCH_SIZE)?,
            chunk_size: parse_field("chunk size", chunk_size, CHUNK_SIZE)?,
        };

        params.validate().map_err(|errors| {
            errors
                .field_errors()
                .values()
                .flat_map(|errors| {
                    errors.iter().map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "Invalid run parameters".to_string())
                    })
                })
                .collect::<Vec<_>>()
                .join("; ")
        })?;

        Ok(params)
    }
}

fn parse_field(label: &str, raw: Option<&str>, default: u32) -> Result<u32, String> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| format!("Invalid {}: {}", label, value)),
    }
}
