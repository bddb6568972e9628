use actix_multipart::form::{text::TextConfig, MultipartFormConfig};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::protocol::SubmitResponse;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub fields: serde_json::Value,
}

/// Creates a configured MultipartFormConfig with standardized error handling
///
/// Malformed or oversized uploads answer in the job-creation shape
/// `{success: false, error}` so submitters can show the message.
pub fn multipart_config(total_limit: usize) -> MultipartFormConfig {
    MultipartFormConfig::default()
        .total_limit(total_limit)
        .error_handler(|err, _req| {
            let response = HttpResponse::build(err.status_code())
                .json(SubmitResponse::rejected(format!("Invalid upload: {}", err)));
            actix_web::error::InternalError::from_response(err, response).into()
        })
}

/// Text fields are accepted without a content type, as browsers send them
pub fn text_config() -> TextConfig {
    TextConfig::default().validate_content_type(false)
}
