use actix_web::{get, web, HttpResponse};

use crate::api::run::{ServiceError, ValidationService};

/// Serve the rendered HTML report of a finished run
#[get("/reports/{report_id}")]
async fn view_report(
    service: web::Data<ValidationService>,
    path: web::Path<String>,
) -> Result<HttpResponse, ServiceError> {
    let html = service.report_html(&path.into_inner()).await?;
    Ok(HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(html))
}

pub fn reports_config(config: &mut web::ServiceConfig) {
    config.service(view_report);
}
