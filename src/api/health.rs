use actix_web::{get, web, HttpResponse, Responder};
use serde::Serialize;
use tracing::warn;

use crate::api::run::ValidationService;
use crate::runs::RunCounts;

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    report_generator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    runs: Option<RunCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn generator_label(configured: bool) -> String {
    if configured { "configured" } else { "not_configured" }.to_string()
}

/// Health check endpoint
///
/// General health check including the run registry.
/// Use for load balancers and uptime monitors.
#[get("/health")]
async fn health_check(service: web::Data<ValidationService>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        report_generator: generator_label(service.report_configured()),
        runs: Some(service.run_counts().await),
        error: None,
    })
}

/// Readiness check endpoint
///
/// Runs cannot finish without a report generator, so the service is not
/// ready until one is configured.
#[get("/ready")]
async fn readiness_check(service: web::Data<ValidationService>) -> impl Responder {
    if service.report_configured() {
        HttpResponse::Ok().json(HealthResponse {
            status: "ready".to_string(),
            report_generator: generator_label(true),
            runs: None,
            error: None,
        })
    } else {
        warn!("Readiness check failed: no report generator configured");
        HttpResponse::ServiceUnavailable().json(HealthResponse {
            status: "not_ready".to_string(),
            report_generator: generator_label(false),
            runs: None,
            error: Some("REPORT_COMMAND is not set".to_string()),
        })
    }
}

/// Liveness check endpoint
///
/// Simple check that the process is alive. Does not check dependencies.
#[get("/live")]
async fn liveness_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "alive".to_string(),
        report_generator: "not_checked".to_string(),
        runs: None,
        error: None,
    })
}

pub fn health_config(config: &mut web::ServiceConfig) {
    config
        .service(health_check)
        .service(readiness_check)
        .service(liveness_check);
}
