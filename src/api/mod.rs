pub mod health;
pub mod reports;
pub mod run;
pub mod validation;

use actix_web::web;

use self::health::health_config;
use self::reports::reports_config;
use self::run::{handlers::run_config, ValidationService};

/// Register shared state, payload limits and every route of the job host
pub fn app_config(
    service: web::Data<ValidationService>,
    max_payload_size: usize,
) -> impl FnOnce(&mut web::ServiceConfig) {
    move |config| {
        config
            .app_data(service)
            .app_data(web::PayloadConfig::default().limit(max_payload_size))
            .app_data(validation::multipart_config(max_payload_size))
            .app_data(validation::text_config())
            .configure(health_config)
            .configure(run_config)
            .configure(reports_config);
    }
}
