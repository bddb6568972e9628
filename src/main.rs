use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{
    filter::LevelFilter, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt, Layer,
};

use validation_runner::api::{app_config, run::ValidationService};
use validation_runner::cli::{self, Cli, Commands};
use validation_runner::client::ClientError;
use validation_runner::config::{ClientConfig, ServerConfig};
use validation_runner::report::{CommandEngine, ReportEngine};
use validation_runner::runs::RunRegistry;
use validation_runner::shutdown::ShutdownCoordinator;
use validation_runner::worker::{run_queue, spawn_workers};

/// Initialize logging with daily rotation and level separation
///
/// Log files are created as: logs/info.2024-12-22.log, logs/error.2024-12-22.log, etc.
fn init_tracing(log_dir: &str, console: BoxMakeWriter) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");
    let debug_file = tracing_appender::rolling::daily(log_dir, "debug.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(console)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();

    Ok(())
}

async fn serve() -> std::io::Result<()> {
    let config = ServerConfig::from_env().map_err(std::io::Error::other)?;
    init_tracing(&config.log_dir, BoxMakeWriter::new(std::io::stdout))?;

    info!("Starting validation-runner job host");
    info!("Configuration loaded successfully:");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Upload directory: {}", config.upload_dir.display());
    info!("  - Report directory: {}", config.report_dir.display());
    info!("  - Max concurrent runs: {}", config.max_concurrent_runs);
    info!("  - Number of workers: {}", config.num_workers);

    std::fs::create_dir_all(&config.upload_dir)?;
    std::fs::create_dir_all(&config.report_dir)?;

    let engine = Arc::new(CommandEngine::new(
        config.report_command.clone(),
        config.report_timeout,
    ));
    if !engine.is_configured() {
        error!("REPORT_COMMAND is not set; every run will fail until it is configured");
    }

    let registry = RunRegistry::new();
    let (dispatcher, queue) = run_queue(config.max_concurrent_runs * 4);

    // watch channel allows multiple receivers to get the same value
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let worker_handles = spawn_workers(
        config.num_workers,
        config.max_concurrent_runs,
        registry.clone(),
        engine.clone(),
        queue,
        shutdown_rx,
    );

    let service = web::Data::new(ValidationService::new(
        registry,
        dispatcher,
        &config,
        engine.is_configured(),
    ));
    let max_payload_size = config.max_payload_size;

    let server = HttpServer::new(move || {
        App::new().configure(app_config(service.clone(), max_payload_size))
    });

    info!("Server starting on http://{}", config.bind_addr);

    let server = server.bind(config.bind_addr.as_str())?.run();
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator =
        ShutdownCoordinator::new(server_handle, server_task, worker_handles, shutdown_tx);

    coordinator.wait_for_shutdown().await
}

async fn submit(args: cli::SubmitArgs) -> std::io::Result<()> {
    let config = ClientConfig::from_env().map_err(std::io::Error::other)?;
    let config = args.client_config(config);
    init_tracing(&config.log_dir, BoxMakeWriter::new(std::io::stderr))?;

    match cli::submit(&args, &config).await {
        Ok(run) => {
            info!("Run {} completed with {} table results", run.run_id, run.results.len());
            Ok(())
        }
        Err(ClientError::Cancelled) => {
            eprintln!("Polling cancelled");
            std::process::exit(130);
        }
        Err(e) => {
            error!("Submission failed: {}", e);
            std::process::exit(1);
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve().await,
        Commands::Submit(args) => submit(args).await,
    }
}
