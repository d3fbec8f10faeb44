//! # Zap Worker Main Binary
//!
//! Entry point for the worker tier: loads configuration, wires the
//! Postgres run store, the action registry, the executor, and the Kafka
//! consumer loop, then runs until SIGINT/SIGTERM.

use std::env;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Arg, Command};
use dotenvy::dotenv;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zap_worker_service::{
    actions::ActionRegistry,
    config::Config,
    consumer::{MessageProcessor, WorkerConsumer},
    error::WorkerError,
    executor::RunExecutor,
    metrics::{self, WorkerMetrics},
    storage::PostgresRunStore,
    SERVICE_NAME, VERSION,
};

#[tokio::main]
async fn main() {
    init_logging();

    if let Err(e) = dotenv() {
        warn!("Failed to load .env file: {}", e);
    }

    let matches = create_cli().get_matches();

    if matches.get_flag("validate-config") {
        match load_configuration() {
            Ok(_) => {
                info!("Configuration is valid");
                process::exit(0);
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                process::exit(1);
            }
        }
    }

    info!("Starting {} version {}", SERVICE_NAME, VERSION);

    let config = match load_configuration() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    info!("Environment: {}", config.environment.name);
    info!("Consumer group: {}", config.kafka.consumer_group_id);
    info!("Topic: {}", config.kafka.topic);

    if let Err(e) = run_worker(config).await {
        error!("Worker failed: {}", e);
        process::exit(1);
    }

    info!("Worker stopped gracefully");
}

/// Initialize structured logging
fn init_logging() {
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let log_format = env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::registry();

    match log_format.as_str() {
        "json" => {
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(false)
                        .with_span_list(true),
                )
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
                )
                .init();
        }
        _ => {
            subscriber
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true),
                )
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
                )
                .init();
        }
    }
}

/// Create CLI interface
fn create_cli() -> Command {
    Command::new(SERVICE_NAME)
        .version(VERSION)
        .about("Run execution worker for the Zapflow platform")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("validate-config")
                .long("validate-config")
                .help("Validate configuration and exit")
                .action(clap::ArgAction::SetTrue),
        )
}

fn load_configuration() -> Result<Config, WorkerError> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

async fn run_worker(config: Config) -> Result<(), WorkerError> {
    let metrics = Arc::new(WorkerMetrics::new()?);
    let store = Arc::new(PostgresRunStore::connect(&config.storage).await?);
    let registry = Arc::new(ActionRegistry::builtin(&config)?);
    info!("Registered action kinds: {:?}", registry.kinds());

    let executor = Arc::new(RunExecutor::new(
        store,
        registry,
        Duration::from_secs(config.worker.action_timeout_seconds),
    ));

    let processor = MessageProcessor::new(
        executor,
        config.worker.malformed_message_policy,
        metrics.clone(),
    );
    let consumer = WorkerConsumer::new(&config, processor)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let metrics_config = config.metrics.clone();
    let metrics_handle = tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics, &metrics_config).await {
            error!("Metrics listener failed: {}", e);
        }
    });

    let consumer_handle = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    setup_signal_handling().await;
    info!("Initiating graceful shutdown");
    let _ = shutdown_tx.send(());
    metrics_handle.abort();

    match consumer_handle.await {
        Ok(result) => result,
        Err(e) => {
            error!("Consumer task panicked: {}", e);
            Err(WorkerError::internal("Consumer task panicked"))
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn setup_signal_handling() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Received Ctrl+C signal");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
        info!("Received SIGTERM signal");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
