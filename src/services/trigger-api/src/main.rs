//! # Trigger API Main Binary
//!
//! Entry point for the ingestion tier: loads configuration, wires the
//! Postgres trigger store, the token cipher, and the Kafka publisher,
//! then serves HTTP until SIGINT/SIGTERM.

use std::env;
use std::process;
use std::sync::Arc;

use clap::{Arg, Command};
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trigger_api_service::{
    config::Config,
    crypto::TokenCipher,
    error::ApiError,
    kafka::KafkaEventPublisher,
    metrics::ApiMetrics,
    server::{self, AppState},
    storage::PostgresTriggerStore,
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
    info!("Run topic: {}", config.kafka.topic);

    if let Err(e) = run_server(config).await {
        error!("Server failed: {}", e);
        process::exit(1);
    }

    info!("Server stopped gracefully");
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
        .about("Trigger ingestion API for the Zapflow platform")
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

fn load_configuration() -> Result<Config, ApiError> {
    let config = Config::from_env()?;
    config.validate()?;
    Ok(config)
}

async fn run_server(config: Config) -> Result<(), ApiError> {
    let metrics = Arc::new(ApiMetrics::new()?);
    let store = Arc::new(PostgresTriggerStore::connect(&config.storage).await?);
    let cipher = Arc::new(TokenCipher::from_base64_key(&config.crypto.encryption_key)?);
    let publisher = Arc::new(KafkaEventPublisher::new(config.kafka.clone()));

    let state = AppState {
        store,
        publisher,
        cipher,
        config: Arc::new(config),
        metrics,
    };

    server::serve(state).await
}
