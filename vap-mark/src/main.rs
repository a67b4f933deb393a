//! vap-mark - attendance marking microservice
//!
//! Receives face captures, asks the external recognizer who is in the frame
//! and records attendance against the active session.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};
use vap_common::config::{
    default_config_path, load_toml_config, prepare_root_folder, resolve_root_folder, TomlConfig,
};
use vap_mark::services::HttpRecognizer;
use vap_mark::store::{MemoryRepository, Repository, SqliteRepository};
use vap_mark::{AppState, ServiceOptions, MODULE_NAME};

#[derive(Debug, Parser)]
#[command(name = "vap-mark", version, about = "Attendance marking service")]
struct Args {
    /// TOML bootstrap config file
    #[arg(long, env = "VAP_CONFIG")]
    config: Option<PathBuf>,

    /// Folder holding the database
    #[arg(long, env = "VAP_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[arg(long, env = "VAP_PORT")]
    port: Option<u16>,

    /// Base URL of the face recognizer
    #[arg(long, env = "FACE_SERVICE_URL")]
    recognizer_url: Option<String>,

    /// Keep all state in memory; nothing survives a restart
    #[arg(long)]
    in_memory: bool,
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

fn log_directive(level: &str) -> String {
    format!("vap_mark={level},vap_common={level},tower_http={level}")
}

fn subscriber(filter: EnvFilter) -> (impl tracing::Subscriber + Send + Sync, FilterHandle) {
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer());
    (subscriber, handle)
}

/// Install logging before the config is read
///
/// Returns a handle for swapping in the configured level, or `None` when
/// `RUST_LOG` is set and takes precedence.
fn init_tracing() -> Option<FilterHandle> {
    let from_env = EnvFilter::try_from_default_env().ok();
    let follow_config = from_env.is_none();
    let filter = from_env.unwrap_or_else(|| EnvFilter::new(log_directive("info")));

    let (subscriber, handle) = subscriber(filter);
    subscriber.init();
    follow_config.then_some(handle)
}

fn apply_config_level(handle: Option<FilterHandle>, config: &TomlConfig) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(e) = handle.reload(EnvFilter::new(log_directive(&config.logging.level))) {
        warn!("Failed to apply log level {}: {}", config.logging.level, e);
    }
}

fn load_config(args: &Args) -> Result<TomlConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| default_config_path(MODULE_NAME));

    let mut config = match path {
        Some(path) => load_toml_config(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => TomlConfig::default(),
    };

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = &args.recognizer_url {
        config.recognizer.url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn open_repository(args: &Args, config: &TomlConfig) -> Result<Arc<dyn Repository>> {
    if args.in_memory {
        warn!("Running with in-memory storage; data is lost on shutdown");
        return Ok(Arc::new(MemoryRepository::new()));
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), config);
    let db_path = prepare_root_folder(&root_folder)
        .with_context(|| format!("Failed to initialize root folder {}", root_folder.display()))?;
    info!("Database: {}", db_path.display());

    let pool = vap_common::db::init_database(&db_path).await?;
    info!("Database connection established");
    Ok(Arc::new(SqliteRepository::new(pool)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_handle = init_tracing();
    let config = load_config(&args)?;
    apply_config_level(log_handle, &config);

    info!("Starting {} (attendance marking) microservice", MODULE_NAME);
    info!(
        "Version: {} ({}, {} build, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let repo = open_repository(&args, &config).await?;

    let timeout = Duration::from_millis(config.recognizer.timeout_ms);
    let recognizer = HttpRecognizer::new(&config.recognizer.url, timeout)
        .map_err(|e| anyhow::anyhow!("Failed to create recognizer client: {}", e))?;
    info!("Face recognizer expected at {}", recognizer.base_url());

    let state = AppState::new(
        repo,
        Arc::new(recognizer),
        ServiceOptions {
            recognizer_timeout: timeout,
            default_threshold: config.recognizer.default_threshold,
        },
    );
    let app = vap_mark::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("{} stopped", MODULE_NAME);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_directive_covers_config_loading() {
        let directive = log_directive("debug");
        assert!(directive.contains("vap_common=debug"));
        assert!(directive.contains("vap_mark=debug"));
    }

    #[test]
    fn test_config_level_replaces_bootstrap_level() {
        let (subscriber, handle) = subscriber(EnvFilter::new(log_directive("info")));
        tracing::subscriber::with_default(subscriber, || {
            assert!(tracing::enabled!(target: "vap_common::config", Level::INFO));
            assert!(!tracing::enabled!(target: "vap_mark", Level::DEBUG));

            let config = TomlConfig {
                logging: vap_common::config::LoggingConfig {
                    level: "debug".to_string(),
                },
                ..TomlConfig::default()
            };
            apply_config_level(Some(handle), &config);

            assert!(tracing::enabled!(target: "vap_mark", Level::DEBUG));
        });
    }
}
