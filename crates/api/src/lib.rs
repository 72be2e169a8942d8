//! Transceiver Bridge API Server
//!
//! HTTP control surface for the serial transceiver bridge: clients post
//! control requests to `/data` and get the current status record back.

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rig_bridge::{
    command_queue, CommandTranslator, LinkMonitor, SerialDriver, SharedStatus, StatusRecord,
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::timeout::RequestBodyTimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod routes;
mod settings;

pub use settings::{BridgeConfig, CliArgs, ConfigError};

/// Application state shared across handlers
pub struct AppState {
    /// Translator feeding the record and the command queue
    pub translator: CommandTranslator,
    /// Live device link state
    pub link: LinkMonitor,
    /// Prometheus exporter, if a recorder was installed
    pub metrics: Option<PrometheusHandle>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(translator: CommandTranslator, link: LinkMonitor) -> Self {
        Self {
            translator,
            link,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    /// Attach a Prometheus exporter handle
    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    /// Shared status record
    pub fn status(&self) -> &SharedStatus {
        self.translator.status()
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, config: &BridgeConfig) -> Router {
    Router::new()
        .route(
            "/data",
            get(routes::data::exchange).post(routes::data::exchange),
        )
        .route("/api/v1/health", get(routes::health::get_health))
        .route("/metrics", get(routes::metrics::render))
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(RequestBodyTimeoutLayer::new(config.body_read_timeout()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(config: &BridgeConfig) {
    let level = config.log_level.parse().unwrap_or(Level::INFO);
    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true);

    let result = if config.log_json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.expect("Failed to set tracing subscriber");
}

/// Install the global Prometheus recorder
fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            None
        }
    }
}

/// Run the bridge until Ctrl-C
pub async fn run_server(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let metrics = install_metrics();

    let status = SharedStatus::new(StatusRecord::new());
    let (commands, receiver) = command_queue(config.queue_capacity);
    let driver = SerialDriver::new(config.serial());
    let (link, driver_handle) = driver.open_or_degrade(receiver, status.clone());

    let translator = CommandTranslator::new(status, commands);
    let state = Arc::new(AppState::new(translator, link).with_metrics(metrics));
    let app = create_router(state, &config);

    let addr = config.listen_addr();
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = driver_handle {
        handle.shutdown().await;
    }
    info!("Bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
