//! Transceiver Bridge - Main Entry Point

use api::{init_logging, run_server, BridgeConfig, CliArgs};
use clap::Parser;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config = BridgeConfig::load(&args)?;
    init_logging(&config);

    info!("=== rigctl-bridge v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Serial port {} at {} baud, HTTP port {}",
        config.serial_name, config.serial_speed, config.port
    );

    run_server(config).await?;

    Ok(())
}
