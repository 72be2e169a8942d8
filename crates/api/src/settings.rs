//! Bridge Settings
//!
//! Settings are layered: built-in defaults, then an optional config file
//! (`rigctl.toml` or `--config`), then `RIGCTL_*` environment variables,
//! then command-line flags. They are fixed once the process has started.

use clap::Parser;
use config::{Config, Environment, File};
use rig_bridge::{SerialConfig, DEFAULT_QUEUE_CAPACITY};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration file looked up when `--config` is not given
const DEFAULT_CONFIG_NAME: &str = "rigctl";

/// Environment variable prefix
const ENV_PREFIX: &str = "RIGCTL";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Command-line flags
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "rigctl-bridge", version, about = "HTTP bridge to a serial transceiver control head")]
pub struct CliArgs {
    /// Serial port name (/dev/ttyACM0, COM3)
    #[arg(long, alias = "serialName")]
    pub serial_name: Option<String>,

    /// Serial port speed
    #[arg(long, alias = "serialSpeed")]
    pub serial_speed: Option<u32>,

    /// Port on which to run the HTTP server
    #[arg(long)]
    pub port: Option<u16>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Serial device path
    pub serial_name: String,
    /// Serial baud rate
    pub serial_speed: u32,
    /// HTTP listen port
    pub port: u16,
    /// Directory served for paths other than the API
    pub static_dir: PathBuf,
    /// Commands that may wait for the serial write loop
    pub queue_capacity: usize,
    /// Bytes requested per serial read
    pub read_buffer_size: usize,
    /// Unframed bytes tolerated before the read loop gives up
    pub max_frame_bytes: usize,
    /// Time allowed to receive a request body (milliseconds)
    pub body_read_timeout_ms: u64,
    /// Maximum log level
    pub log_level: String,
    /// Emit logs as JSON
    pub log_json: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let serial = SerialConfig::default();
        Self {
            serial_name: serial.device,
            serial_speed: serial.baud_rate,
            port: 8080,
            static_dir: PathBuf::from("www/static"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_buffer_size: serial.read_buffer_size,
            max_frame_bytes: serial.max_frame_bytes,
            body_read_timeout_ms: 1000,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from all layers
    pub fn load(args: &CliArgs) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let config: BridgeConfig = Config::builder()
            .add_source(Config::try_from(&BridgeConfig::default())?)
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("serial_name", args.serial_name.clone())?
            .set_override_option("serial_speed", args.serial_speed.map(i64::from))?
            .set_override_option("port", args.port.map(i64::from))?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serial_name.is_empty() {
            return Err(ConfigError::Invalid("serial_name is empty".to_string()));
        }
        if self.serial_speed == 0 {
            return Err(ConfigError::Invalid("serial_speed must be positive".to_string()));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be positive".to_string()));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid("read_buffer_size must be positive".to_string()));
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "unknown log_level {:?}",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Serial link settings
    pub fn serial(&self) -> SerialConfig {
        SerialConfig {
            device: self.serial_name.clone(),
            baud_rate: self.serial_speed,
            read_buffer_size: self.read_buffer_size,
            max_frame_bytes: self.max_frame_bytes,
        }
    }

    /// HTTP listen address on all interfaces
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Request body read timeout
    pub fn body_read_timeout(&self) -> Duration {
        Duration::from_millis(self.body_read_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial_name, "/dev/ttyACM0");
        assert_eq!(config.serial_speed, 115_200);
        assert_eq!(config.port, 8080);
        assert_eq!(config.queue_capacity, 10_000);
        assert_eq!(config.body_read_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = CliArgs {
            serial_name: Some("/dev/ttyUSB1".to_string()),
            serial_speed: Some(38_400),
            port: Some(9090),
            config: None,
        };
        let config = BridgeConfig::load(&args).unwrap();
        assert_eq!(config.serial_name, "/dev/ttyUSB1");
        assert_eq!(config.serial_speed, 38_400);
        assert_eq!(config.listen_addr().port(), 9090);

        let serial = config.serial();
        assert_eq!(serial.device, "/dev/ttyUSB1");
        assert_eq!(serial.baud_rate, 38_400);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let args = CliArgs {
            config: Some(PathBuf::from("/nonexistent/rigctl.toml")),
            ..CliArgs::default()
        };
        assert!(matches!(BridgeConfig::load(&args), Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_config_file_layer() {
        let dir = std::env::temp_dir().join(format!("rigctl-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("rigctl.toml");
        std::fs::write(&path, "serial_name = \"COM3\"\nqueue_capacity = 16\nport = 7000\n").unwrap();

        let args = CliArgs {
            port: Some(7001),
            config: Some(path),
            ..CliArgs::default()
        };
        let config = BridgeConfig::load(&args).unwrap();
        assert_eq!(config.serial_name, "COM3");
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.port, 7001);
        assert_eq!(config.serial_speed, 115_200);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = BridgeConfig {
            queue_capacity: 0,
            ..BridgeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_cli_parsing() {
        let args = CliArgs::parse_from([
            "rigctl-bridge",
            "--serial-name",
            "/dev/ttyS0",
            "--serial-speed",
            "9600",
            "--port",
            "8000",
        ]);
        assert_eq!(args.serial_name.as_deref(), Some("/dev/ttyS0"));
        assert_eq!(args.serial_speed, Some(9600));
        assert_eq!(args.port, Some(8000));
    }
}
