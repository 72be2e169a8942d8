//! Serial Bridge for Transceiver Control
//!
//! Connects HTTP-driven control requests to the serial link: commands flow
//! through a bounded queue into the write loop, device lines flow from the
//! read loop through the framer into the shared status record.

mod driver;
mod error;
mod queue;
mod status;
mod translator;

pub use driver::{DriverHandle, LinkMonitor, LinkState, SerialConfig, SerialDriver};
pub use error::BridgeError;
pub use queue::{command_queue, CommandReceiver, CommandSender, DEFAULT_QUEUE_CAPACITY};
pub use status::{SharedStatus, StatusRecord};
pub use translator::{CommandTranslator, ControlRequest, Outcome, Translation};

/// Metric names recorded by the bridge
pub mod metric {
    /// Commands accepted into the outbound queue
    pub const COMMANDS_QUEUED: &str = "rig_commands_queued_total";
    /// Commands written to the serial line
    pub const COMMANDS_WRITTEN: &str = "rig_commands_written_total";
    /// Failed serial writes
    pub const WRITE_ERRORS: &str = "rig_write_errors_total";
    /// Device lines framed from the serial line
    pub const LINES_RECEIVED: &str = "rig_lines_received_total";
    /// Requests served on `/data`
    pub const HTTP_REQUESTS: &str = "rig_http_requests_total";

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_metric_names() {
            let names = [
                COMMANDS_QUEUED,
                COMMANDS_WRITTEN,
                WRITE_ERRORS,
                LINES_RECEIVED,
                HTTP_REQUESTS,
            ];
            for (i, name) in names.iter().enumerate() {
                assert!(name.starts_with("rig_") && name.ends_with("_total"), "{}", name);
                assert!(!names[i + 1..].contains(name), "duplicate metric {}", name);
            }
        }
    }
}
