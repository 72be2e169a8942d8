//! Bridge Error Types

use rig_protocol::ProtocolError;
use thiserror::Error;

/// Errors that can occur on the bridge between HTTP and the serial line
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Serial port could not be opened
    #[error("Failed to open serial port {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: tokio_serial::Error,
    },

    /// Nothing drains the outbound queue any more
    #[error("Outbound command queue is closed")]
    QueueClosed,

    /// Framing or encoding error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
