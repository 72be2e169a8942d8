//! Protocol Error Types

use thiserror::Error;

/// Errors raised while framing device output or encoding commands
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// No delimiter arrived before the receive buffer reached its limit
    #[error("Receive buffer holds {len} bytes without a delimiter (limit {limit})")]
    BufferOverflow { len: usize, limit: usize },

    /// Frequency cannot be expressed in the fixed-width command field
    #[error("Frequency {0} cannot be encoded")]
    InvalidFrequency(f64),
}
