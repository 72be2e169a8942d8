//! Transceiver Control Protocol
//!
//! This crate provides the wire-level pieces of the serial link to a
//! transceiver control head: reassembly of delimited status lines from the
//! raw byte stream, and encoding of the ASCII commands sent back to it.

mod command;
mod error;
mod framer;

pub use command::{Action, Command, ControlCode, Vfo};
pub use error::ProtocolError;
pub use framer::{Framed, LineFramer, DEFAULT_MAX_BUFFER, DEVICE_DELIMITER};

/// Frequency command encoding constants
pub mod encoding {
    /// Multiplier applied to a frequency before it is written as an integer
    pub const FREQUENCY_MULTIPLIER: f64 = 10_000.0;
    /// Number of zero-padded digits in a frequency command
    pub const FREQUENCY_DIGITS: usize = 12;
    /// Terminator appended to frequency and query commands
    pub const COMMAND_TERMINATOR: char = ';';
}
