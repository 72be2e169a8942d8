//! Control Head Commands
//!
//! Commands are plain ASCII strings. Frequency and query commands end with
//! `;`, control codes are sent exactly as the client supplied them.

use crate::encoding::{COMMAND_TERMINATOR, FREQUENCY_DIGITS, FREQUENCY_MULTIPLIER};
use crate::error::ProtocolError;
use std::fmt;

/// Tunable VFO of the transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vfo {
    A,
    B,
}

impl Vfo {
    /// Command prefix addressing this VFO
    pub fn prefix(&self) -> &'static str {
        match self {
            Vfo::A => "FA",
            Vfo::B => "FB",
        }
    }
}

/// Fixed control codes forwarded verbatim to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlCode {
    /// Receiver mode 0
    Fr0,
    /// Receiver mode 1
    Fr1,
    /// Switch 09
    Sw09,
    /// Switch 10
    Sw10,
    /// Switch 26
    Sw26,
}

impl ControlCode {
    /// Every known control code
    pub const ALL: [ControlCode; 5] = [
        ControlCode::Fr0,
        ControlCode::Fr1,
        ControlCode::Sw09,
        ControlCode::Sw10,
        ControlCode::Sw26,
    ];

    /// Wire form of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlCode::Fr0 => "FR0",
            ControlCode::Fr1 => "FR1",
            ControlCode::Sw09 => "SW09",
            ControlCode::Sw10 => "SW10",
            ControlCode::Sw26 => "SW26",
        }
    }

    /// Look up a code by its wire form
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == code)
    }
}

/// Action requested by an HTTP client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `VFA` / `VFB`: tune a VFO
    SetFrequency(Vfo),
    /// One of the fixed control codes
    Control(ControlCode),
    /// `FA?`: ask the device to report VFO A
    QueryFrequencyA,
    /// Anything else; accepted and ignored
    Unrecognized,
}

impl Action {
    /// Classify an action code. Unknown codes are not an error.
    pub fn parse(code: &str) -> Self {
        match code {
            "VFA" => Action::SetFrequency(Vfo::A),
            "VFB" => Action::SetFrequency(Vfo::B),
            "FA?" => Action::QueryFrequencyA,
            other => ControlCode::from_code(other)
                .map(Action::Control)
                .unwrap_or(Action::Unrecognized),
        }
    }
}

impl From<&str> for Action {
    fn from(code: &str) -> Self {
        Action::parse(code)
    }
}

/// ASCII command queued for the device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(String);

impl Command {
    /// Encode a frequency for the given VFO
    ///
    /// The value is scaled by [`FREQUENCY_MULTIPLIER`], rounded to the
    /// nearest integer and zero-padded to [`FREQUENCY_DIGITS`] digits.
    pub fn frequency(vfo: Vfo, value: f64) -> Result<Self, ProtocolError> {
        let scaled = (value * FREQUENCY_MULTIPLIER).round();
        let limit = 10f64.powi(FREQUENCY_DIGITS as i32);
        if !scaled.is_finite() || scaled < 0.0 || scaled >= limit {
            return Err(ProtocolError::InvalidFrequency(value));
        }

        Ok(Self(format!(
            "{}{:0width$}{}",
            vfo.prefix(),
            scaled as u64,
            COMMAND_TERMINATOR,
            width = FREQUENCY_DIGITS
        )))
    }

    /// Forward a control code
    pub fn control(code: ControlCode) -> Self {
        Self(code.as_str().to_string())
    }

    /// Ask the device to report a VFO frequency
    pub fn query_frequency(vfo: Vfo) -> Self {
        Self(format!("{}{}", vfo.prefix(), COMMAND_TERMINATOR))
    }

    /// Command text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Bytes written to the serial line
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
