//! Command Translator
//!
//! Maps one control request onto a status record mutation plus the command
//! that makes the device follow it. Unknown actions are accepted and do
//! nothing.

use crate::error::BridgeError;
use crate::queue::CommandSender;
use crate::status::SharedStatus;
use rig_protocol::{Action, Command, ProtocolError, Vfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Body of a `/data` request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ControlRequest {
    pub frequency_a: f64,
    pub frequency_b: f64,
    pub action: String,
}

/// Effect of a recognized action
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Frequency to store in the status record, if any
    pub frequency: Option<(Vfo, f64)>,
    /// Command for the device
    pub command: Command,
}

impl Translation {
    /// Translate a request; `Ok(None)` for unrecognized actions
    pub fn from_request(request: &ControlRequest) -> Result<Option<Self>, ProtocolError> {
        let translation = match Action::parse(&request.action) {
            Action::SetFrequency(vfo) => {
                let value = match vfo {
                    Vfo::A => request.frequency_a,
                    Vfo::B => request.frequency_b,
                };
                Self {
                    frequency: Some((vfo, value)),
                    command: Command::frequency(vfo, value)?,
                }
            }
            Action::Control(code) => Self {
                frequency: None,
                command: Command::control(code),
            },
            Action::QueryFrequencyA => Self {
                frequency: None,
                command: Command::query_frequency(Vfo::A),
            },
            Action::Unrecognized => return Ok(None),
        };
        Ok(Some(translation))
    }
}

/// What happened to a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Unrecognized action, nothing changed
    Ignored,
    /// Record updated and command queued for the device
    Queued(Command),
    /// Record updated but the serial link is down
    Undelivered(Command),
}

/// Applies control requests to the status record and the command queue
#[derive(Debug, Clone)]
pub struct CommandTranslator {
    status: SharedStatus,
    commands: CommandSender,
}

impl CommandTranslator {
    /// Create a translator writing to the given record and queue
    pub fn new(status: SharedStatus, commands: CommandSender) -> Self {
        Self { status, commands }
    }

    /// Handle one request
    ///
    /// The record is updated before the command is queued, and the lock is
    /// released before waiting on a full queue.
    pub async fn handle(&self, request: &ControlRequest) -> Result<Outcome, BridgeError> {
        let Some(Translation { frequency, command }) = Translation::from_request(request)? else {
            debug!("Ignoring unrecognized action {:?}", request.action);
            return Ok(Outcome::Ignored);
        };

        info!("Request: {:?}", request);
        let now = chrono::Utc::now().timestamp();
        self.status
            .update(|record| {
                match frequency {
                    Some((Vfo::A, value)) => record.frequency_a = value,
                    Some((Vfo::B, value)) => record.frequency_b = value,
                    None => {}
                }
                record.last_update_time = now;
            })
            .await;

        info!("TX buffer = {:?}", command.as_str());
        match self.commands.enqueue(command.clone()).await {
            Ok(()) => Ok(Outcome::Queued(command)),
            Err(BridgeError::QueueClosed) => {
                debug!("Serial link down, {:?} not sent", command.as_str());
                Ok(Outcome::Undelivered(command))
            }
            Err(e) => Err(e),
        }
    }

    /// Status record this translator writes to
    pub fn status(&self) -> &SharedStatus {
        &self.status
    }

    /// Queue this translator feeds
    pub fn commands(&self) -> &CommandSender {
        &self.commands
    }
}
