//! Shared Status Record
//!
//! One record per process, written by the serial read pipeline (`Message`)
//! and by the command translator (frequencies and update time), read by every
//! HTTP response. The whole record sits behind a single lock so a reader
//! never sees a half-applied update.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Message shown until the device reports anything
pub const DEFAULT_MESSAGE: &str = "-----";
/// VFO A frequency reported before the first tune request
pub const DEFAULT_FREQUENCY_A: f64 = 199.0;
/// VFO B frequency reported before the first tune request
pub const DEFAULT_FREQUENCY_B: f64 = 221.0;

/// Snapshot of the device state exposed over HTTP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusRecord {
    /// Last line reported by the device
    pub message: String,
    pub frequency_a: f64,
    pub frequency_b: f64,
    /// Unix time (seconds) of the last command sent to the device
    pub last_update_time: i64,
}

impl StatusRecord {
    /// Startup defaults, stamped with the current time
    pub fn new() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            frequency_a: DEFAULT_FREQUENCY_A,
            frequency_b: DEFAULT_FREQUENCY_B,
            last_update_time: chrono::Utc::now().timestamp(),
        }
    }
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable handle to the process-wide status record
#[derive(Debug, Clone, Default)]
pub struct SharedStatus {
    inner: Arc<RwLock<StatusRecord>>,
}

impl SharedStatus {
    /// Wrap an initial record
    pub fn new(record: StatusRecord) -> Self {
        Self {
            inner: Arc::new(RwLock::new(record)),
        }
    }

    /// Consistent copy of the whole record
    pub async fn snapshot(&self) -> StatusRecord {
        self.inner.read().await.clone()
    }

    /// Store the latest device line
    pub async fn set_message(&self, message: String) {
        self.inner.write().await.message = message;
    }

    /// Apply several field changes under one lock acquisition
    pub async fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut StatusRecord),
    {
        let mut record = self.inner.write().await;
        apply(&mut record);
    }
}
