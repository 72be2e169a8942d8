//! Health Route

use axum::{extract::State, Json};
use rig_bridge::LinkState;
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: String,
    pub uptime_seconds: u64,
    pub link: LinkHealth,
    pub queue: QueueHealth,
}

/// Serial link health
#[derive(Debug, Serialize)]
pub struct LinkHealth {
    pub state: &'static str,
    pub device: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Outbound queue depth
#[derive(Debug, Serialize)]
pub struct QueueHealth {
    pub pending: usize,
    pub capacity: usize,
}

/// Health check handler
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let commands = state.translator.commands();
    let link = match state.link.state() {
        LinkState::Connected { device } if commands.is_closed() => LinkState::Lost {
            device,
            reason: "command queue closed".to_string(),
        },
        link => link,
    };

    let (status, link) = match link {
        LinkState::Connected { device } => (
            "healthy",
            LinkHealth {
                state: "connected",
                device,
                reason: None,
            },
        ),
        LinkState::Degraded { device, reason } => (
            "degraded",
            LinkHealth {
                state: "degraded",
                device,
                reason: Some(reason),
            },
        ),
        LinkState::Lost { device, reason } => (
            "degraded",
            LinkHealth {
                state: "lost",
                device,
                reason: Some(reason),
            },
        ),
    };

    Json(HealthResponse {
        status,
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        link,
        queue: QueueHealth {
            pending: commands.pending(),
            capacity: commands.capacity(),
        },
    })
}
