//! Control Data Route

use axum::{body::Bytes, extract::State, Json};
use rig_bridge::{metric, ControlRequest, Outcome, StatusRecord};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::AppState;

/// Apply a control request, then return the current status record
///
/// A body that does not decode is logged and otherwise ignored, so pollers
/// can send an empty body to just read the record.
pub async fn exchange(State(state): State<Arc<AppState>>, body: Bytes) -> Json<StatusRecord> {
    metrics::counter!(metric::HTTP_REQUESTS).increment(1);

    if body.is_empty() {
        debug!("Status poll without request body");
    } else {
        match serde_json::from_slice::<ControlRequest>(&body) {
            Ok(request) => match state.translator.handle(&request).await {
                Ok(Outcome::Ignored) => {}
                Ok(Outcome::Queued(command)) => debug!("Queued {:?}", command.as_str()),
                Ok(Outcome::Undelivered(command)) => {
                    debug!("No device link, {:?} dropped", command.as_str())
                }
                Err(e) => warn!("Request {:?} not applied: {}", request, e),
            },
            Err(e) => warn!("Could not decode request body: {}", e),
        }
    }

    Json(state.status().snapshot().await)
}
