use axum::{Json, extract::State};

use crate::{availability::MonitorSnapshot, web::AppState};

pub async fn backend_status(State(state): State<AppState>) -> Json<MonitorSnapshot> {
    Json(state.monitor().snapshot())
}

/// Restart probing after a timeout. A no-op while probing or once awake.
pub async fn retry_probe(State(state): State<AppState>) -> Json<MonitorSnapshot> {
    state.monitor().start().await;
    Json(state.monitor().snapshot())
}
