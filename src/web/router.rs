use axum::{
    Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, auth, landing, receipts, status};

pub fn build_router(state: AppState) -> Router {
    let max_image_bytes = state.config().intake.max_bytes;

    Router::new()
        .route("/", get(landing::landing_page))
        .route("/logout", post(auth::logout))
        .route("/healthz", get(healthz))
        .route("/api/backend/status", get(status::backend_status))
        .route("/api/backend/probe", post(status::retry_probe))
        .merge(receipts::router(max_image_bytes))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}
