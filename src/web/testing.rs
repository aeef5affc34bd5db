use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::{
    config::ClientConfig,
    intake::IntakeLimits,
    web::{AppState, router::build_router},
};

pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{addr}")
}

pub fn app_state(backend_url: impl Into<String>) -> AppState {
    AppState::new(ClientConfig {
        backend_base_url: backend_url.into(),
        port: 0,
        notion_auth_url: None,
        intake: IntakeLimits {
            max_bytes: 64 * 1024,
            ..IntakeLimits::default()
        },
        monitor: Default::default(),
        workspace_idle: Duration::from_secs(60),
    })
    .expect("state")
}

/// The full application on a loopback port.
pub async fn client_app(backend_url: impl Into<String>) -> (String, AppState) {
    let state = app_state(backend_url);
    let url = serve(build_router(state.clone())).await;
    (url, state)
}
