//! HTTP surface probed by the liveness subsystem (axum).
//!
//! - `GET /ping`: plain `pong`
//! - `GET /health`: 200 when the state store answers, 503 otherwise
//! - `GET /wake-up`: always 200, any request is enough to wake a sleeping host
//! - `GET /status`: liveness status as JSON

use std::net::SocketAddr;

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use telefeed_core::{control::ControlPlane, liveness::LivenessMonitor};

#[derive(Clone)]
pub struct AppState {
    pub control: ControlPlane,
    /// `None` when the liveness subsystem is disabled.
    pub liveness: Option<LivenessMonitor>,
    pub server_url: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
        .route("/wake-up", get(wake_up))
        .route("/status", get(status))
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` is cancelled.
pub async fn serve(addr: SocketAddr, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind http server to {addr}"))?;

    tracing::info!(%addr, "http server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("http server error")?;

    tracing::info!("http server stopped");
    Ok(())
}

async fn ping() -> &'static str {
    "pong"
}

async fn health(State(state): State<AppState>) -> Response {
    if state.control.store_healthy().await {
        (StatusCode::OK, Json(json!({ "status": "healthy" }))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy" })),
        )
            .into_response()
    }
}

async fn wake_up() -> Response {
    tracing::info!("wake-up request received");
    (StatusCode::OK, Json(json!({ "status": "awake" }))).into_response()
}

async fn status(State(state): State<AppState>) -> Response {
    match &state.liveness {
        Some(monitor) => Json(monitor.status()).into_response(),
        None => Json(json!({
            "active": false,
            "server_url": state.server_url,
            "last_ping": null,
        }))
        .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{body::Body, http::Request};
    use tower::ServiceExt;

    use telefeed_core::{
        liveness::{HttpProbe, LivenessConfig},
        store::{StateStore, StoreConfig},
    };

    async fn state(liveness: Option<LivenessMonitor>) -> AppState {
        let store = StateStore::connect(StoreConfig::new("sqlite::memory:"))
            .await
            .expect("Failed to connect");
        store.migrate().await.expect("Failed to migrate");
        AppState {
            control: ControlPlane::new(store, None),
            liveness,
            server_url: "http://localhost:10000".to_string(),
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn ping_returns_pong() {
        let (status, body) = get(router(state(None).await), "/ping").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "pong");
    }

    #[tokio::test]
    async fn health_reflects_store_reachability() {
        let st = state(None).await;
        let (status, body) = get(router(st.clone()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("healthy"));

        st.control.store().close().await;
        let (status, body) = get(router(st), "/health").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains("unhealthy"));
    }

    #[tokio::test]
    async fn wake_up_always_answers() {
        let (status, body) = get(router(state(None).await), "/wake-up").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("awake"));
    }

    #[tokio::test]
    async fn status_without_liveness_is_inactive() {
        let (status, body) = get(router(state(None).await), "/status").await;
        assert_eq!(status, StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["active"], false);
        assert_eq!(v["server_url"], "http://localhost:10000");
        assert!(v["last_ping"].is_null());
    }

    #[tokio::test]
    async fn status_reports_monitor_url() {
        let monitor = LivenessMonitor::new(
            LivenessConfig::new("https://telefeed.example.com"),
            Arc::new(HttpProbe::new().unwrap()),
            None,
            CancellationToken::new(),
        );
        let (_, body) = get(router(state(Some(monitor)).await), "/status").await;
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["server_url"], "https://telefeed.example.com");
        assert_eq!(v["active"], false);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _) = get(router(state(None).await), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
