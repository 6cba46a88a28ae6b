use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;

pub const TOOL_NAMES: [&str; 4] = [
    "search_images",
    "download_image",
    "generate_icon",
    "style_transfer",
];

#[derive(Clone)]
pub struct AppState {
    pub service_name: &'static str,
    pub service_version: &'static str,
    pub started_unix_ms: u128,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            service_name: "pictor",
            service_version: env!("CARGO_PKG_VERSION"),
            started_unix_ms: now_unix_ms(),
            config,
        }
    }
}

pub fn build_router(config: Arc<AppConfig>) -> Router {
    let state = AppState::new(config);
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/tools/search_images",
            post(crate::api::search::search_images_handler),
        )
        .route(
            "/tools/download_image",
            post(crate::api::download::download_image_handler),
        )
        .route(
            "/tools/generate_icon",
            post(crate::api::generate::generate_icon_handler),
        )
        .route(
            "/tools/style_transfer",
            post(crate::api::style::style_transfer_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, config: Arc<AppConfig>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let app = build_router(config);
    info!(bind = %addr, "starting pictor tool surface");
    axum::serve(listener, app).await
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "status": "ok",
            "service": state.service_name,
            "version": state.service_version,
            "started_unix_ms": state.started_unix_ms,
            "tools": TOOL_NAMES,
        })),
    )
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_millis())
}
