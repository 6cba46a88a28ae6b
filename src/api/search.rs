use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use super::response::{internal_failure, tool_success, validation_failure, ToolJson};
use super::server::AppState;
use crate::providers::search::{search_images, ImageSearchHit};

#[derive(Debug, Clone, Deserialize)]
pub struct SearchImagesRequest {
    pub query: String,
    #[serde(default = "default_source")]
    pub source: String,
    /// Accepted as a number or a numeric string, matching loose tool
    /// callers.
    #[serde(default)]
    pub max_results: Option<Value>,
}

fn default_source() -> String {
    String::from("unsplash")
}

#[derive(Debug, Clone, Serialize)]
struct SearchImagesResponse {
    success: bool,
    results: Vec<ImageSearchHit>,
}

pub async fn search_images_handler(
    State(state): State<AppState>,
    Json(payload): Json<SearchImagesRequest>,
) -> ToolJson {
    let requested = match parse_max_results(payload.max_results.as_ref()) {
        Ok(value) => value,
        Err(message) => return validation_failure(message),
    };
    let max_results = requested
        .unwrap_or(10)
        .clamp(1, state.config.image.max_results.max(1));

    let invocation = Uuid::new_v4();
    info!(
        tool = "search_images",
        %invocation,
        source = %payload.source,
        max_results,
        "dispatching tool call"
    );

    let config = state.config.clone();
    let result = tokio::task::spawn_blocking(move || {
        search_images(
            config.as_ref(),
            payload.source.as_str(),
            payload.query.as_str(),
            max_results,
        )
    })
    .await;

    match result {
        Ok(Ok(results)) => tool_success(SearchImagesResponse {
            success: true,
            results,
        }),
        Ok(Err(error)) => super::response::ToolError::from(error).into_response(),
        Err(join_error) => internal_failure(format!("search task failed: {join_error}")),
    }
}

fn parse_max_results(value: Option<&Value>) -> Result<Option<u32>, String> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) => Ok(Some(v.min(u64::from(u32::MAX)) as u32)),
        None => Err(String::from("max_results must be a valid number")),
    }
}
