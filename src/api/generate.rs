use std::fs;

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::download::SavedFileResponse;
use super::response::{internal_failure, tool_success, ToolError, ToolJson};
use super::server::AppState;
use crate::config::AppConfig;
use crate::output::pathing::allocate_save_path;
use crate::output::save::save_base64_image;
use crate::output::{OutputError, OutputFormat};
use crate::providers::together;

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateIconRequest {
    pub prompt: String,
    pub file_name: String,
    #[serde(default)]
    pub save_folder: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

pub async fn generate_icon_handler(
    State(state): State<AppState>,
    Json(payload): Json<GenerateIconRequest>,
) -> ToolJson {
    let invocation = Uuid::new_v4();
    info!(tool = "generate_icon", %invocation, "dispatching tool call");

    let config = state.config.clone();
    let result =
        tokio::task::spawn_blocking(move || run_generate_icon(config.as_ref(), &payload)).await;

    match result {
        Ok(Ok(response)) => tool_success(response),
        Ok(Err(error)) => error.into_response(),
        Err(join_error) => internal_failure(format!("generate task failed: {join_error}")),
    }
}

pub fn run_generate_icon(
    config: &AppConfig,
    payload: &GenerateIconRequest,
) -> Result<SavedFileResponse, ToolError> {
    if payload.prompt.trim().is_empty() {
        return Err(ToolError::Validation(String::from(
            "generate_icon requires a non-empty prompt",
        )));
    }

    let save_path = allocate_save_path(
        config,
        payload.file_name.as_str(),
        payload.save_folder.as_deref(),
    )?;
    let width = payload.width.unwrap_or(config.image.default_width);
    let height = payload.height.unwrap_or(config.image.default_height);

    let image_base64 = together::generate_image(config, payload.prompt.trim(), width, height)?;

    // Svg is a legal allocation target for downloads but not a raster
    // encode target; the provider payload is written verbatim in that case.
    let (file_path, file_name) = match format_for(save_path.file_name.as_str()) {
        Some(format) => {
            let saved = save_base64_image(
                image_base64.as_str(),
                save_path.file_name.as_str(),
                save_path.directory.as_path(),
                format,
                None,
                &config.watermark_defaults(),
            )?;
            let file_name = saved
                .file_path
                .file_name()
                .and_then(|v| v.to_str())
                .unwrap_or(save_path.file_name.as_str())
                .to_string();
            (saved.file_path, file_name)
        }
        None => {
            let bytes = BASE64_STANDARD
                .decode(image_base64.as_bytes())
                .map_err(|error| {
                    ToolError::Output(OutputError::Decode(format!(
                        "invalid base64 payload: {error}"
                    )))
                })?;
            fs::write(save_path.absolute_path.as_path(), bytes.as_slice())
                .map_err(|error| ToolError::Output(OutputError::Io(error)))?;
            (save_path.absolute_path.clone(), save_path.file_name.clone())
        }
    };

    Ok(SavedFileResponse {
        success: true,
        message: format!(
            "Icon '{}' generated and saved to: {}",
            file_name,
            save_path.directory.display()
        ),
        file_path: file_path.display().to_string(),
        file_name,
    })
}

fn format_for(file_name: &str) -> Option<OutputFormat> {
    file_name
        .rsplit('.')
        .next()
        .and_then(OutputFormat::parse)
}
