use std::fs;
use std::path::{Path, PathBuf};

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::response::{internal_failure, tool_success, ToolError, ToolJson};
use super::server::AppState;
use crate::config::AppConfig;
use crate::output::pathing::allocate_save_path;
use crate::output::save::save_base64_image;
use crate::output::validate::validate_style_input;
use crate::output::watermark::{WatermarkAnchor, WatermarkSpec};
use crate::output::{OutputError, OutputFormat};
use crate::providers::volcengine;

#[derive(Debug, Clone, Deserialize)]
pub struct StyleTransferRequest {
    pub input_image_path: String,
    pub style_name: String,
    pub file_name: String,
    #[serde(default)]
    pub save_folder: Option<String>,
    #[serde(default)]
    pub watermark_text: Option<String>,
    #[serde(default)]
    pub watermark_anchor: Option<String>,
    #[serde(default)]
    pub watermark_opacity: Option<u8>,
    #[serde(default)]
    pub watermark_font_path: Option<String>,
    #[serde(default)]
    pub watermark_font_size: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StyleTransferResponse {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub file_name: String,
    pub style_applied: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

pub async fn style_transfer_handler(
    State(state): State<AppState>,
    Json(payload): Json<StyleTransferRequest>,
) -> ToolJson {
    let invocation = Uuid::new_v4();
    info!(
        tool = "style_transfer",
        %invocation,
        style = %payload.style_name,
        "dispatching tool call"
    );

    let config = state.config.clone();
    let result =
        tokio::task::spawn_blocking(move || run_style_transfer(config.as_ref(), &payload)).await;

    match result {
        Ok(Ok(response)) => tool_success(response),
        Ok(Err(error)) => error.into_response(),
        Err(join_error) => internal_failure(format!("style transfer task failed: {join_error}")),
    }
}

/// Credentials, input validation, and style lookup all run before the
/// upload; the vendor is only reached with a request that can succeed.
pub fn run_style_transfer(
    config: &AppConfig,
    payload: &StyleTransferRequest,
) -> Result<StyleTransferResponse, ToolError> {
    volcengine::require_credentials(config)?;

    let input = validate_style_input(Path::new(payload.input_image_path.as_str()))
        .map_err(ToolError::Validation)?;

    let style = config
        .style_params(payload.style_name.as_str())
        .ok_or_else(|| {
            ToolError::Validation(format!(
                "unknown style '{}'. Available styles: {}",
                payload.style_name,
                config.style_names().join(", ")
            ))
        })?
        .clone();

    let save_path = allocate_save_path(
        config,
        payload.file_name.as_str(),
        payload.save_folder.as_deref(),
    )?;

    let input_bytes = fs::read(input.path.as_path())
        .map_err(|error| ToolError::Output(OutputError::Io(error)))?;
    let encoded = BASE64_STANDARD.encode(input_bytes.as_slice());

    let outcome = volcengine::stylize_image(config, &style, encoded.as_str())?;

    // The output keeps the input's true encoding; an unsupported detection
    // falls back to png.
    let format =
        OutputFormat::parse(input.detected_format.as_str()).unwrap_or(OutputFormat::Png);
    let watermark = build_watermark(payload);

    let saved = save_base64_image(
        outcome.image_base64.as_str(),
        save_path.file_name.as_str(),
        save_path.directory.as_path(),
        format,
        watermark.as_ref(),
        &config.watermark_defaults(),
    )?;

    let file_name = saved
        .file_path
        .file_name()
        .and_then(|v| v.to_str())
        .unwrap_or(save_path.file_name.as_str())
        .to_string();
    Ok(StyleTransferResponse {
        success: true,
        message: format!(
            "Style '{}' applied. '{}' saved to: {}",
            payload.style_name,
            file_name,
            save_path.directory.display()
        ),
        file_path: saved.file_path.display().to_string(),
        file_name,
        style_applied: payload.style_name.clone(),
        request_id: outcome.request_id,
    })
}

fn build_watermark(payload: &StyleTransferRequest) -> Option<WatermarkSpec> {
    let text = payload
        .watermark_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())?;
    Some(WatermarkSpec {
        text: text.to_string(),
        font_path: payload.watermark_font_path.as_deref().map(PathBuf::from),
        font_size: payload.watermark_font_size.unwrap_or(0),
        anchor: WatermarkAnchor::parse(payload.watermark_anchor.as_deref().unwrap_or("")),
        opacity: payload.watermark_opacity.unwrap_or(128),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn temp_config(tag: &str) -> AppConfig {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("pictor_style_{tag}_{stamp}"));
        fs::create_dir_all(root.as_path()).expect("temp root should exist");
        let mut config = AppConfig::default();
        config.install_root = root.clone();
        config.output.base_folder = root.join("out").display().to_string();
        config
    }

    fn request(input: &str, style: &str) -> StyleTransferRequest {
        StyleTransferRequest {
            input_image_path: String::from(input),
            style_name: String::from(style),
            file_name: String::from("styled.png"),
            save_folder: None,
            watermark_text: None,
            watermark_anchor: None,
            watermark_opacity: None,
            watermark_font_path: None,
            watermark_font_size: None,
        }
    }

    #[test]
    fn placeholder_credentials_fail_before_validation() {
        let config = temp_config("creds");
        let err = run_style_transfer(&config, &request("/missing.png", "anime"))
            .expect_err("placeholder creds should fail");
        assert!(err.message().contains("Volcengine"));
        let _ = fs::remove_dir_all(config.install_root);
    }

    #[test]
    fn missing_input_fails_before_the_style_lookup() {
        let mut config = temp_config("input");
        config.api.volcengine.access_key_id = String::from("AK123");
        config.api.volcengine.secret_access_key = String::from("SK123");

        let err = run_style_transfer(&config, &request("/definitely/not/here.png", "bogus"))
            .expect_err("missing input should fail");
        assert!(err.message().contains("does not exist"));
        let _ = fs::remove_dir_all(config.install_root);
    }

    #[test]
    fn unknown_style_lists_the_catalog() {
        let mut config = temp_config("style");
        config.api.volcengine.access_key_id = String::from("AK123");
        config.api.volcengine.secret_access_key = String::from("SK123");
        let input = config.install_root.join("in.png");
        RgbImage::from_pixel(64, 64, Rgb([1, 2, 3]))
            .save(input.as_path())
            .expect("input image should be written");

        let err = run_style_transfer(
            &config,
            &request(input.display().to_string().as_str(), "vaporwave"),
        )
        .expect_err("unknown style should fail");
        let message = err.message();
        assert!(message.contains("unknown style 'vaporwave'"));
        assert!(message.contains("anime"));
        let _ = fs::remove_dir_all(config.install_root);
    }

    #[test]
    fn watermark_spec_defaults_follow_the_tool_contract() {
        let mut payload = request("/x.png", "anime");
        assert!(build_watermark(&payload).is_none());

        payload.watermark_text = Some(String::from("  "));
        assert!(build_watermark(&payload).is_none());

        payload.watermark_text = Some(String::from("pictor"));
        payload.watermark_anchor = Some(String::from("sideways"));
        let spec = build_watermark(&payload).expect("spec should build");
        assert_eq!(spec.anchor, WatermarkAnchor::BottomRight);
        assert_eq!(spec.opacity, 128);
        assert_eq!(spec.font_size, 0);
    }
}
