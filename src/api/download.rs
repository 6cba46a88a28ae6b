use std::fs;

use axum::extract::State;
use axum::Json;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;
use uuid::Uuid;

use super::response::{internal_failure, tool_success, ToolError, ToolJson};
use super::server::AppState;
use crate::config::AppConfig;
use crate::output::pathing::allocate_save_path;
use crate::output::OutputError;

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadImageRequest {
    pub url: String,
    pub file_name: String,
    #[serde(default)]
    pub save_folder: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedFileResponse {
    pub success: bool,
    pub message: String,
    pub file_path: String,
    pub file_name: String,
}

pub async fn download_image_handler(
    State(state): State<AppState>,
    Json(payload): Json<DownloadImageRequest>,
) -> ToolJson {
    let invocation = Uuid::new_v4();
    info!(tool = "download_image", %invocation, url = %payload.url, "dispatching tool call");

    let config = state.config.clone();
    let result =
        tokio::task::spawn_blocking(move || run_download_image(config.as_ref(), &payload)).await;

    match result {
        Ok(Ok(response)) => tool_success(response),
        Ok(Err(error)) => error.into_response(),
        Err(join_error) => internal_failure(format!("download task failed: {join_error}")),
    }
}

/// Allocate the destination, fetch the URL, and write the body. Allocation
/// and URL checks run before any network traffic.
pub fn run_download_image(
    config: &AppConfig,
    payload: &DownloadImageRequest,
) -> Result<SavedFileResponse, ToolError> {
    let url = Url::parse(payload.url.as_str())
        .map_err(|error| ToolError::Validation(format!("invalid url '{}': {error}", payload.url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ToolError::Validation(format!(
            "unsupported url scheme '{}'. Only http and https are allowed",
            url.scheme()
        )));
    }

    let save_path = allocate_save_path(
        config,
        payload.file_name.as_str(),
        payload.save_folder.as_deref(),
    )?;

    let client = Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|error| ToolError::Internal(format!("http client init failed: {error}")))?;
    let response = client
        .get(url)
        .send()
        .map_err(|error| ToolError::Upstream(format!("download request failed: {error}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(ToolError::Upstream(format!(
            "download failed with status {}: {}",
            status.as_u16(),
            payload.url
        )));
    }
    let bytes = response
        .bytes()
        .map_err(|error| ToolError::Upstream(format!("download body read failed: {error}")))?;

    fs::write(save_path.absolute_path.as_path(), bytes.as_ref())
        .map_err(|error| ToolError::Output(OutputError::Io(error)))?;

    Ok(SavedFileResponse {
        success: true,
        message: format!(
            "Image '{}' saved to: {}",
            save_path.file_name,
            save_path.directory.display()
        ),
        file_path: save_path.absolute_path.display().to_string(),
        file_name: save_path.file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(tag: &str) -> AppConfig {
        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        let root = std::env::temp_dir().join(format!("pictor_download_{tag}_{stamp}"));
        fs::create_dir_all(root.as_path()).expect("temp root should exist");
        let mut config = AppConfig::default();
        config.install_root = root.clone();
        config.output.base_folder = root.join("out").display().to_string();
        config
    }

    #[test]
    fn rejects_unparseable_urls_before_allocation() {
        let config = temp_config("badurl");
        let err = run_download_image(
            &config,
            &DownloadImageRequest {
                url: String::from("not a url"),
                file_name: String::from("a.png"),
                save_folder: None,
            },
        )
        .expect_err("bad url should fail");
        assert!(matches!(err, ToolError::Validation(_)));
        let _ = fs::remove_dir_all(config.install_root);
    }

    #[test]
    fn rejects_non_http_schemes() {
        let config = temp_config("scheme");
        let err = run_download_image(
            &config,
            &DownloadImageRequest {
                url: String::from("ftp://example.com/a.png"),
                file_name: String::from("a.png"),
                save_folder: None,
            },
        )
        .expect_err("ftp should fail");
        assert!(err.message().contains("url scheme"));
        let _ = fs::remove_dir_all(config.install_root);
    }

    #[test]
    fn rejects_disallowed_extensions_before_any_request() {
        let config = temp_config("ext");
        let err = run_download_image(
            &config,
            &DownloadImageRequest {
                url: String::from("https://example.com/a.bmp"),
                file_name: String::from("a.bmp"),
                save_folder: None,
            },
        )
        .expect_err("bmp should fail");
        assert!(matches!(
            err,
            ToolError::Output(OutputError::InvalidExtension { .. })
        ));
        let _ = fs::remove_dir_all(config.install_root);
    }
}
