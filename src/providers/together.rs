use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;

use super::{truncate_body, ProviderError};
use crate::config::AppConfig;

const GENERATION_URL: &str = "https://api.together.xyz/v1/images/generations";
const GENERATION_MODEL: &str = "black-forest-labs/FLUX.1-dev";

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GenerationItem>,
}

#[derive(Debug, Deserialize)]
struct GenerationItem {
    #[serde(default)]
    b64_json: Option<String>,
}

/// Generate one image and return its base64 payload.
pub fn generate_image(
    config: &AppConfig,
    prompt: &str,
    width: u32,
    height: u32,
) -> Result<String, ProviderError> {
    let key = config.api.together_api_key.trim();
    if key.is_empty() {
        return Err(ProviderError::MissingCredentials("Together AI API key"));
    }

    let client = Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|error| ProviderError::Http {
            provider: "together",
            message: format!("http client init failed: {error}"),
        })?;

    let response = client
        .post(GENERATION_URL)
        .bearer_auth(key)
        .json(&json!({
            "model": GENERATION_MODEL,
            "prompt": prompt,
            "n": 1,
            "width": width,
            "height": height,
            "response_format": "b64_json",
        }))
        .send()
        .map_err(|error| ProviderError::Http {
            provider: "together",
            message: error.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Status {
            provider: "together",
            status: status.as_u16(),
            body: truncate_body(body.as_str()),
        });
    }

    let payload: GenerationResponse =
        response.json().map_err(|error| ProviderError::UnexpectedPayload {
            provider: "together",
            message: error.to_string(),
        })?;
    payload
        .data
        .into_iter()
        .next()
        .and_then(|item| item.b64_json)
        .filter(|b64| !b64.is_empty())
        .ok_or(ProviderError::UnexpectedPayload {
            provider: "together",
            message: String::from("no image data at data[0].b64_json"),
        })
}
