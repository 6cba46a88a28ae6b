use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{truncate_body, ProviderError};
use crate::config::AppConfig;

const UNSPLASH_SEARCH_URL: &str = "https://api.unsplash.com/search/photos";
const PEXELS_SEARCH_URL: &str = "https://api.pexels.com/v1/search";
const PIXABAY_SEARCH_URL: &str = "https://pixabay.com/api/";

/// One normalized search result, independent of the provider that produced
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSearchHit {
    pub id: String,
    pub url: Option<String>,
    pub thumb: Option<String>,
    pub source: &'static str,
    pub author: Option<String>,
    pub download_url: Option<String>,
}

/// Run a query against the named provider. The source label is
/// case-insensitive; an unknown label fails without touching the network.
pub fn search_images(
    config: &AppConfig,
    source: &str,
    query: &str,
    max_results: u32,
) -> Result<Vec<ImageSearchHit>, ProviderError> {
    match source.trim().to_ascii_lowercase().as_str() {
        "unsplash" => search_unsplash(config, query, max_results),
        "pexels" => search_pexels(config, query, max_results),
        "pixabay" => search_pixabay(config, query, max_results),
        other => Err(ProviderError::UnsupportedSource(other.to_string())),
    }
}

fn http_client(config: &AppConfig, provider: &'static str) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|error| ProviderError::Http {
            provider,
            message: format!("http client init failed: {error}"),
        })
}

#[derive(Debug, Deserialize)]
struct UnsplashSearchResponse {
    #[serde(default)]
    results: Vec<UnsplashPhoto>,
}

#[derive(Debug, Deserialize)]
struct UnsplashPhoto {
    id: Option<String>,
    #[serde(default)]
    urls: UnsplashUrls,
    user: Option<UnsplashUser>,
}

#[derive(Debug, Default, Deserialize)]
struct UnsplashUrls {
    small: Option<String>,
    thumb: Option<String>,
    raw: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnsplashUser {
    name: Option<String>,
}

fn search_unsplash(
    config: &AppConfig,
    query: &str,
    max_results: u32,
) -> Result<Vec<ImageSearchHit>, ProviderError> {
    let key = config.api.unsplash_access_key.trim();
    if key.is_empty() {
        return Err(ProviderError::MissingCredentials("Unsplash API key"));
    }

    let client = http_client(config, "unsplash")?;
    let response = client
        .get(UNSPLASH_SEARCH_URL)
        .header("Authorization", format!("Client-ID {key}"))
        .query(&[
            ("query", query),
            ("per_page", max_results.to_string().as_str()),
        ])
        .send()
        .map_err(|error| ProviderError::Http {
            provider: "unsplash",
            message: error.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Status {
            provider: "unsplash",
            status: status.as_u16(),
            body: truncate_body(body.as_str()),
        });
    }

    let payload: UnsplashSearchResponse =
        response.json().map_err(|error| ProviderError::UnexpectedPayload {
            provider: "unsplash",
            message: error.to_string(),
        })?;
    Ok(payload
        .results
        .into_iter()
        .map(|item| ImageSearchHit {
            id: item.id.unwrap_or_default(),
            url: item.urls.small,
            thumb: item.urls.thumb,
            source: "unsplash",
            author: item.user.and_then(|user| user.name),
            download_url: item.urls.raw,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct PexelsSearchResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    id: Option<u64>,
    #[serde(default)]
    src: PexelsSources,
    photographer: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PexelsSources {
    medium: Option<String>,
    tiny: Option<String>,
    original: Option<String>,
}

fn search_pexels(
    config: &AppConfig,
    query: &str,
    max_results: u32,
) -> Result<Vec<ImageSearchHit>, ProviderError> {
    let key = config.api.pexels_api_key.trim();
    if key.is_empty() {
        return Err(ProviderError::MissingCredentials("Pexels API key"));
    }

    let client = http_client(config, "pexels")?;
    let response = client
        .get(PEXELS_SEARCH_URL)
        .header("Authorization", key)
        .query(&[
            ("query", query),
            ("per_page", max_results.to_string().as_str()),
        ])
        .send()
        .map_err(|error| ProviderError::Http {
            provider: "pexels",
            message: error.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Status {
            provider: "pexels",
            status: status.as_u16(),
            body: truncate_body(body.as_str()),
        });
    }

    let payload: PexelsSearchResponse =
        response.json().map_err(|error| ProviderError::UnexpectedPayload {
            provider: "pexels",
            message: error.to_string(),
        })?;
    Ok(payload
        .photos
        .into_iter()
        .map(|item| ImageSearchHit {
            id: item.id.map(|id| id.to_string()).unwrap_or_default(),
            url: item.src.medium,
            thumb: item.src.tiny,
            source: "pexels",
            author: item.photographer,
            download_url: item.src.original,
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct PixabaySearchResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Debug, Deserialize)]
struct PixabayHit {
    id: Option<u64>,
    #[serde(rename = "webformatURL")]
    webformat_url: Option<String>,
    #[serde(rename = "previewURL")]
    preview_url: Option<String>,
    user: Option<String>,
    #[serde(rename = "largeImageURL")]
    large_image_url: Option<String>,
}

fn search_pixabay(
    config: &AppConfig,
    query: &str,
    max_results: u32,
) -> Result<Vec<ImageSearchHit>, ProviderError> {
    let key = config.api.pixabay_api_key.trim();
    if key.is_empty() {
        return Err(ProviderError::MissingCredentials("Pixabay API key"));
    }

    let client = http_client(config, "pixabay")?;
    let response = client
        .get(PIXABAY_SEARCH_URL)
        .query(&[
            ("key", key),
            ("q", query),
            ("per_page", max_results.to_string().as_str()),
            ("image_type", "photo"),
        ])
        .send()
        .map_err(|error| ProviderError::Http {
            provider: "pixabay",
            message: error.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Status {
            provider: "pixabay",
            status: status.as_u16(),
            body: truncate_body(body.as_str()),
        });
    }

    let payload: PixabaySearchResponse =
        response.json().map_err(|error| ProviderError::UnexpectedPayload {
            provider: "pixabay",
            message: error.to_string(),
        })?;
    Ok(payload
        .hits
        .into_iter()
        .map(|item| ImageSearchHit {
            id: item.id.map(|id| id.to_string()).unwrap_or_default(),
            url: item.webformat_url,
            thumb: item.preview_url,
            source: "pixabay",
            author: item.user,
            download_url: item.large_image_url,
        })
        .collect())
}
