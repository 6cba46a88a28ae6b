pub mod search;
pub mod together;
pub mod volcengine;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0} is not configured")]
    MissingCredentials(&'static str),
    #[error("unsupported image source '{0}'. Supported sources: unsplash, pexels, pixabay")]
    UnsupportedSource(String),
    #[error("{provider} request failed: {message}")]
    Http {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} API error: status {status} - {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{provider} returned an unexpected payload: {message}")]
    UnexpectedPayload {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} rejected the request: {message}")]
    Vendor {
        provider: &'static str,
        message: String,
        request_id: Option<String>,
    },
}

impl ProviderError {
    /// Configuration problems the caller should fix, as opposed to upstream
    /// failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentials(_) | Self::UnsupportedSource(_)
        )
    }
}

/// Keep upstream error bodies readable in envelopes and logs.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        return body.to_string();
    }
    body.chars().take(LIMIT).collect()
}
