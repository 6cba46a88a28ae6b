use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::output::OutputError;
use crate::providers::ProviderError;

pub type ToolJson = (StatusCode, Json<Value>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Provider,
    Infra,
}

/// Everything a tool body can fail with, bucketed for the envelope and the
/// HTTP status.
#[derive(Debug)]
pub enum ToolError {
    /// Bad arguments or configuration the caller can fix.
    Validation(String),
    /// An upstream endpoint outside the provider adapters failed.
    Upstream(String),
    Provider(ProviderError),
    Output(OutputError),
    Internal(String),
}

impl From<ProviderError> for ToolError {
    fn from(error: ProviderError) -> Self {
        Self::Provider(error)
    }
}

impl From<OutputError> for ToolError {
    fn from(error: OutputError) -> Self {
        Self::Output(error)
    }
}

impl ToolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Upstream(_) => ErrorKind::Provider,
            Self::Provider(error) => {
                if error.is_configuration() {
                    ErrorKind::Validation
                } else {
                    ErrorKind::Provider
                }
            }
            Self::Output(OutputError::InvalidExtension { .. })
            | Self::Output(OutputError::TooManyCollisions { .. }) => ErrorKind::Validation,
            Self::Output(OutputError::Decode(_)) => ErrorKind::Provider,
            Self::Output(OutputError::Io(_)) => ErrorKind::Infra,
            Self::Internal(_) => ErrorKind::Infra,
        }
    }

    /// The unsanitized detail. The HTTP layer hides this for infra errors;
    /// the CLI prints it as-is.
    pub fn message(&self) -> String {
        match self {
            Self::Validation(message) | Self::Upstream(message) | Self::Internal(message) => {
                message.clone()
            }
            Self::Provider(error) => error.to_string(),
            Self::Output(error) => error.to_string(),
        }
    }

    pub fn into_response(self) -> ToolJson {
        let kind = self.kind();
        match kind {
            ErrorKind::Validation => failure(StatusCode::BAD_REQUEST, kind, self.message()),
            ErrorKind::Provider => failure(StatusCode::BAD_GATEWAY, kind, self.message()),
            ErrorKind::Infra => internal_failure(self.message()),
        }
    }
}

pub fn tool_success(payload: impl Serialize) -> ToolJson {
    (
        StatusCode::OK,
        Json(serde_json::to_value(payload).expect("tool payload should serialize")),
    )
}

pub fn validation_failure(message: impl Into<String>) -> ToolJson {
    failure(StatusCode::BAD_REQUEST, ErrorKind::Validation, message)
}

pub fn internal_failure(detail: impl Into<String>) -> ToolJson {
    let detail = detail.into();
    error!(detail = %detail, "internal tool error");
    failure(
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Infra,
        "Internal server error",
    )
}

fn failure(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> ToolJson {
    (
        status,
        Json(json!({
            "success": false,
            "error": message.into(),
            "error_kind": kind,
        })),
    )
}
