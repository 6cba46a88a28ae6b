use std::collections::BTreeMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{truncate_body, ProviderError};
use crate::config::{AppConfig, StyleParams, VOLCENGINE_AK_PLACEHOLDER, VOLCENGINE_SK_PLACEHOLDER};

const STYLIZE_HOST: &str = "visual.volcengineapi.com";
const STYLIZE_SERVICE: &str = "cv";
const STYLIZE_ACTION: &str = "AIGCStylizeImage";
const STYLIZE_VERSION: &str = "2024-06-06";
const SUCCESS_CODE: i64 = 10000;

type HmacSha256 = Hmac<Sha256>;

/// Normalized result of one stylize call: the output image payload plus the
/// vendor's correlation id when it supplied one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylizeOutcome {
    pub image_base64: String,
    pub request_id: Option<String>,
}

/// Credential presence check, run before any validation or upload work so a
/// misconfigured deployment fails fast with a clear message.
pub fn require_credentials(config: &AppConfig) -> Result<(), ProviderError> {
    let volc = &config.api.volcengine;
    if volc.access_key_id.trim().is_empty() || volc.access_key_id == VOLCENGINE_AK_PLACEHOLDER {
        return Err(ProviderError::MissingCredentials("Volcengine access key id"));
    }
    if volc.secret_access_key.trim().is_empty()
        || volc.secret_access_key == VOLCENGINE_SK_PLACEHOLDER
    {
        return Err(ProviderError::MissingCredentials(
            "Volcengine secret access key",
        ));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StylizeRequestBody<'a> {
    req_key: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub_req_key: Option<&'a str>,
    binary_data_base64: [&'a str; 1],
}

/// Send one image through the vendor's stylize endpoint and normalize the
/// response.
pub fn stylize_image(
    config: &AppConfig,
    style: &StyleParams,
    image_base64: &str,
) -> Result<StylizeOutcome, ProviderError> {
    require_credentials(config)?;
    let volc = &config.api.volcengine;

    let body = serde_json::to_vec(&StylizeRequestBody {
        req_key: style.req_key.as_str(),
        sub_req_key: style.sub_req_key.as_deref(),
        binary_data_base64: [image_base64],
    })
    .map_err(|error| ProviderError::UnexpectedPayload {
        provider: "volcengine",
        message: format!("request body encode failed: {error}"),
    })?;

    let now = Utc::now();
    let datetime = now.format("%Y%m%dT%H%M%SZ").to_string();
    let date = now.format("%Y%m%d").to_string();
    let query = format!("Action={STYLIZE_ACTION}&Version={STYLIZE_VERSION}");

    let mut headers = BTreeMap::new();
    headers.insert(String::from("content-type"), String::from("application/json"));
    headers.insert(String::from("host"), String::from(STYLIZE_HOST));
    headers.insert(String::from("x-content-sha256"), sha256_hex(body.as_slice()));
    headers.insert(String::from("x-date"), datetime.clone());

    let authorization = authorization_header(&SigningInput {
        method: "POST",
        path: "/",
        query: query.as_str(),
        headers: &headers,
        payload: body.as_slice(),
        access_key: volc.access_key_id.as_str(),
        secret_key: volc.secret_access_key.as_str(),
        region: volc.region.as_str(),
        service: STYLIZE_SERVICE,
        date: date.as_str(),
        datetime: datetime.as_str(),
    });

    let client = Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|error| ProviderError::Http {
            provider: "volcengine",
            message: format!("http client init failed: {error}"),
        })?;

    let mut request = client
        .post(format!("https://{STYLIZE_HOST}/?{query}"))
        .header("Authorization", authorization)
        .body(body);
    for (name, value) in &headers {
        if name.as_str() != "host" {
            request = request.header(name.as_str(), value.as_str());
        }
    }

    let response = request.send().map_err(|error| ProviderError::Http {
        provider: "volcengine",
        message: error.to_string(),
    })?;

    let status = response.status();
    let text = response.text().unwrap_or_default();
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider: "volcengine",
            status: status.as_u16(),
            body: fault_message(text.as_str()).unwrap_or_else(|| truncate_body(text.as_str())),
        });
    }

    decode_stylize_response(text.as_str())
}

// Response schemas, tried in priority order. A body that fits none of them
// is an unexpected payload rather than a guessed-at success.

#[derive(Debug, Deserialize)]
struct StylizeSuccessEnvelope {
    code: i64,
    data: StylizeData,
}

#[derive(Debug, Deserialize)]
struct StylizeData {
    #[serde(default)]
    binary_data_base64: Vec<String>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AlgorithmErrorEnvelope {
    #[serde(rename = "result", alias = "Result")]
    result: AlgorithmResult,
}

#[derive(Debug, Deserialize)]
struct AlgorithmResult {
    algorithm_base_resp: AlgorithmBaseResp,
}

#[derive(Debug, Deserialize)]
struct AlgorithmBaseResp {
    #[serde(default)]
    status_code: i64,
    #[serde(default)]
    status_message: String,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CodeMessageEnvelope {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

fn decode_stylize_response(body: &str) -> Result<StylizeOutcome, ProviderError> {
    if let Ok(envelope) = serde_json::from_str::<StylizeSuccessEnvelope>(body) {
        if envelope.code == SUCCESS_CODE {
            if let Some(image_base64) = envelope
                .data
                .binary_data_base64
                .into_iter()
                .find(|entry| !entry.is_empty())
            {
                return Ok(StylizeOutcome {
                    image_base64,
                    request_id: envelope.data.request_id,
                });
            }
            return Err(ProviderError::UnexpectedPayload {
                provider: "volcengine",
                message: String::from(
                    "success code without image data at data.binary_data_base64",
                ),
            });
        }
    }

    if let Ok(envelope) = serde_json::from_str::<AlgorithmErrorEnvelope>(body) {
        let resp = envelope.result.algorithm_base_resp;
        if resp.status_code != 0 {
            return Err(ProviderError::Vendor {
                provider: "volcengine",
                message: format!(
                    "algorithm error: status_code={}, status_message='{}'",
                    resp.status_code, resp.status_message
                ),
                request_id: resp.request_id,
            });
        }
    }

    if let Ok(envelope) = serde_json::from_str::<CodeMessageEnvelope>(body) {
        if envelope.code != SUCCESS_CODE {
            return Err(ProviderError::Vendor {
                provider: "volcengine",
                message: format!(
                    "business error: code={}, message='{}'",
                    envelope.code, envelope.message
                ),
                request_id: envelope.request_id,
            });
        }
    }

    Err(ProviderError::UnexpectedPayload {
        provider: "volcengine",
        message: format!("unrecognized response shape: {}", truncate_body(body)),
    })
}

#[derive(Debug, Deserialize)]
struct VendorFaultBody {
    #[serde(rename = "Error")]
    error: Option<VendorFaultDetail>,
    #[serde(rename = "ResponseMetadata")]
    metadata: Option<VendorFaultMetadata>,
}

#[derive(Debug, Deserialize)]
struct VendorFaultMetadata {
    #[serde(rename = "Error")]
    error: Option<VendorFaultDetail>,
}

#[derive(Debug, Deserialize)]
struct VendorFaultDetail {
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Pull the human-readable message out of a gateway fault body when one is
/// present.
fn fault_message(body: &str) -> Option<String> {
    let fault: VendorFaultBody = serde_json::from_str(body).ok()?;
    fault
        .error
        .and_then(|detail| detail.message)
        .or_else(|| {
            fault
                .metadata
                .and_then(|meta| meta.error)
                .and_then(|detail| detail.message)
        })
        .filter(|message| !message.is_empty())
}

// Request signing. The vendor uses the SigV4 shape with its own constants:
// the signing key chain starts from the bare secret and terminates in
// "request", and the algorithm label is plain HMAC-SHA256.

struct SigningInput<'a> {
    method: &'a str,
    path: &'a str,
    query: &'a str,
    headers: &'a BTreeMap<String, String>,
    payload: &'a [u8],
    access_key: &'a str,
    secret_key: &'a str,
    region: &'a str,
    service: &'a str,
    date: &'a str,
    datetime: &'a str,
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn canonical_request(input: &SigningInput) -> String {
    let canonical_headers = input
        .headers
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    let signed_headers = signed_header_names(input.headers);
    format!(
        "{}\n{}\n{}\n{}\n\n{}\n{}",
        input.method,
        input.path,
        input.query,
        canonical_headers,
        signed_headers,
        sha256_hex(input.payload)
    )
}

fn signed_header_names(headers: &BTreeMap<String, String>) -> String {
    headers.keys().cloned().collect::<Vec<_>>().join(";")
}

fn derive_signing_key(secret_key: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(secret_key.as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(k_date.as_slice(), region.as_bytes());
    let k_service = hmac_sha256(k_region.as_slice(), service.as_bytes());
    hmac_sha256(k_service.as_slice(), b"request")
}

fn authorization_header(input: &SigningInput) -> String {
    let scope = format!(
        "{}/{}/{}/request",
        input.date, input.region, input.service
    );
    let string_to_sign = format!(
        "HMAC-SHA256\n{}\n{}\n{}",
        input.datetime,
        scope,
        sha256_hex(canonical_request(input).as_bytes())
    );
    let signing_key =
        derive_signing_key(input.secret_key, input.date, input.region, input.service);
    let signature = hex::encode(hmac_sha256(
        signing_key.as_slice(),
        string_to_sign.as_bytes(),
    ));
    format!(
        "HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        input.access_key,
        scope,
        signed_header_names(input.headers),
        signature
    )
}
