use std::path::PathBuf;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;

use pictor::api::server::build_router;
use pictor::config::AppConfig;

fn test_config() -> (Arc<AppConfig>, PathBuf) {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time should be monotonic")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("pictor_endpoints_{stamp}"));
    std::fs::create_dir_all(root.as_path()).expect("temp root should exist");
    let mut config = AppConfig::default();
    config.install_root = root.clone();
    config.output.base_folder = root.join("out").display().to_string();
    (Arc::new(config), root)
}

fn test_config_with_volcengine_credentials() -> (Arc<AppConfig>, PathBuf) {
    let (config, root) = test_config();
    let mut config = Arc::unwrap_or_clone(config);
    config.api.volcengine.access_key_id = String::from("AKTEST123");
    config.api.volcengine.secret_access_key = String::from("SKTEST123");
    (Arc::new(config), root)
}

async fn send_json(
    app: axum::Router,
    method: Method,
    uri: &str,
    body: Body,
    expected_status: StatusCode,
) -> Value {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .expect("request should build");
    let response = app.oneshot(request).await.expect("request should run");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let payload: Value = serde_json::from_slice(bytes.as_ref()).unwrap_or(Value::Null);
    assert_eq!(status, expected_status, "unexpected status, body: {payload}");
    payload
}

#[tokio::test]
async fn health_reports_service_identity_and_tools() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(app, Method::GET, "/health", Body::empty(), StatusCode::OK).await;
    assert_eq!(payload["success"], json!(true));
    assert_eq!(payload["service"], json!("pictor"));
    assert_eq!(
        payload["tools"],
        json!(["search_images", "download_image", "generate_icon", "style_transfer"])
    );

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn search_rejects_unknown_sources_without_network() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/search_images",
        Body::from(r#"{"query":"cats","source":"bing"}"#),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(payload["success"], json!(false));
    assert_eq!(payload["error_kind"], json!("validation"));
    assert!(payload["error"]
        .as_str()
        .expect("error should be a string")
        .contains("unsupported image source 'bing'"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn search_requires_the_provider_key() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/search_images",
        Body::from(r#"{"query":"cats","source":"unsplash"}"#),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(payload["success"], json!(false));
    assert!(payload["error"]
        .as_str()
        .expect("error should be a string")
        .contains("Unsplash API key"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn search_rejects_non_numeric_max_results() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/search_images",
        Body::from(r#"{"query":"cats","max_results":"plenty"}"#),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(
        payload["error"],
        json!("max_results must be a valid number")
    );

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn download_rejects_extensions_outside_the_allow_list() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/download_image",
        Body::from(r#"{"url":"https://example.com/a.bmp","file_name":"a.bmp"}"#),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(payload["success"], json!(false));
    assert_eq!(payload["error_kind"], json!("validation"));
    assert!(payload["error"]
        .as_str()
        .expect("error should be a string")
        .contains("unsupported file extension"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn download_rejects_non_http_schemes() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/download_image",
        Body::from(r#"{"url":"ftp://example.com/a.png","file_name":"a.png"}"#),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert!(payload["error"]
        .as_str()
        .expect("error should be a string")
        .contains("unsupported url scheme"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn generate_icon_requires_the_together_key() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/generate_icon",
        Body::from(r#"{"prompt":"a red fox icon","file_name":"fox"}"#),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(payload["success"], json!(false));
    assert!(payload["error"]
        .as_str()
        .expect("error should be a string")
        .contains("Together AI API key"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn style_transfer_requires_vendor_credentials() {
    let (config, root) = test_config();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/style_transfer",
        Body::from(
            r#"{"input_image_path":"/tmp/in.png","style_name":"anime","file_name":"out.png"}"#,
        ),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert!(payload["error"]
        .as_str()
        .expect("error should be a string")
        .contains("Volcengine"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn style_transfer_validates_the_input_before_anything_else() {
    let (config, root) = test_config_with_volcengine_credentials();
    let app = build_router(config);

    let payload = send_json(
        app,
        Method::POST,
        "/tools/style_transfer",
        Body::from(
            r#"{"input_image_path":"/definitely/not/here.png","style_name":"bogus","file_name":"out.png"}"#,
        ),
        StatusCode::BAD_REQUEST,
    )
    .await;
    assert_eq!(payload["error_kind"], json!("validation"));
    assert!(payload["error"]
        .as_str()
        .expect("error should be a string")
        .contains("does not exist"));

    let _ = std::fs::remove_dir_all(root);
}

#[tokio::test]
async fn style_transfer_rejects_unknown_styles_with_the_catalog() {
    let (config, root) = test_config_with_volcengine_credentials();
    let input_path = root.join("in.png");
    image::RgbImage::from_pixel(64, 64, image::Rgb([42, 42, 42]))
        .save(input_path.as_path())
        .expect("input image should be written");
    let app = build_router(config);

    let body = json!({
        "input_image_path": input_path.display().to_string(),
        "style_name": "vaporwave",
        "file_name": "out.png",
    });
    let payload = send_json(
        app,
        Method::POST,
        "/tools/style_transfer",
        Body::from(body.to_string()),
        StatusCode::BAD_REQUEST,
    )
    .await;
    let error = payload["error"]
        .as_str()
        .expect("error should be a string");
    assert!(error.contains("unknown style 'vaporwave'"));
    assert!(error.contains("anime"));
    assert!(error.contains("watercolor"));

    let _ = std::fs::remove_dir_all(root);
}
