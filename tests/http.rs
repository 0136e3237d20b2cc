//! HTTP route tests against the router, without binding a socket

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use tokio::sync::mpsc;
use tower::ServiceExt;

use camrelay::device::{DeviceConfig, DeviceConfigStore};
use camrelay::registry::{ClientHandle, ConnectionId, Outbound};
use camrelay::server::{router, AppState};
use camrelay::{DeliveryMode, ServerConfig};

struct TestApp {
    app: Router,
    state: AppState,
    _dir: tempfile::TempDir,
}

async fn test_app(mode: DeliveryMode) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::default()
        .config_path(dir.path().join("config.json"))
        .delivery_mode(mode)
        .max_upload_size(1024);

    let store = Arc::new(DeviceConfigStore::open(config.config_path.clone()).await);
    let state = AppState::new(&config, store);
    let app = router(state.clone(), config.max_upload_size);

    TestApp {
        app,
        state,
        _dir: dir,
    }
}

impl TestApp {
    async fn consumer(&self, id: u64) -> mpsc::Receiver<Outbound> {
        let (handle, rx) = ClientHandle::new(ConnectionId(id), None, 8);
        self.state.registry().register_consumer(handle).await;
        rx
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.unwrap()
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn upload_empty_body_is_bad_request() {
    let app = test_app(DeliveryMode::Inline).await;
    let mut rx = app.consumer(1).await;

    let response = app.send(post("/upload", "image/jpeg", Body::empty())).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(response).await, "no image received");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn upload_raw_body_is_broadcast() {
    let app = test_app(DeliveryMode::Inline).await;
    let mut rx = app.consumer(1).await;

    let response = app
        .send(post("/upload", "application/octet-stream", "frame"))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_text(response).await,
        "Image received and forwarded to consumers"
    );

    match rx.try_recv() {
        Ok(Outbound::Text(text)) => {
            let v: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            assert_eq!(v["type"], "image");
            assert_eq!(v["data"], "ZnJhbWU=");
        }
        other => panic!("expected image frame, got {:?}", other),
    }
}

#[tokio::test]
async fn upload_without_consumers_still_succeeds() {
    let app = test_app(DeliveryMode::Inline).await;

    let response = app.send(post("/upload", "image/jpeg", "frame")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.state.stats().snapshot().images_ingested, 1);
}

#[tokio::test]
async fn upload_multipart_file_field() {
    let app = test_app(DeliveryMode::Inline).await;
    let mut rx = app.consumer(1).await;

    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"note\"\r\n\r\n\
        ignored\r\n\
        --XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"image\"; filename=\"cam.jpg\"\r\n\
        Content-Type: image/jpeg\r\n\r\n\
        frame\r\n\
        --XBOUNDARY--\r\n";

    let response = app
        .send(post(
            "/upload",
            "multipart/form-data; boundary=XBOUNDARY",
            body,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(matches!(rx.try_recv(), Ok(Outbound::Text(_))));
}

#[tokio::test]
async fn upload_multipart_without_file_is_bad_request() {
    let app = test_app(DeliveryMode::Inline).await;

    let body = "--XBOUNDARY\r\n\
        Content-Disposition: form-data; name=\"note\"\r\n\r\n\
        hello\r\n\
        --XBOUNDARY--\r\n";

    let response = app
        .send(post(
            "/upload",
            "multipart/form-data; boundary=XBOUNDARY",
            body,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_over_limit_is_rejected() {
    let app = test_app(DeliveryMode::Inline).await;

    let response = app
        .send(post("/upload", "image/jpeg", vec![0u8; 4096]))
        .await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn get_config_returns_defaults() {
    let app = test_app(DeliveryMode::Inline).await;

    let response = app.send(get("/get-config")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let v: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(v["ssid"], "Mon_SSID_WiFi");
    assert_eq!(v["phoneNumber"], "+261000000000");
    assert_eq!(v["startHour"], 18);
    assert_eq!(v["endHour"], 6);
}

#[tokio::test]
async fn set_config_merges_and_persists() {
    let app = test_app(DeliveryMode::Inline).await;

    let response = app
        .send(post(
            "/set-config",
            "application/json",
            r#"{"ssid":"Garage","startHour":20}"#,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "Configuration updated");

    let current = app.state.device_config.get().await;
    assert_eq!(current.ssid, "Garage");
    assert_eq!(current.start_hour, 20);
    assert_eq!(current.password, DeviceConfig::default().password);

    let on_disk = std::fs::read_to_string(app.state.device_config.path()).unwrap();
    let on_disk: DeviceConfig = serde_json::from_str(&on_disk).unwrap();
    assert_eq!(on_disk, current);
}

#[tokio::test]
async fn set_config_out_of_range_hours_are_bad_request() {
    let app = test_app(DeliveryMode::Inline).await;

    for body in [r#"{"startHour":300}"#, r#"{"startHour":-1}"#, r#"{"endHour":24}"#] {
        let response = app.send(post("/set-config", "application/json", body)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {}", body);
        assert!(body_text(response).await.contains("between 0 and 23"));
    }

    let current = app.state.device_config.get().await;
    assert_eq!(current, DeviceConfig::default());
}

#[tokio::test]
async fn set_config_malformed_requests_are_bad_request() {
    let app = test_app(DeliveryMode::Inline).await;

    let wrong_type = app
        .send(post("/set-config", "application/json", r#"{"startHour":"19"}"#))
        .await;
    assert_eq!(wrong_type.status(), StatusCode::BAD_REQUEST);

    let not_json = app
        .send(post("/set-config", "text/plain", r#"{"ssid":"x"}"#))
        .await;
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);

    let broken = app
        .send(post("/set-config", "application/json", "{ssid"))
        .await;
    assert_eq!(broken.status(), StatusCode::BAD_REQUEST);

    assert_eq!(app.state.device_config.get().await.ssid, "Mon_SSID_WiFi");
}

#[tokio::test]
async fn set_config_persist_failure_keeps_previous() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServerConfig::default();
    let store = Arc::new(DeviceConfigStore::with_config(
        dir.path().join("missing").join("config.json"),
        DeviceConfig::default(),
    ));
    let state = AppState::new(&config, store);
    let app = router(state.clone(), config.max_upload_size);

    let response = app
        .oneshot(post("/set-config", "application/json", r#"{"ssid":"Lost"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "Failed to save configuration");
    assert_eq!(state.device_config.get().await.ssid, "Mon_SSID_WiFi");
}

#[tokio::test]
async fn latest_is_not_found_before_upload() {
    let app = test_app(DeliveryMode::Reference).await;

    let response = app.send(get("/latest")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reference_mode_serves_latest_frame() {
    let app = test_app(DeliveryMode::Reference).await;
    let mut rx = app.consumer(1).await;

    let response = app.send(post("/upload", "image/jpeg", "frame")).await;
    assert_eq!(response.status(), StatusCode::OK);

    match rx.try_recv() {
        Ok(Outbound::Text(text)) => {
            assert_eq!(text.as_str(), r#"{"type":"image","path":"/latest"}"#)
        }
        other => panic!("expected image frame, got {:?}", other),
    }

    let response = app.send(get("/latest")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/jpeg"
    );
    assert_eq!(body_text(response).await, "frame");
}

#[tokio::test]
async fn health_reports_registry_state() {
    let app = test_app(DeliveryMode::Inline).await;
    let _rx = app.consumer(1).await;

    let response = app.send(get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let v: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(v["status"], "ok");
    assert_eq!(v["producer_connected"], false);
    assert_eq!(v["consumers"], 1);
    assert_eq!(v["delivery_mode"], "inline");
    assert_eq!(v["stats"]["images_ingested"], 0);
}
