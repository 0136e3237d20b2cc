//! HTTP routes
//!
//! | Route              | Purpose                                   |
//! |--------------------|-------------------------------------------|
//! | `GET /`, `GET /ws` | WebSocket upgrade for producer/consumers  |
//! | `POST /upload`     | Image upload (raw body or multipart file) |
//! | `GET /get-config`  | Current device configuration              |
//! | `POST /set-config` | Partial configuration update              |
//! | `GET /latest`      | Last image (reference delivery mode)      |
//! | `GET /health`      | Liveness and counters                     |

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use super::error::ApiError;
use super::state::AppState;
use crate::device::{ConfigPatch, DeviceConfig};
use crate::error::IngestError;
use crate::ingest::LATEST_PATH;
use crate::session::run_session;

/// Multipart field names accepted when the field carries no file name
const IMAGE_FIELDS: [&str; 3] = ["image", "file", "photo"];

/// Build the application router
pub fn router(state: AppState, max_upload_size: usize) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/upload", post(upload_handler))
        .route("/get-config", get(get_config_handler))
        .route("/set-config", post(set_config_handler))
        .route(LATEST_PATH, get(latest_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_upload_size))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    let id = state.next_connection_id();
    let ctx = state.session_ctx.clone();

    ws.on_upgrade(move |socket| run_session(socket, ctx, id, Some(peer_addr)))
}

async fn upload_handler(
    State(state): State<AppState>,
    request: Request,
) -> Result<&'static str, ApiError> {
    let payload = read_upload(request, &state).await?;
    let report = state.ingestor.ingest(payload).await?;

    tracing::debug!(
        bytes = report.size,
        delivered = report.delivered,
        "Upload forwarded"
    );

    Ok("Image received and forwarded to consumers")
}

/// Extract the image bytes from a raw or multipart upload
async fn read_upload(request: Request, state: &AppState) -> Result<Bytes, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        return Bytes::from_request(request, state)
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()));
    }

    let mut multipart = Multipart::from_request(request, state)
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        let is_image = field.file_name().is_some()
            || field
                .name()
                .map(|name| IMAGE_FIELDS.contains(&name))
                .unwrap_or(false);

        if is_image {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::new(e.status(), e.body_text()));
        }
    }

    Err(IngestError::MissingField.into())
}

async fn get_config_handler(State(state): State<AppState>) -> Json<DeviceConfig> {
    let config = state.device_config.get().await;
    tracing::debug!("Configuration requested");
    Json(config)
}

async fn set_config_handler(
    State(state): State<AppState>,
    patch: Result<Json<ConfigPatch>, JsonRejection>,
) -> Result<&'static str, ApiError> {
    // Every malformed update is a 400, whatever the extractor would answer
    let Json(patch) = patch.map_err(|e| ApiError::bad_request(e.body_text()))?;
    state.device_config.update(&patch).await?;
    Ok("Configuration updated")
}

async fn latest_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.latest.load().await {
        Some(image) => Ok(([(CONTENT_TYPE, "image/jpeg")], image).into_response()),
        None => Err(ApiError::not_found("No image available")),
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry();
    let producer_connected = registry.has_producer().await;
    let consumers = registry.consumer_count().await;

    Json(serde_json::json!({
        "status": "ok",
        "producer_connected": producer_connected,
        "consumers": consumers,
        "delivery_mode": state.ingestor.mode().to_string(),
        "uptime_secs": state.stats().uptime().as_secs(),
        "stats": state.stats().snapshot(),
    }))
}
