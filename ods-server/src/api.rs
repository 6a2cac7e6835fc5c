//! REST and WebSocket routes
//!
//! The streaming endpoint speaks the demo wire protocol: the client's first
//! frame is a start request naming the video, the server answers with an
//! `initialized` frame, streams prediction frames, and finishes with
//! `complete` or `error`. Completed runs land in the prediction cache.

use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{Sink, SinkExt, StreamExt};
use ods_core::model::{DemoKind, RawMessage, StartRequest, TelemetryRecord};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pacing of outbound prediction frames, roughly the live inference rate
const STREAM_INTERVAL: Duration = Duration::from_millis(33);

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/media", get(list_media))
        .route("/api/media/random", get(random_media))
        .route("/api/media/:id", get(media_info))
        .route("/api/demo/cache/:video_id", get(check_cache))
        .route("/api/demo/image/:image_id", post(evaluate_image))
        .route("/api/demo/ws/:kind", get(demo_stream))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}

// === Media Endpoints ===

async fn list_media(State(state): State<AppState>) -> impl IntoResponse {
    let library = state.library.read().await;
    Json(library.summary())
}

#[derive(Serialize)]
struct MediaIdResponse {
    id: String,
}

async fn random_media(
    State(state): State<AppState>,
) -> Result<Json<MediaIdResponse>, (StatusCode, String)> {
    let library = state.library.read().await;
    let entry = library
        .random_video()
        .ok_or((StatusCode::NOT_FOUND, "no videos available".to_string()))?;
    Ok(Json(MediaIdResponse {
        id: entry.id.clone(),
    }))
}

async fn media_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let library = state.library.read().await;
    let entry = library
        .get(&id)
        .ok_or((StatusCode::NOT_FOUND, format!("unknown media id: {id}")))?;
    Ok(Json(entry.clone()))
}

// === Demo Endpoints ===

#[derive(Serialize)]
struct CacheCheckResponse {
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<DemoKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predictions: Option<Vec<TelemetryRecord>>,
}

async fn check_cache(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Json<CacheCheckResponse> {
    let cache = state.cache.read().await;
    match cache.get(&video_id) {
        Some(run) => Json(CacheCheckResponse {
            cached: true,
            kind: Some(run.kind),
            predictions: Some(run.records.clone()),
        }),
        None => Json(CacheCheckResponse {
            cached: false,
            kind: None,
            predictions: None,
        }),
    }
}

async fn evaluate_image(
    State(state): State<AppState>,
    Path(image_id): Path<String>,
) -> Result<Json<TelemetryRecord>, (StatusCode, String)> {
    {
        let library = state.library.read().await;
        if library.get_image(&image_id).is_none() {
            return Err((
                StatusCode::NOT_FOUND,
                format!("unknown image id: {image_id}"),
            ));
        }
    }
    info!(image_id, "evaluating single image");
    Ok(Json(state.engine.evaluate_image(&image_id)))
}

// === Streaming Endpoint ===

async fn demo_stream(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let kind: DemoKind = kind
        .parse()
        .map_err(|e: String| (StatusCode::BAD_REQUEST, e))?;
    Ok(ws.on_upgrade(move |socket| handle_demo_socket(socket, state, kind)))
}

/// Manage one streaming session over a WebSocket connection
async fn handle_demo_socket(socket: WebSocket, state: AppState, kind: DemoKind) {
    let (mut sender, mut receiver) = socket.split();

    // First client frame must be the start request
    let request = match receiver.next().await {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<StartRequest>(&text) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "rejecting malformed start request");
                let _ = send_frame(&mut sender, &RawMessage::error("malformed start request"))
                    .await;
                return;
            }
        },
        _ => {
            debug!("socket closed before start request");
            return;
        }
    };

    let known = {
        let library = state.library.read().await;
        library.get_video(&request.video_id).is_some()
    };
    if !known {
        warn!(video_id = %request.video_id, "stream requested for unknown video");
        let _ = send_frame(
            &mut sender,
            &RawMessage::error(format!("unknown video id: {}", request.video_id)),
        )
        .await;
        return;
    }

    info!(video_id = %request.video_id, ?kind, "starting prediction stream");
    let run = state.engine.generate(&request.video_id, kind);

    // The receiver side only matters for hangup detection from here on
    let cancel = CancellationToken::new();
    let hangup = cancel.clone();
    let watcher = tokio::spawn(async move {
        while let Some(frame) = receiver.next().await {
            match frame {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {} // anything after the start request is ignored
            }
        }
        hangup.cancel();
    });

    let mut delivered = true;
    for message in &run.messages {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(video_id = %request.video_id, "client hung up mid-stream");
                delivered = false;
                break;
            }
            _ = tokio::time::sleep(STREAM_INTERVAL) => {}
        }
        if send_frame(&mut sender, message).await.is_err() {
            delivered = false;
            break;
        }
    }

    if delivered {
        let mut cache = state.cache.write().await;
        cache.store(&request.video_id, kind, run.records);
        info!(video_id = %request.video_id, "stream complete; run cached");
    }

    cancel.cancel();
    let _ = watcher.await;
}

async fn send_frame(
    sender: &mut (impl Sink<Message> + Unpin),
    message: &RawMessage,
) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to serialize stream frame");
            return Err(());
        }
    };
    sender.send(Message::Text(json)).await.map_err(|_| ())
}
