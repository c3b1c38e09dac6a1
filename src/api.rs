use crate::config::*;
use crate::engine::ConversationEngine;
use crate::jobs::{IngestJob, IngestQueue};
use crate::rabbit_hole::{admitted_mime_type, unsupported_mime_detail, UploadedFile};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Closed set of error kinds a WebSocket client can see. Internal failure
/// types never cross the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    EngineFailure,
    InvalidMessage,
    ConnectionError,
}

#[derive(Clone)]
pub struct GatewayState {
    pub engine: Arc<dyn ConversationEngine>,
    pub ingest_queue: Arc<IngestQueue>,
}

pub fn routes(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/ws", get(ws_handler))
        .route("/rabbithole/", post(rabbithole_upload))
        .with_state(state)
}

// server status
async fn home() -> impl IntoResponse {
    Json(json!({ "status": STATUS_MESSAGE }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| chat_session(socket, state))
}

/// Main chat loop: one inbound text frame, one engine call, one JSON reply
/// frame, in order. The first failure ends the session after a single typed
/// error frame; a clean close ends it silently.
async fn chat_session(mut socket: WebSocket, state: GatewayState) {
    let session = Uuid::new_v4();
    info!("Chat session {} opened", session);

    let failure: Option<ErrorCode> = loop {
        let msg = match socket.recv().await {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                warn!("Session {}: socket error: {}", session, e);
                break Some(ErrorCode::ConnectionError);
            }
            None => break None,
        };

        match msg {
            Message::Text(text) => match state.engine.message(&text).await {
                Ok(reply) => {
                    if let Err(e) = socket.send(Message::Text(reply.to_string())).await {
                        // Client is unreachable, no point sending an error frame
                        warn!("Session {}: send failed: {}", session, e);
                        break None;
                    }
                }
                Err(e) => {
                    error!("Session {}: engine failure: {}", session, e);
                    break Some(ErrorCode::EngineFailure);
                }
            },
            Message::Binary(_) => break Some(ErrorCode::InvalidMessage),
            Message::Close(_) => break None,
            // Ping/pong is answered by axum itself
            Message::Ping(_) | Message::Pong(_) => continue,
        }
    };

    if let Some(code) = failure {
        let frame = json!({ "error": true, "code": code });
        let _ = socket.send(Message::Text(frame.to_string())).await;
    }

    info!("Chat session {} closed", session);
}

/// Receive one file, validate its MIME type, schedule ingestion in the
/// background and acknowledge immediately. Completion is not observable
/// through this endpoint.
async fn rabbithole_upload(
    State(state): State<GatewayState>,
    multipart: Result<
        axum_extra::extract::Multipart,
        axum_extra::extract::multipart::MultipartRejection,
    >,
) -> (StatusCode, Json<Value>) {
    // Requests that are not multipart at all fail validation here
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(e) => {
            return validation_error(json!([
                { "loc": ["body"], "msg": e.to_string() }
            ]))
        }
    };

    let mut file: Option<UploadedFile> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some(UPLOAD_FIELD) {
                    continue;
                }
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                match field.bytes().await {
                    Ok(bytes) => {
                        file = Some(UploadedFile {
                            filename,
                            content_type,
                            bytes,
                        })
                    }
                    Err(e) => {
                        return validation_error(json!([
                            { "loc": ["body", UPLOAD_FIELD], "msg": e.to_string() }
                        ]))
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return validation_error(json!([
                    { "loc": ["body"], "msg": e.to_string() }
                ]))
            }
        }
    }

    let Some(file) = file else {
        return validation_error(json!([
            { "loc": ["body", UPLOAD_FIELD], "msg": "field required" }
        ]));
    };

    info!("Upload received: {} ({})", file.filename, file.content_type);

    if !admitted_mime_type(&file.content_type) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": unsupported_mime_detail(&file.content_type) })),
        );
    }

    let filename = file.filename.clone();
    let content_type = file.content_type.clone();

    // Ingestion runs out-of-band; reply before it starts
    state.ingest_queue.enqueue(IngestJob { file }).await;

    (
        StatusCode::OK,
        Json(json!({
            "filename": filename,
            "content-type": content_type,
            "info": "File is being ingested asynchronously.",
        })),
    )
}

fn validation_error(errors: Value) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "detail": errors })),
    )
}
