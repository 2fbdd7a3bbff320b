//! Request handlers for the chat and document endpoints.
//!
//! Error bodies are always `{ "error": "..." }`. Caller mistakes carry a
//! specific message; collaborator failures are logged in full and answered
//! with a generic one.

use axum::{
    Json,
    extract::{Multipart, State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use ragbridge_assembler::ChatTurnRequest;
use ragbridge_core::error::{Error, StorageError};
use ragbridge_core::message::SessionId;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::SharedState;

/// Header carrying the session id when the body does not.
pub const SESSION_HEADER: &str = "x-session-id";

pub(crate) const CHAT_FAILURE: &str = "Error processing the message";
pub(crate) const UPLOAD_FAILURE: &str = "Error uploading the file";
pub(crate) const NO_FILE: &str = "No files were uploaded.";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An error already mapped onto its HTTP status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn from_chat(err: Error) -> Self {
        if err.is_client_error() {
            warn!(error = %err, "Rejected chat request");
            return Self::bad_request(client_message(&err));
        }
        error!(error = %err, "Chat request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, CHAT_FAILURE)
    }

    fn from_upload(err: StorageError) -> Self {
        if let StorageError::InvalidName(_) = err {
            warn!(error = %err, "Rejected upload");
            return Self::bad_request(err.to_string());
        }
        error!(error = %err, "Upload failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, UPLOAD_FAILURE)
    }
}

fn client_message(err: &Error) -> String {
    match err {
        Error::Validation(msg) => msg.clone(),
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

// --- Chat ---

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: SessionId,
}

/// `POST /chat` and `POST /chatbot`.
pub async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        warn!(error = %e, "Malformed chat body");
        ApiError::bad_request("message is required")
    })?;

    let session = payload
        .session_id
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            headers
                .get(SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        })
        .map(SessionId);

    let request = ChatTurnRequest {
        session,
        message: payload.message.unwrap_or_default(),
        provider: payload.provider,
        model: payload.model,
    };

    let reply = state.pipeline.chat(request).await.map_err(ApiError::from_chat)?;

    Ok(Json(ChatResponse {
        reply: reply.reply,
        session_id: reply.session_id,
    }))
}

// --- Upload ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: &'static str,
    pub file_name: String,
}

/// `POST /upload`: multipart form with a `file` field.
pub async fn upload_handler(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!(error = %e, "Malformed multipart body");
        ApiError::new(e.status(), e.body_text())
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| {
            warn!(file = %file_name, error = %e, "Upload body rejected");
            ApiError::new(e.status(), e.body_text())
        })?;

        let report = state
            .ingestor
            .ingest(&file_name, content_type.as_deref(), &bytes)
            .await
            .map_err(ApiError::from_upload)?;

        info!(
            file = %report.name,
            bytes = bytes.len(),
            chunks = report.chunks,
            "File uploaded"
        );

        return Ok(Json(UploadResponse {
            message: "File uploaded successfully",
            file_name: report.name,
        }));
    }

    Err(ApiError::bad_request(NO_FILE))
}

// --- Files ---

#[derive(Debug, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// `GET /files`: stored uploads, sorted by name.
pub async fn files_handler(State(state): State<SharedState>) -> Result<Json<Vec<FileEntry>>, ApiError> {
    let blobs = state.ingestor.store().list().await.map_err(|e| {
        error!(error = %e, "Listing uploads failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Error listing files")
    })?;

    Ok(Json(
        blobs
            .into_iter()
            .map(|b| FileEntry {
                name: b.name,
                size: b.size,
            })
            .collect(),
    ))
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
