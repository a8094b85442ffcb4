//! HTTP service mode: one upload endpoint running the full pipeline.
//!
//! # Endpoints
//!
//! - `POST /upload_pdf`: multipart form with a `file` field holding the PDF.
//!   Runs the pipeline synchronously and answers with the extracted JSON.
//! - `GET /health`: liveness probe.
//!
//! ```bash
//! curl -F "file=@Chennai-CFS.pdf" http://localhost:8000/upload_pdf
//! ```
//!
//! # Status codes
//!
//! | Status | When |
//! |--------|------|
//! | 200 | Extraction produced data |
//! | 400 | No `file` field, not a PDF, corrupt or encrypted PDF |
//! | 413 | Upload larger than the configured limit |
//! | 422 | OCR found no text in the document |
//! | 500 | OCR engine, model service, parsing or persistence failure |
//!
//! Each request gets its own scratch file (see
//! [`SourceDocument::from_bytes`](crate::SourceDocument::from_bytes)); the
//! shared [`TariffExtractor`] holds no per-request state.

use crate::error::{StageFailure, TariffError};
use crate::extract::TariffExtractor;
use crate::output::ExtractionResult;
use crate::pipeline::{input::sanitize_file_name, sink};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart field carrying the PDF.
pub const UPLOAD_FIELD: &str = "file";

const DEFAULT_MAX_UPLOAD_MB: usize = 50;

// ── Settings ─────────────────────────────────────────────────────────────

/// Service settings, read from the environment at startup.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// `TARIFF_HOST`. Default: 127.0.0.1.
    pub host: String,
    /// `TARIFF_PORT`. Default: 8000.
    pub port: u16,
    /// `TARIFF_OUTPUT_DIR`. Default: `output`. Set to an empty string to
    /// keep results in the response only.
    pub output_dir: Option<PathBuf>,
    /// `TARIFF_MAX_UPLOAD_MB`. Default: 50.
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            output_dir: Some(PathBuf::from("output")),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl ServerSettings {
    pub fn from_env() -> Self {
        let mut s = Self::default();

        if let Ok(host) = std::env::var("TARIFF_HOST") {
            if !host.trim().is_empty() {
                s.host = host.trim().to_string();
            }
        }
        if let Ok(value) = std::env::var("TARIFF_PORT") {
            match value.parse::<u16>() {
                Ok(port) => s.port = port,
                Err(_) => warn!("Failed to parse TARIFF_PORT='{}', using {}", value, s.port),
            }
        }
        if let Ok(dir) = std::env::var("TARIFF_OUTPUT_DIR") {
            s.output_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
        }
        if let Ok(value) = std::env::var("TARIFF_MAX_UPLOAD_MB") {
            match value.parse::<usize>() {
                Ok(mb) if mb > 0 => s.max_upload_bytes = mb * 1024 * 1024,
                _ => warn!(
                    "Invalid TARIFF_MAX_UPLOAD_MB='{}', using {} MB",
                    value, DEFAULT_MAX_UPLOAD_MB
                ),
            }
        }
        s
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── State & router ───────────────────────────────────────────────────────

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<TariffExtractor>,
    pub output_dir: Option<Arc<PathBuf>>,
}

impl AppState {
    pub fn new(extractor: TariffExtractor, output_dir: Option<PathBuf>) -> Self {
        Self {
            extractor: Arc::new(extractor),
            output_dir: output_dir.map(Arc::new),
        }
    }
}

/// Build the router with the upload size limit applied.
///
/// Oversized uploads surface as a multipart error inside the handler, so they
/// get the same JSON error body as every other failure.
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload_pdf", post(upload_pdf))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(settings: &ServerSettings, extractor: TariffExtractor) -> std::io::Result<()> {
    if let Some(ref dir) = settings.output_dir {
        tokio::fs::create_dir_all(dir).await?;
    }
    let state = AppState::new(extractor, settings.output_dir.clone());
    let app = create_router(state, settings.max_upload_bytes);

    let addr = settings.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("tariff-server listening on {addr}");
    axum::serve(listener, app).await
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub json_data: ExtractionResult,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

// ── Errors ───────────────────────────────────────────────────────────────

/// An error answered to the client as `{"error", "kind"}` JSON.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    fn bad_request(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind,
            message: message.into(),
        }
    }
}

impl From<TariffError> for ApiError {
    fn from(e: TariffError) -> Self {
        let status = if e.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<StageFailure> for ApiError {
    fn from(f: StageFailure) -> Self {
        let status = if f.is_document_problem() {
            StatusCode::UNPROCESSABLE_ENTITY
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            kind: f.kind(),
            message: f.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        let status = e.status();
        let kind = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "upload_too_large"
        } else {
            "invalid_multipart"
        };
        Self {
            status,
            kind,
            message: e.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(kind = self.kind, "{}", self.message);
        } else {
            warn!(kind = self.kind, "{}", self.message);
        }
        let body = ErrorBody {
            error: self.message,
            kind: self.kind.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

/// POST /upload_pdf
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let data = field.bytes().await?;
        upload = Some((file_name, data));
    }

    let Some((file_name, data)) = upload else {
        return Err(ApiError::bad_request(
            "missing_file",
            format!("No file uploaded in field '{UPLOAD_FIELD}'"),
        ));
    };
    info!(
        file = file_name.as_deref().unwrap_or("<unnamed>"),
        bytes = data.len(),
        "Received upload"
    );

    let output = state
        .extractor
        .extract_bytes(&data, file_name.as_deref())
        .await?;
    if let Some(failure) = output.failure {
        return Err(failure.into());
    }

    if let Some(ref dir) = state.output_dir {
        let stem = file_name
            .as_deref()
            .map(sanitize_file_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload.pdf".to_string());
        sink::save_results(&output.result, &dir.join(format!("{stem}.json"))).await?;
    }

    Ok(Json(UploadResponse {
        message: "Processing complete".to_string(),
        json_data: output.result,
    }))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
