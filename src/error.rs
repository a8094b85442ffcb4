//! Error types for the tariff-extract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`TariffError`]: **Fatal**: the run cannot proceed or its artifact
//!   cannot be saved (bad input file, unreadable PDF, provider not configured,
//!   output write failed). Returned as `Err(TariffError)` from the top-level
//!   `extract*` functions.
//!
//! * [`StageFailure`]: **Degraded**: OCR, the model call or the response
//!   parser came up empty. The run still completes with an empty
//!   [`crate::output::ExtractionResult`]; the failure is stored in
//!   [`crate::output::ExtractionOutput::failure`] so callers decide whether
//!   "nothing extracted" is itself worth reporting.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tariff-extract library.
#[derive(Debug, Error)]
pub enum TariffError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF is encrypted; scanned tariff sheets are expected to be open.
    #[error("PDF '{path}' is encrypted and cannot be rasterised")]
    PasswordRequired { path: PathBuf },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TariffError {
    /// Whether the error was caused by the document the caller supplied.
    ///
    /// The service maps these to `400 Bad Request`; everything else is a
    /// server-side failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            TariffError::FileNotFound { .. }
                | TariffError::PermissionDenied { .. }
                | TariffError::InvalidInput { .. }
                | TariffError::DownloadFailed { .. }
                | TariffError::DownloadTimeout { .. }
                | TariffError::NotAPdf { .. }
                | TariffError::CorruptPdf { .. }
                | TariffError::PasswordRequired { .. }
                | TariffError::RasterisationFailed { .. }
        )
    }

    /// Short machine-readable label used in service error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            TariffError::FileNotFound { .. } => "file_not_found",
            TariffError::PermissionDenied { .. } => "permission_denied",
            TariffError::InvalidInput { .. } => "invalid_input",
            TariffError::DownloadFailed { .. } => "download_failed",
            TariffError::DownloadTimeout { .. } => "download_timeout",
            TariffError::NotAPdf { .. } => "not_a_pdf",
            TariffError::CorruptPdf { .. } => "corrupt_pdf",
            TariffError::PasswordRequired { .. } => "password_required",
            TariffError::RasterisationFailed { .. } => "rasterisation_failed",
            TariffError::PdfiumBindingFailed(_) => "pdfium_unavailable",
            TariffError::ProviderNotConfigured { .. } => "provider_not_configured",
            TariffError::OutputWriteFailed { .. } => "output_write_failed",
            TariffError::InvalidConfig(_) => "invalid_config",
            TariffError::Internal(_) => "internal",
        }
    }
}

/// Why a run produced an empty result.
///
/// Every variant keeps the underlying message so operators can see what went
/// wrong even though the functional result degrades to "nothing extracted".
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageFailure {
    /// The OCR engine failed on a page; the whole document's text is dropped.
    #[error("OCR failed on page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// OCR ran but produced no usable text.
    #[error("Extracted text is empty; skipped the model call")]
    EmptyText,

    /// The model call failed (network, auth, quota, malformed request).
    #[error("LLM request failed: {detail}")]
    ServiceFailed { detail: String },

    /// The model call exceeded the configured timeout.
    #[error("LLM request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The model answered with no content.
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// The response held no parseable JSON object, even after recovery.
    #[error("Unable to extract valid JSON from the response: {detail}")]
    ParseFailed { detail: String },
}

impl StageFailure {
    /// Whether the empty result stems from the document rather than the service.
    ///
    /// Only [`StageFailure::EmptyText`] qualifies: OCR ran fine and simply
    /// found nothing to read.
    pub fn is_document_problem(&self) -> bool {
        matches!(self, StageFailure::EmptyText)
    }

    /// Short machine-readable label used in service error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StageFailure::OcrFailed { .. } => "ocr_failed",
            StageFailure::EmptyText => "empty_text",
            StageFailure::ServiceFailed { .. } => "service_failed",
            StageFailure::Timeout { .. } => "timeout",
            StageFailure::EmptyResponse => "empty_response",
            StageFailure::ParseFailed { .. } => "parse_failed",
        }
    }
}
