//! # tariff-extract
//!
//! Extract tariff line items from scanned PDF documents into JSON.
//!
//! Scanned tariff schedules (container freight station charges, port
//! handling fees) carry no text layer. This crate rasterises each page, runs
//! tesseract over the images, and asks a language model to map the raw text
//! onto tariff fields: category, job description, 20ft and 40ft charges and
//! currency. The model's reply is parsed tolerantly, since it often wraps the
//! JSON in prose.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input   resolve local file, URL, or uploaded bytes
//!  ├─ 2. Render  rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. OCR     tesseract --psm 6 per page, joined in page order
//!  ├─ 4. LLM     one chat completion with the extraction prompt
//!  ├─ 5. Parse   strict JSON, else first `{` … last `}`
//!  └─ 6. Sink    indented JSON, atomic write
//! ```
//!
//! Steps 3–5 never fail the run: they degrade to an empty result and record
//! a [`StageFailure`]. Bad input documents and write failures are returned as
//! [`TariffError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tariff_extract::{extract_to_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Requires OPENAI_API_KEY, tesseract on PATH; pdfium is fetched on first use.
//!     let config = ExtractionConfig::default();
//!     let (output, written) =
//!         extract_to_file("Chennai-CFS.pdf", "Categorized_Tariff_Report.json", &config).await?;
//!     if !written {
//!         eprintln!("nothing extracted: {:?}", output.failure);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | The `tariff-extract` batch binary (clap + anyhow + indicatif) |
//! | `server` | on      | The `tariff-server` binary and [`server`] module (axum) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EmptyResultPolicy, ExtractionConfig, ExtractionConfigBuilder, OcrConfig, RenderConfig};
pub use error::{StageFailure, TariffError};
pub use extract::{extract, extract_sync, extract_to_file, TariffExtractor};
pub use output::{ExtractionOutput, ExtractionResult, ExtractionStats, ParseMode, TariffRecord};
pub use pipeline::input::SourceDocument;
pub use pipeline::llm::{ChatBackend, Completion, LlmClient};
pub use pipeline::ocr::{OcrEngine, TesseractOcr};
pub use pipeline::render::{PageImage, PdfiumRasterizer, Rasterizer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
