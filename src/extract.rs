//! The extraction runner: sequence the pipeline stages for one document.
//!
//! [`TariffExtractor`] owns one instance of each collaborator (rasterizer,
//! OCR engine, chat backend). It holds no per-request state, so a single
//! extractor behind an `Arc` can serve concurrent requests; each request
//! brings its own [`SourceDocument`] and temp files.
//!
//! Failure policy: document problems and persistence problems are returned
//! as `Err(TariffError)`. Everything between (OCR, the model call, parsing)
//! degrades to an empty result with the reason in
//! [`ExtractionOutput::failure`].

use crate::config::ExtractionConfig;
use crate::error::{StageFailure, TariffError};
use crate::output::{ExtractionOutput, ExtractionResult, ExtractionStats};
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::llm::{self, ChatBackend, LlmClient};
use crate::pipeline::ocr::{self, OcrEngine, TesseractOcr};
use crate::pipeline::render::{self, PageImage, PdfiumRasterizer, Rasterizer};
use crate::pipeline::{parse, sink};
use crate::progress::{ProgressCallback, Stage};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runs the rasterise → OCR → request → parse pipeline.
#[derive(Clone)]
pub struct TariffExtractor {
    config: ExtractionConfig,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Arc<dyn OcrEngine>,
    backend: Arc<dyn ChatBackend>,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for TariffExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TariffExtractor")
            .field("config", &self.config)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .finish_non_exhaustive()
    }
}

impl TariffExtractor {
    /// Assemble an extractor from explicit collaborators.
    pub fn new(
        config: ExtractionConfig,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: Arc<dyn OcrEngine>,
        backend: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            ocr,
            backend,
            progress: None,
        }
    }

    /// Build the production extractor: pdfium, tesseract and the configured
    /// LLM provider.
    ///
    /// # Errors
    /// [`TariffError::ProviderNotConfigured`] when the provider's API key is
    /// missing from the environment.
    pub fn from_config(config: ExtractionConfig) -> Result<Self, TariffError> {
        let backend = LlmClient::connect(&config)?;
        Ok(Self::new(
            config.clone(),
            Arc::new(PdfiumRasterizer::new(config.render.clone())),
            Arc::new(TesseractOcr::new(config.ocr.clone())),
            Arc::new(backend),
        ))
    }

    /// Attach a progress callback.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Extract tariff data from a local path or HTTP(S) URL.
    pub async fn extract(&self, input_str: &str) -> Result<ExtractionOutput, TariffError> {
        info!("Starting extraction: {}", input_str);
        let document = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.extract_document(&document).await
    }

    /// Extract tariff data from an uploaded PDF body.
    ///
    /// The bytes are written to a private temp file that is removed when this
    /// call returns.
    pub async fn extract_bytes(
        &self,
        bytes: &[u8],
        file_name: Option<&str>,
    ) -> Result<ExtractionOutput, TariffError> {
        let document = SourceDocument::from_bytes(bytes, file_name)?;
        self.extract_document(&document).await
    }

    /// Run the full pipeline on a resolved document.
    pub async fn extract_document(
        &self,
        document: &SourceDocument,
    ) -> Result<ExtractionOutput, TariffError> {
        let total_start = Instant::now();

        self.stage_start(Stage::Render);
        let render_start = Instant::now();
        let pages = match render::rasterize(Arc::clone(&self.rasterizer), document.path()).await {
            Ok(pages) => pages,
            Err(e) => {
                self.stage_complete(Stage::Render, false);
                return Err(e);
            }
        };
        let render_duration_ms = render_start.elapsed().as_millis() as u64;
        self.stage_complete(Stage::Render, true);
        if let Some(ref cb) = self.progress {
            cb.on_pages_rendered(pages.len());
        }
        info!("Rendered {} pages in {}ms", pages.len(), render_duration_ms);

        let mut output = self.extract_pages(pages).await;
        output.stats.render_duration_ms = render_duration_ms;
        output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        Ok(output)
    }

    /// Run everything after rasterisation: OCR, model request, parsing.
    ///
    /// The page images are dropped once OCR is done.
    pub async fn extract_pages(&self, pages: Vec<PageImage>) -> ExtractionOutput {
        let start = Instant::now();
        let mut stats = ExtractionStats {
            page_count: pages.len(),
            ..ExtractionStats::default()
        };

        // ── OCR ──────────────────────────────────────────────────────────
        self.stage_start(Stage::Ocr);
        let ocr_start = Instant::now();
        let ocr_result = ocr::extract_text(self.ocr.as_ref(), &pages).await;
        drop(pages);
        stats.ocr_duration_ms = ocr_start.elapsed().as_millis() as u64;
        self.stage_complete(Stage::Ocr, ocr_result.is_ok());

        let text = match ocr_result {
            Ok(text) => text,
            Err(failure) => return self.degraded(String::new(), failure, stats, start),
        };
        stats.text_chars = text.chars().count();

        // ── Model request ────────────────────────────────────────────────
        self.stage_start(Stage::Request);
        let llm_start = Instant::now();
        let completion =
            llm::request_structured_data(self.backend.as_ref(), &text, &self.config).await;
        stats.llm_duration_ms = llm_start.elapsed().as_millis() as u64;
        self.stage_complete(Stage::Request, completion.is_ok());

        let completion = match completion {
            Ok(c) => c,
            Err(failure) => return self.degraded(text, failure, stats, start),
        };
        stats.input_tokens = completion.input_tokens;
        stats.output_tokens = completion.output_tokens;

        // ── Parse ────────────────────────────────────────────────────────
        self.stage_start(Stage::Parse);
        let parsed = parse::parse_response(&completion.content);
        self.stage_complete(Stage::Parse, parsed.is_ok());

        match parsed {
            Ok(parsed) => {
                stats.parse_mode = Some(parsed.mode);
                stats.total_duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Extraction complete: {} top-level keys ({:?} parse), {}ms",
                    parsed.result.len(),
                    parsed.mode,
                    stats.total_duration_ms
                );
                ExtractionOutput {
                    text,
                    result: parsed.result,
                    failure: None,
                    stats,
                }
            }
            Err(failure) => self.degraded(text, failure, stats, start),
        }
    }

    /// Extract and write the result to `output_path`, honouring the
    /// configured empty-result policy.
    ///
    /// Returns the output and whether a file was written.
    pub async fn extract_to_file(
        &self,
        input_str: &str,
        output_path: &Path,
    ) -> Result<(ExtractionOutput, bool), TariffError> {
        let output = self.extract(input_str).await?;
        let written = sink::persist(&output.result, output_path, self.config.empty_result).await?;
        Ok((output, written))
    }

    fn degraded(
        &self,
        text: String,
        failure: StageFailure,
        mut stats: ExtractionStats,
        start: Instant,
    ) -> ExtractionOutput {
        warn!("No data extracted: {}", failure);
        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        ExtractionOutput {
            text,
            result: ExtractionResult::empty(),
            failure: Some(failure),
            stats,
        }
    }

    fn stage_start(&self, stage: Stage) {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(stage);
        }
    }

    fn stage_complete(&self, stage: Stage, success: bool) {
        if let Some(ref cb) = self.progress {
            cb.on_stage_complete(stage, success);
        }
    }
}

/// Extract tariff data from a path or URL with the production collaborators.
///
/// # Example
/// ```rust,no_run
/// use tariff_extract::{extract, ExtractionConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let output = extract("Chennai-CFS.pdf", &ExtractionConfig::default()).await?;
///     for record in output.result.records() {
///         println!("{:?}: {}", record.category, record.job_description);
///     }
///     Ok(())
/// }
/// ```
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TariffError> {
    TariffExtractor::from_config(config.clone())?
        .extract(input_str.as_ref())
        .await
}

/// Extract and save to `output_path`. Returns whether a file was written.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<(ExtractionOutput, bool), TariffError> {
    TariffExtractor::from_config(config.clone())?
        .extract_to_file(input_str.as_ref(), output_path.as_ref())
        .await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, TariffError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| TariffError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input_str, config))
}
