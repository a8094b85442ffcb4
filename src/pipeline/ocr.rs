//! Text extraction: OCR every page image and join the results.
//!
//! The default engine shells out to the `tesseract` binary, one process per
//! page. Each page is written as a lossless PNG into a scratch directory that
//! is removed when the call returns, so nothing outlives the request.

use crate::config::OcrConfig;
use crate::error::StageFailure;
use crate::pipeline::render::PageImage;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Reads the text off one page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognise the page. An `Err` carries the engine's diagnostic.
    async fn recognize(&self, page: &PageImage) -> Result<String, String>;
}

/// OCR all pages in order, join them with a newline and trim the result.
///
/// Any page failure discards the whole document's text. The returned failure
/// names the first failing page.
pub async fn extract_text(
    engine: &dyn OcrEngine,
    pages: &[PageImage],
) -> Result<String, StageFailure> {
    let mut texts = Vec::with_capacity(pages.len());

    for page in pages {
        match engine.recognize(page).await {
            Ok(text) => {
                debug!("Page {}: {} chars recognised", page.page_num, text.len());
                texts.push(text);
            }
            Err(detail) => {
                warn!("Failed to extract text from page {}: {}", page.page_num, detail);
                return Err(StageFailure::OcrFailed {
                    page: page.page_num,
                    detail,
                });
            }
        }
    }

    let joined = texts.join("\n").trim().to_string();
    info!("OCR complete: {} pages, {} chars", pages.len(), joined.len());
    Ok(joined)
}

/// `tesseract` command-line engine.
#[derive(Debug, Clone, Default)]
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Whether the configured tesseract binary can be executed.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.config.tesseract_cmd)
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, page: &PageImage) -> Result<String, String> {
        let scratch = TempDir::new().map_err(|e| format!("tempdir: {e}"))?;
        let png_path = scratch.path().join(format!("page-{}.png", page.page_num));

        page.image
            .save_with_format(&png_path, image::ImageFormat::Png)
            .map_err(|e| format!("failed to encode page image: {e}"))?;

        let output = Command::new(&self.config.tesseract_cmd)
            .arg(&png_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.config.language)
            .arg("--psm")
            .arg(self.config.page_segmentation_mode.to_string())
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.config.tesseract_cmd))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!(
                "{} exited with {}: {}",
                self.config.tesseract_cmd,
                output.status,
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
