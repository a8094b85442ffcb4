//! PDF rasterisation: render every page to a `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! [`rasterize`] moves the work onto the blocking pool so Tokio worker threads
//! do not stall while a multi-page scan is rendered.
//!
//! ## Why cap pixels as well as DPI?
//!
//! Tariff schedules are sometimes A3 or larger. `max_rendered_pixels` caps the
//! longest edge regardless of physical page size, keeping memory bounded.

use crate::config::RenderConfig;
use crate::error::TariffError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// One rasterised page.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-indexed page number.
    pub page_num: usize,
    pub image: DynamicImage,
}

/// Turns a PDF file into its page images, in document order.
///
/// Implementations are blocking; [`rasterize`] runs them off the async
/// executor.
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, TariffError>;
}

/// Run a rasterizer on the blocking pool.
pub async fn rasterize(
    rasterizer: Arc<dyn Rasterizer>,
    pdf_path: &Path,
) -> Result<Vec<PageImage>, TariffError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || rasterizer.rasterize(&path))
        .await
        .map_err(|e| TariffError::Internal(format!("Render task panicked: {}", e)))?
}

/// pdfium-backed rasterizer.
///
/// The pdfium shared library is located (and downloaded on first use) by
/// `pdfium-auto`; set `PDFIUM_LIB_PATH` to use an existing copy.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    config: RenderConfig,
}

impl PdfiumRasterizer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, TariffError> {
        let pdfium = pdfium_auto::bind_pdfium_silent()
            .map_err(|e| TariffError::PdfiumBindingFailed(e.to_string()))?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| classify_load_error(pdf_path, e))?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);

        let max_pixels = self.config.max_rendered_pixels as i32;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(self.config.dpi as f32 / 72.0)
            .set_maximum_width(max_pixels)
            .set_maximum_height(max_pixels);

        let mut results = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                TariffError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} → {}x{} px",
                idx + 1,
                image.width(),
                image.height()
            );
            results.push(PageImage {
                page_num: idx + 1,
                image,
            });
        }

        Ok(results)
    }
}

fn classify_load_error(pdf_path: &Path, e: PdfiumError) -> TariffError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        TariffError::PasswordRequired {
            path: pdf_path.to_path_buf(),
        }
    } else {
        TariffError::CorruptPdf {
            path: pdf_path.to_path_buf(),
            detail,
        }
    }
}
