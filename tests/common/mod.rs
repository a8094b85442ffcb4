//! In-process fakes for the rasterizer, OCR engine and chat backend.
#![allow(dead_code)]

use async_trait::async_trait;
use image::DynamicImage;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tariff_extract::{
    ChatBackend, Completion, ExtractionConfig, ExtractionProgressCallback, OcrEngine, PageImage,
    Rasterizer, Stage, TariffError, TariffExtractor,
};

/// Smallest byte string that passes the PDF magic check.
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n%%EOF\n";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("tariff_extract=debug")
        .try_init();
}

/// Returns `pages` blank images, or a fixed error.
pub struct FakeRasterizer {
    pub pages: Result<usize, String>,
}

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, pdf_path: &Path) -> Result<Vec<PageImage>, TariffError> {
        match &self.pages {
            Ok(n) => Ok((1..=*n)
                .map(|page_num| PageImage {
                    page_num,
                    image: DynamicImage::new_rgb8(8, 8),
                })
                .collect()),
            Err(detail) => Err(TariffError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: detail.clone(),
            }),
        }
    }
}

/// Answers page N with the N-th scripted result.
pub struct ScriptedOcr {
    pub pages: Vec<Result<String, String>>,
}

impl ScriptedOcr {
    pub fn texts(texts: &[&str]) -> Self {
        Self {
            pages: texts.iter().map(|t| Ok(t.to_string())).collect(),
        }
    }
}

#[async_trait]
impl OcrEngine for ScriptedOcr {
    async fn recognize(&self, page: &PageImage) -> Result<String, String> {
        self.pages
            .get(page.page_num - 1)
            .cloned()
            .unwrap_or_else(|| Err(format!("no script for page {}", page.page_num)))
    }
}

/// Fixed reply; counts calls and keeps the last user prompt.
pub struct ScriptedBackend {
    reply: Result<String, String>,
    pub calls: AtomicUsize,
    pub last_prompt: Mutex<Option<String>>,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    pub fn failing(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(detail.to_string()),
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, _system: &str, prompt: &str) -> Result<Completion, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        self.reply.clone().map(|content| Completion {
            content,
            input_tokens: 1200,
            output_tokens: 340,
        })
    }
}

/// Records every progress event as a short string.
#[derive(Default)]
pub struct RecordingProgress {
    pub events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for RecordingProgress {
    fn on_stage_start(&self, stage: Stage) {
        self.events.lock().unwrap().push(format!("start {stage:?}"));
    }

    fn on_pages_rendered(&self, page_count: usize) {
        self.events.lock().unwrap().push(format!("pages {page_count}"));
    }

    fn on_stage_complete(&self, stage: Stage, success: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {stage:?} {success}"));
    }
}

pub fn extractor(
    config: ExtractionConfig,
    pages: usize,
    ocr: ScriptedOcr,
    backend: Arc<ScriptedBackend>,
) -> TariffExtractor {
    TariffExtractor::new(
        config,
        Arc::new(FakeRasterizer { pages: Ok(pages) }),
        Arc::new(ocr),
        backend,
    )
}

/// Two OCR'd pages of a Chennai CFS tariff sheet.
pub const PAGE_1: &str = "CHENNAI CFS TARIFF\nIMPORT\nHandling Charge 20' 5000 40' 9000\n";
pub const PAGE_2: &str = "EXPORT\nStuffing 20' 3000 40' 4500\n";

pub const INNER_JSON: &str = r#"{"Import": [{"job_description": "Handling Charge", "20ft_charges": 5000, "40ft_charges": 9000, "currency": "INR"}], "Export": [{"job_description": "Stuffing", "20ft_charges": 3000, "40ft_charges": 4500, "currency": "INR"}]}"#;
