//! Configuration types for tariff extraction.
//!
//! All pipeline behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One struct holds every knob so the
//! same config can be shared by the batch CLI and by every request the
//! service handles.

use crate::error::TariffError;
use serde::{Deserialize, Serialize};

/// Default model used for the extraction request.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default provider name handed to `edgequake_llm::ProviderFactory`.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Configuration for one tariff extraction run.
///
/// # Example
/// ```rust
/// use tariff_extract::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("gpt-4o-mini")
///     .ocr_language("eng+hin")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr.page_segmentation_mode, 6);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// LLM model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// LLM provider name (e.g. "openai", "anthropic"). Default: [`DEFAULT_PROVIDER`].
    pub provider_name: String,

    /// Sampling temperature for the completion. Default: 0.0.
    ///
    /// Extraction should copy numbers off the page, not improvise.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// A two-page tariff sheet with ~80 line items needs roughly 3 000 tokens
    /// of JSON; anything lower truncates the object and forces recovery to fail.
    pub max_tokens: usize,

    /// Upper bound on the model call in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom system prompt. If None, uses [`crate::prompts::SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Rasterisation settings.
    pub render: RenderConfig,

    /// OCR settings.
    pub ocr: OcrConfig,

    /// What the sink does with an empty result. Default: skip.
    pub empty_result: EmptyResultPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            provider_name: DEFAULT_PROVIDER.to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            system_prompt: None,
            render: RenderConfig::default(),
            ocr: OcrConfig::default(),
            empty_result: EmptyResultPolicy::default(),
        }
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Rasterisation knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Rendering DPI. Range: 72–400. Default: 200, the usual converter default.
    pub dpi: u32,

    /// Cap on the longest rendered edge in pixels. Default: 4000.
    ///
    /// Keeps an A0 schedule at 200 DPI from allocating a 6 600 × 9 300 bitmap.
    pub max_rendered_pixels: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            max_rendered_pixels: 4000,
        }
    }
}

/// OCR knobs passed to the tesseract binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language code(s), e.g. "eng" or "eng+hin". Default: "eng".
    pub language: String,

    /// Tesseract `--psm` value. Default: 6 (a single uniform block of text),
    /// which keeps tariff rows on one line instead of splitting columns.
    pub page_segmentation_mode: u8,

    /// Name or path of the tesseract executable. Default: "tesseract".
    pub tesseract_cmd: String,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: 6,
            tesseract_cmd: "tesseract".to_string(),
        }
    }
}

/// Whether an empty [`crate::output::ExtractionResult`] reaches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmptyResultPolicy {
    /// Do not write anything when nothing was extracted. (default)
    #[default]
    Skip,
    /// Write `{}` so downstream jobs always find a file.
    WriteEmpty,
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.render.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.render.max_rendered_pixels = px.max(100);
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr.language = lang.into();
        self
    }

    pub fn page_segmentation_mode(mut self, psm: u8) -> Self {
        self.config.ocr.page_segmentation_mode = psm;
        self
    }

    pub fn tesseract_cmd(mut self, cmd: impl Into<String>) -> Self {
        self.config.ocr.tesseract_cmd = cmd.into();
        self
    }

    pub fn empty_result(mut self, policy: EmptyResultPolicy) -> Self {
        self.config.empty_result = policy;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, TariffError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(TariffError::InvalidConfig("model must not be empty".into()));
        }
        if c.provider_name.trim().is_empty() {
            return Err(TariffError::InvalidConfig(
                "provider name must not be empty".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(TariffError::InvalidConfig(
                "API timeout must be at least 1s".into(),
            ));
        }
        // tesseract accepts psm 0–13
        if c.ocr.page_segmentation_mode > 13 {
            return Err(TariffError::InvalidConfig(format!(
                "page segmentation mode must be 0–13, got {}",
                c.ocr.page_segmentation_mode
            )));
        }
        if c.ocr.language.trim().is_empty() {
            return Err(TariffError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
