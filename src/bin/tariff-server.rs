//! Service binary: `POST /upload_pdf` and `GET /health`.
//!
//! Model settings come from `TARIFF_MODEL`, `TARIFF_PROVIDER` and
//! `TARIFF_OCR_LANG`; listener settings from [`ServerSettings::from_env`].

use anyhow::{Context, Result};
use tariff_extract::server::{self, ServerSettings};
use tariff_extract::{ExtractionConfig, TariffExtractor, TesseractOcr};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tariff_extract=info,tower_http=info")),
        )
        .init();

    let settings = ServerSettings::from_env();
    let config = config_from_env().context("Invalid extraction settings")?;

    let tesseract = TesseractOcr::new(config.ocr.clone());
    if !tesseract.is_available().await {
        tracing::warn!(
            "'{}' is not executable; every upload will fail at OCR",
            config.ocr.tesseract_cmd
        );
    }

    tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
        .context("Failed to download PDFium engine")?;

    // A missing API key stops the service here, before the port is bound.
    let extractor = TariffExtractor::from_config(config)?;

    server::serve(&settings, extractor)
        .await
        .with_context(|| format!("Server on {} stopped", settings.addr()))
}

fn config_from_env() -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder();
    if let Ok(model) = std::env::var("TARIFF_MODEL") {
        builder = builder.model(model);
    }
    if let Ok(provider) = std::env::var("TARIFF_PROVIDER") {
        builder = builder.provider_name(provider);
    }
    if let Ok(lang) = std::env::var("TARIFF_OCR_LANG") {
        builder = builder.ocr_language(lang);
    }
    Ok(builder.build()?)
}
