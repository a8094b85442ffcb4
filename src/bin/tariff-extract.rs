//! CLI binary for tariff-extract.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs one document and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tariff_extract::pipeline::sink;
use tariff_extract::{
    EmptyResultPolicy, ExtractionConfig, ExtractionOutput, ExtractionProgressCallback,
    ProgressCallback, Stage, TariffExtractor,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner for the whole run; each finished stage leaves a log line.
struct CliProgressCallback {
    bar: ProgressBar,
    pages: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Extracting");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            pages: AtomicUsize::new(0),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        let msg = match stage {
            Stage::Ocr => format!("{stage} on {} pages…", self.pages.load(Ordering::SeqCst)),
            other => format!("{other}…"),
        };
        self.bar.set_message(msg);
    }

    fn on_pages_rendered(&self, page_count: usize) {
        self.pages.store(page_count, Ordering::SeqCst);
    }

    fn on_stage_complete(&self, stage: Stage, success: bool) {
        let mark = if success { green("✓") } else { red("✗") };
        self.bar.println(format!("  {mark} {stage}"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a tariff sheet to Chennai-CFS.json
  tariff-extract Chennai-CFS.pdf

  # Choose the output file and keep the OCR text for inspection
  tariff-extract Chennai-CFS.pdf -o cfs.json --text-output cfs.txt

  # Download and extract
  tariff-extract https://example.com/tariffs/chennai.pdf

  # Hindi + English pages, a different model
  tariff-extract --lang eng+hin --model gpt-4o-mini tariff.pdf

  # Full output (text, result, stats) on stdout
  tariff-extract --json tariff.pdf > run.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key (provider "openai")
  ANTHROPIC_API_KEY       Anthropic API key (provider "anthropic")
  GEMINI_API_KEY          Google Gemini API key (provider "gemini")
  TARIFF_MODEL            Override model ID
  TARIFF_PROVIDER         Override provider
  PDFIUM_LIB_PATH         Path to an existing libpdfium, skips auto-download
  RUST_LOG                Log filter, overrides -v / -q

REQUIREMENTS:
  tesseract must be on PATH (or pass --tesseract). PDFium (~30 MB) is
  downloaded automatically on first run and cached.
"#;

/// Extract container-freight tariffs from scanned PDFs into JSON.
#[derive(Parser, Debug)]
#[command(
    name = "tariff-extract",
    version,
    about = "Extract container-freight tariffs from scanned PDFs into JSON",
    long_about = "Rasterise a scanned tariff PDF, OCR every page with tesseract, ask an LLM \
to structure the text into JSON and save the result. Replies wrapped in prose are recovered \
when they contain a single JSON object.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the JSON result here. Default: `<input stem>.json`.
    #[arg(short, long, env = "TARIFF_OUTPUT")]
    output: Option<PathBuf>,

    /// Also write the OCR text to this file.
    #[arg(long, env = "TARIFF_TEXT_OUTPUT")]
    text_output: Option<PathBuf>,

    /// LLM model ID.
    #[arg(long, env = "TARIFF_MODEL", default_value = tariff_extract::config::DEFAULT_MODEL)]
    model: String,

    /// LLM provider: openai, anthropic, gemini, mistral, openrouter, ollama.
    #[arg(long, env = "TARIFF_PROVIDER", default_value = tariff_extract::config::DEFAULT_PROVIDER)]
    provider: String,

    /// Rendering DPI (72–400).
    #[arg(long, env = "TARIFF_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Tesseract language(s), e.g. eng or eng+hin.
    #[arg(long, env = "TARIFF_OCR_LANG", default_value = "eng")]
    lang: String,

    /// Tesseract page segmentation mode (0–13).
    #[arg(long, env = "TARIFF_OCR_PSM", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=13))]
    psm: u8,

    /// Tesseract binary.
    #[arg(long, env = "TARIFF_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TARIFF_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "TARIFF_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM call timeout in seconds.
    #[arg(long, env = "TARIFF_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "TARIFF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "TARIFF_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Write `{}` even when nothing was extracted.
    #[arg(long, env = "TARIFF_WRITE_EMPTY")]
    write_empty: bool,

    /// Print the full ExtractionOutput as JSON on stdout instead of saving.
    #[arg(long, env = "TARIFF_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "TARIFF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TARIFF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TARIFF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.verbose;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // ── Ensure PDFium engine is available ────────────────────────────────
    ensure_pdfium(cli.quiet)?;

    // ── Build extractor ──────────────────────────────────────────────────
    let config = build_config(&cli).await?;
    let mut extractor =
        TariffExtractor::from_config(config.clone()).context("Failed to set up the model client")?;

    let progress = show_progress.then(CliProgressCallback::new);
    if let Some(ref cb) = progress {
        extractor = extractor.with_progress(Arc::clone(cb) as ProgressCallback);
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let result = extractor.extract(&cli.input).await;
    if let Some(ref cb) = progress {
        cb.finish();
    }
    let output = result.with_context(|| format!("Extraction failed for {}", cli.input))?;

    if let Some(ref path) = cli.text_output {
        tokio::fs::write(path, &output.text)
            .await
            .with_context(|| format!("Failed to write OCR text to {}", path.display()))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
        return finish(&output);
    }

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&cli.input));
    let written = sink::persist(&output.result, &output_path, config.empty_result)
        .await
        .context("Failed to save results")?;

    if !cli.quiet {
        print_summary(&output, written.then_some(output_path.as_path()));
    }
    finish(&output)
}

fn ensure_pdfium(quiet: bool) -> Result<()> {
    if pdfium_auto::is_pdfium_cached() {
        return Ok(());
    }
    if quiet {
        return tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .map(|_| ())
            .context("Failed to download PDFium engine");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {bytes}/{total_bytes}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS),
    );
    dl_bar.set_prefix("PDF engine");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    tokio::task::block_in_place(|| {
        pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download PDFium engine")?;
    dl_bar.finish_and_clear();
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .model(cli.model.clone())
        .provider_name(cli.provider.clone())
        .dpi(cli.dpi)
        .ocr_language(cli.lang.clone())
        .page_segmentation_mode(cli.psm)
        .tesseract_cmd(cli.tesseract.clone())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .empty_result(if cli.write_empty {
            EmptyResultPolicy::WriteEmpty
        } else {
            EmptyResultPolicy::Skip
        });

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

/// `reports/Chennai-CFS.pdf` → `Chennai-CFS.json` in the working directory.
fn default_output_path(input: &str) -> PathBuf {
    let last = input
        .split(['?', '#'])
        .next()
        .unwrap_or(input)
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("");
    let stem = Path::new(last)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("tariffs");
    PathBuf::from(format!("{stem}.json"))
}

fn print_summary(output: &ExtractionOutput, written: Option<&Path>) {
    let stats = &output.stats;
    match (written, &output.failure) {
        (Some(path), None) => eprintln!(
            "{}  {} records from {} pages  {}ms  →  {}",
            green("✔"),
            output.result.records().len(),
            stats.page_count,
            stats.total_duration_ms,
            bold(&path.display().to_string()),
        ),
        (Some(path), Some(_)) => eprintln!(
            "{}  empty result written to {}",
            yellow("⚠"),
            bold(&path.display().to_string())
        ),
        (None, _) => eprintln!("{}  Nothing extracted. No data saved.", yellow("⚠")),
    }
    if let Some(mode) = stats.parse_mode {
        eprintln!(
            "   {} chars OCR  /  {} tokens in  /  {} tokens out  /  {:?} parse",
            dim(&stats.text_chars.to_string()),
            dim(&stats.input_tokens.to_string()),
            dim(&stats.output_tokens.to_string()),
            mode,
        );
    }
}

/// A degraded run is reported, not raised: the diagnostic goes to stderr and
/// the process still exits 0.
fn finish(output: &ExtractionOutput) -> Result<()> {
    if let Some(ref failure) = output.failure {
        eprintln!("{} {}", yellow("⚠"), failure);
    }
    Ok(())
}
