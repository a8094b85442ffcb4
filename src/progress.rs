//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::extract::TariffExtractor::with_progress`] to be told when each
//! stage starts and finishes. The batch CLI drives a spinner from it; a host
//! application could forward the events to a channel or a job record.
//!
//! # Example
//!
//! ```rust
//! use tariff_extract::{ExtractionProgressCallback, Stage};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Log(Mutex<Vec<Stage>>);
//!
//! impl ExtractionProgressCallback for Log {
//!     fn on_stage_start(&self, stage: Stage) {
//!         self.0.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let log = Log::default();
//! log.on_stage_start(Stage::Ocr);
//! assert_eq!(*log.0.lock().unwrap(), vec![Stage::Ocr]);
//! ```

use std::fmt;
use std::sync::Arc;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Render,
    Ocr,
    Request,
    Parse,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Render => "Rasterising pages",
            Stage::Ocr => "Running OCR",
            Stage::Request => "Asking the model",
            Stage::Parse => "Parsing response",
        };
        f.write_str(label)
    }
}

/// Called by the runner as it moves through the pipeline.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called before a stage begins.
    fn on_stage_start(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after the rasterizer reports the page count.
    fn on_pages_rendered(&self, page_count: usize) {
        let _ = page_count;
    }

    /// Called when a stage finishes, successfully or not.
    ///
    /// # Arguments
    /// * `stage`  : the finished stage
    /// * `success`: `false` when the stage degraded the run to an empty result
    fn on_stage_complete(&self, stage: Stage, success: bool) {
        let _ = (stage, success);
    }
}

/// Type alias for a shared callback.
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

/// A callback that ignores every event.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}
