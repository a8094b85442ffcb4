//! Result sink: write the extraction result as indented JSON.
//!
//! Writes go to a uniquely named temp file beside the target that is then
//! renamed over it, so a crash mid-write never leaves a truncated artifact.
//! The target is always overwritten in full; prior contents are never merged.
//! Parent directories are not created here: a missing directory is an error
//! the caller gets to see.

use crate::config::EmptyResultPolicy;
use crate::error::TariffError;
use crate::output::ExtractionResult;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{info, warn};

/// Serialise a result with four-space indentation and a trailing newline.
pub fn to_pretty_json(result: &ExtractionResult) -> Result<Vec<u8>, TariffError> {
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    result
        .serialize(&mut ser)
        .map_err(|e| TariffError::Internal(format!("Failed to serialise result: {e}")))?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write `result` to `path`, replacing whatever was there.
///
/// Every call writes through its own uniquely named temp file in the target's
/// directory, so concurrent saves to one path never share scratch state; the
/// last rename wins.
pub async fn save_results(result: &ExtractionResult, path: &Path) -> Result<(), TariffError> {
    let bytes = to_pretty_json(result)?;
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || write_atomically(&target, &bytes))
        .await
        .map_err(|e| TariffError::Internal(format!("Write task panicked: {e}")))??;

    info!("Saved {} top-level keys to {}", result.len(), path.display());
    Ok(())
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), TariffError> {
    let write_err = |source| TariffError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    // Dropping the temp file on any error below removes it.
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.flush().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

/// Apply the empty-result policy, then save.
///
/// Returns `true` when a file was written.
pub async fn persist(
    result: &ExtractionResult,
    path: &Path,
    policy: EmptyResultPolicy,
) -> Result<bool, TariffError> {
    if result.is_empty() && policy == EmptyResultPolicy::Skip {
        warn!("Nothing extracted. No data saved to {}", path.display());
        return Ok(false);
    }
    save_results(result, path).await?;
    Ok(true)
}
