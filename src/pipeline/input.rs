//! Input resolution: turn a path, URL or uploaded body into a local PDF file.
//!
//! pdfium needs a file-system path. URL downloads and service uploads are
//! written into a per-call `TempDir`, which lives inside the returned
//! [`SourceDocument`] so the scratch file disappears once the run is over and
//! concurrent requests never share one. The `%PDF` magic bytes are checked
//! before returning so callers get a meaningful error rather than a pdfium
//! crash.

use crate::error::TariffError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A PDF on disk, ready to be rasterised.
#[derive(Debug)]
pub enum SourceDocument {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF was downloaded to a temp directory.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
    /// Input arrived as bytes (service upload); written to a temp directory.
    Uploaded { path: PathBuf, _temp_dir: TempDir },
}

impl SourceDocument {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            SourceDocument::Local(p) => p,
            SourceDocument::Downloaded { path, .. } => path,
            SourceDocument::Uploaded { path, .. } => path,
        }
    }

    /// Persist uploaded bytes to a private scratch file.
    ///
    /// `file_name` is only used to name the scratch file; anything that could
    /// escape the temp directory is stripped.
    pub fn from_bytes(bytes: &[u8], file_name: Option<&str>) -> Result<Self, TariffError> {
        let name = file_name
            .map(sanitize_file_name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "upload.pdf".to_string());

        let temp_dir = TempDir::new().map_err(|e| TariffError::Internal(format!("tempdir: {e}")))?;
        let path = temp_dir.path().join(&name);

        check_magic(&path, bytes)?;
        std::fs::write(&path, bytes)
            .map_err(|e| TariffError::Internal(format!("Failed to write upload: {e}")))?;

        debug!("Upload stored at {} ({} bytes)", path.display(), bytes.len());
        Ok(SourceDocument::Uploaded {
            path,
            _temp_dir: temp_dir,
        })
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file.
///
/// URLs are downloaded to a temporary directory; local paths are checked for
/// existence, read permission and PDF magic bytes.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<SourceDocument, TariffError> {
    if input.trim().is_empty() {
        return Err(TariffError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<SourceDocument, TariffError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(TariffError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(PDF_MAGIC.len());
            f.take(PDF_MAGIC.len() as u64)
                .read_to_end(&mut head)
                .map_err(|_| TariffError::FileNotFound { path: path.clone() })?;
            check_magic(&path, &head)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(TariffError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(TariffError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(SourceDocument::Local(path))
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, TariffError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TariffError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            TariffError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            TariffError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(TariffError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| TariffError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let temp_dir = TempDir::new().map_err(|e| TariffError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(filename_from_url(url));

    check_magic(&path, &bytes)?;
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| TariffError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", path.display());
    Ok(SourceDocument::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

fn check_magic(path: &Path, head: &[u8]) -> Result<(), TariffError> {
    if head.len() < PDF_MAGIC.len() || &head[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(TariffError::NotAPdf {
            path: path.to_path_buf(),
            magic: head.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

/// Last path segment of the URL when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .map(|last| sanitize_file_name(&last))
        .filter(|last| last.contains('.'))
        .unwrap_or_else(|| "downloaded.pdf".to_string())
}

/// Keep only the final path component and drop characters that are awkward
/// in file names.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    base.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect::<String>()
        .trim()
        .trim_start_matches('.')
        .to_string()
}
