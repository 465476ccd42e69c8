//! Input resolution: turn a user-supplied path or URL into a local PDF.
//!
//! The splitter and the upload step both need a real file. A URL is fetched
//! into a [`TempDir`] that lives as long as the [`ResolvedInput`], so the
//! download disappears with it. Both paths check the `%PDF` magic bytes before
//! anything else touches the file.

use crate::error::BatchError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A source document available on the local file system.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was a local file.
    Local(PathBuf),
    /// Input was a URL; the document was downloaded into `_temp_dir`.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// True when the file lives in a temporary download directory.
    pub fn is_downloaded(&self) -> bool {
        matches!(self, ResolvedInput::Downloaded { .. })
    }
}

pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve `input` to a local, magic-checked PDF.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, BatchError> {
    if input.trim().is_empty() {
        return Err(BatchError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download(input, timeout_secs).await
    } else {
        resolve_local(Path::new(input))
    }
}

fn resolve_local(path: &Path) -> Result<ResolvedInput, BatchError> {
    let path = path.to_path_buf();
    if !path.is_file() {
        return Err(BatchError::FileNotFound { path });
    }

    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    match std::fs::File::open(&path) {
        Ok(f) => {
            // A read error here surfaces later as a corrupt document.
            let _ = f.take(PDF_MAGIC.len() as u64).read_to_end(&mut head);
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BatchError::PermissionDenied { path });
        }
        Err(_) => return Err(BatchError::FileNotFound { path }),
    }
    check_magic(&path, &head)?;

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

fn check_magic(path: &Path, head: &[u8]) -> Result<(), BatchError> {
    if head.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = head.len().min(4);
    magic[..n].copy_from_slice(&head[..n]);
    Err(BatchError::NotAPdf {
        path: path.to_path_buf(),
        magic,
    })
}

async fn download(url: &str, timeout_secs: u64) -> Result<ResolvedInput, BatchError> {
    info!("Downloading PDF from: {}", url);
    let failed = |reason: String| BatchError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            BatchError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;
    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    let temp_dir = TempDir::new().map_err(|e| BatchError::Internal(e.to_string()))?;
    let path = temp_dir.path().join(file_name_from_url(url));
    check_magic(&path, &bytes)?;

    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| BatchError::Internal(format!("Failed to write downloaded PDF: {}", e)))?;
    info!("Downloaded {} bytes to {}", bytes.len(), path.display());

    Ok(ResolvedInput::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

/// Last path segment of `url`, forced to a `.pdf` extension.
///
/// The stem names every persisted artifact, so it must be stable.
fn file_name_from_url(url: &str) -> String {
    let last = reqwest::Url::parse(url).ok().and_then(|u| {
        u.path_segments()
            .and_then(|mut s| s.next_back().map(str::to_string))
            .filter(|s| !s.is_empty())
    });
    match last {
        Some(name) if name.to_ascii_lowercase().ends_with(".pdf") => name,
        Some(name) => format!("{name}.pdf"),
        None => "downloaded.pdf".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_detection() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
    }

    #[test]
    fn file_names_from_urls() {
        assert_eq!(file_name_from_url("https://x.org/a/report.pdf"), "report.pdf");
        assert_eq!(file_name_from_url("https://x.org/a/report?x=1"), "report.pdf");
        assert_eq!(file_name_from_url("https://x.org/"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn missing_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, BatchError::FileNotFound { .. }));
        assert!(err.is_invalid_input());
    }

    #[tokio::test]
    async fn empty_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn wrong_magic_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("notes.pdf");
        std::fs::write(&p, b"hello world").unwrap();

        match resolve_input(p.to_str().unwrap(), 5).await.unwrap_err() {
            BatchError::NotAPdf { magic, .. } => assert_eq!(&magic, b"hell"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn short_file_is_not_a_pdf() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("tiny.pdf");
        std::fs::write(&p, b"%P").unwrap();
        let err = resolve_input(p.to_str().unwrap(), 5).await.unwrap_err();
        assert!(matches!(err, BatchError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn local_pdf_header_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("ok.pdf");
        std::fs::write(&p, b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(p.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.path(), p.as_path());
        assert!(!resolved.is_downloaded());
    }
}
