//! Persist a finished job's outputs and unpack them into the chunk's
//! extract directory.
//!
//! Zip entries (by name or by `PK\x03\x04` magic) are saved next to the chunk
//! and extracted; any other file is written straight into the extract
//! directory. The result is then classified by extension so the processor can
//! pick the artifact of the requested format.

use crate::client::JobOutputs;
use crate::output::ExtractedFiles;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// What was written to disk, plus whether unpacking succeeded.
///
/// `archives` is filled even on failure so cleanup can find partial writes.
#[derive(Debug)]
pub struct UnpackReport {
    pub archives: Vec<PathBuf>,
    pub result: Result<ExtractedFiles, String>,
}

/// Write and extract `outputs`. Runs on the blocking pool.
pub async fn unpack_outputs(outputs: JobOutputs, archive_path: &Path, extract_dir: &Path) -> UnpackReport {
    let archive_path = archive_path.to_path_buf();
    let extract_dir = extract_dir.to_path_buf();

    match tokio::task::spawn_blocking(move || unpack_blocking(outputs, &archive_path, &extract_dir)).await {
        Ok(report) => report,
        Err(e) => UnpackReport {
            archives: Vec::new(),
            result: Err(format!("unpack task panicked: {e}")),
        },
    }
}

fn unpack_blocking(outputs: JobOutputs, archive_path: &Path, extract_dir: &Path) -> UnpackReport {
    let mut archives = Vec::new();
    let result = write_all(outputs, archive_path, extract_dir, &mut archives)
        .and_then(|()| classify(extract_dir))
        .map_err(|e| e.to_string());
    UnpackReport { archives, result }
}

fn write_all(
    outputs: JobOutputs,
    archive_path: &Path,
    extract_dir: &Path,
    archives: &mut Vec<PathBuf>,
) -> io::Result<()> {
    std::fs::create_dir_all(extract_dir)?;

    for (position, (name, bytes)) in outputs.into_iter().enumerate() {
        if is_zip(&name, &bytes) {
            let path = nth_archive_path(archive_path, archives.len());
            std::fs::write(&path, &bytes)?;
            archives.push(path.clone());
            extract_zip(&path, extract_dir)?;
            debug!("Extracted {} → {}", path.display(), extract_dir.display());
        } else {
            let file_name = Path::new(&name)
                .file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_else(|| format!("output_{position}").into());
            std::fs::write(extract_dir.join(file_name), &bytes)?;
        }
    }
    Ok(())
}

fn is_zip(name: &str, bytes: &[u8]) -> bool {
    name.to_ascii_lowercase().ends_with(".zip") || bytes.starts_with(ZIP_MAGIC)
}

/// `chunk_001_output.zip`, then `chunk_001_output_2.zip`, …
fn nth_archive_path(base: &Path, existing: usize) -> PathBuf {
    if existing == 0 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    base.with_file_name(format!("{stem}_{}.zip", existing + 1))
}

fn extract_zip(archive: &Path, dest: &Path) -> io::Result<()> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    // `extract` rejects entries that would escape `dest`.
    zip.extract(dest)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Recursively list `dir` and group files by extension.
pub fn classify(dir: &Path) -> io::Result<ExtractedFiles> {
    let mut all = Vec::new();
    collect_files(dir, &mut all)?;
    all.sort();

    let mut files = ExtractedFiles::default();
    for path in all {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "html" | "htm" => files.html.push(path),
            "md" | "markdown" => files.markdown.push(path),
            "json" => files.json.push(path),
            _ => files.other.push(path),
        }
    }
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
