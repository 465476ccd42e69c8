//! Splitter: partition a PDF into page-bounded sub-documents.
//!
//! ## Why lopdf?
//!
//! Splitting is pure object-graph surgery: clone the document, delete the
//! pages outside the window, drop unreachable objects, save. lopdf does this
//! in pure Rust, so no native PDF engine is needed just to cut pages.
//!
//! Parsing and writing are CPU-bound and synchronous, so both run inside
//! `spawn_blocking` to keep the async workers free.

use crate::error::BatchError;
use crate::output::Chunk;
use crate::pipeline::layout::ArtifactLayout;
use lopdf::Document;
use std::ops::Range;
use std::path::Path;
use tracing::{debug, info};

/// Page windows of at most `max_pages` pages covering `[0, total_pages)`.
///
/// Every window holds exactly `max_pages` pages except the last, which holds
/// the remainder. Produces `ceil(total_pages / max_pages)` windows.
pub fn plan_chunks(total_pages: usize, max_pages: usize) -> Vec<Range<usize>> {
    debug_assert!(max_pages >= 1, "max_pages must be at least 1");
    let max_pages = max_pages.max(1);
    (0..total_pages)
        .step_by(max_pages)
        .map(|start| start..(start + max_pages).min(total_pages))
        .collect()
}

/// True when the document fits in one job and must not be split.
pub fn fits_single_job(total_pages: usize, max_pages: usize) -> bool {
    total_pages <= max_pages
}

/// Count the pages of a PDF.
///
/// # Errors
/// [`BatchError::CorruptPdf`] if the file does not parse,
/// [`BatchError::EmptyDocument`] if it has no pages.
pub async fn page_count(pdf_path: &Path) -> Result<usize, BatchError> {
    let path = pdf_path.to_path_buf();
    tokio::task::spawn_blocking(move || load(&path).map(|(_, pages)| pages))
        .await
        .map_err(|e| BatchError::Internal(format!("Page count task panicked: {}", e)))?
}

/// Split `pdf_path` into chunk files under `layout.chunk_dir()`.
///
/// The chunk directory is created if needed. Chunks are returned in
/// ascending sequence order; each is on disk before this returns.
pub async fn split_document(
    pdf_path: &Path,
    layout: &ArtifactLayout,
    max_pages: usize,
) -> Result<Vec<Chunk>, BatchError> {
    let path = pdf_path.to_path_buf();
    let layout = layout.clone();

    tokio::task::spawn_blocking(move || split_blocking(&path, &layout, max_pages))
        .await
        .map_err(|e| BatchError::Internal(format!("Split task panicked: {}", e)))?
}

fn load(pdf_path: &Path) -> Result<(Document, usize), BatchError> {
    let document = Document::load(pdf_path).map_err(|e| BatchError::CorruptPdf {
        path: pdf_path.to_path_buf(),
        detail: e.to_string(),
    })?;
    let pages = document.get_pages().len();
    if pages == 0 {
        return Err(BatchError::EmptyDocument {
            path: pdf_path.to_path_buf(),
        });
    }
    Ok((document, pages))
}

/// Blocking implementation of [`split_document`].
fn split_blocking(
    pdf_path: &Path,
    layout: &ArtifactLayout,
    max_pages: usize,
) -> Result<Vec<Chunk>, BatchError> {
    let (document, total_pages) = load(pdf_path)?;
    let windows = plan_chunks(total_pages, max_pages);
    info!(
        "Splitting {} ({} pages) into {} chunks of ≤{} pages",
        pdf_path.display(),
        total_pages,
        windows.len(),
        max_pages
    );

    let chunk_dir = layout.chunk_dir();
    std::fs::create_dir_all(&chunk_dir).map_err(|e| BatchError::SplitFailed {
        path: pdf_path.to_path_buf(),
        index: 0,
        detail: format!("cannot create {}: {}", chunk_dir.display(), e),
    })?;

    // Page numbers in document order (BTreeMap keys are 1-based and sorted).
    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();

    let mut chunks = Vec::with_capacity(windows.len());
    for (i, window) in windows.into_iter().enumerate() {
        let chunk = layout.chunk(i + 1, window);
        write_chunk(&document, &page_numbers, &chunk).map_err(|detail| {
            BatchError::SplitFailed {
                path: pdf_path.to_path_buf(),
                index: chunk.index,
                detail,
            }
        })?;
        debug!(
            "Chunk {}: pages {}-{} → {}",
            chunk.index,
            chunk.pages.start + 1,
            chunk.pages.end,
            chunk.path.display()
        );
        chunks.push(chunk);
    }

    Ok(chunks)
}

/// Save a copy of `source` that keeps only the chunk's pages.
fn write_chunk(source: &Document, page_numbers: &[u32], chunk: &Chunk) -> Result<(), String> {
    let outside: Vec<u32> = page_numbers
        .iter()
        .enumerate()
        .filter(|(pos, _)| !chunk.pages.contains(pos))
        .map(|(_, number)| *number)
        .collect();

    let mut part = source.clone();
    part.delete_pages(&outside);
    part.prune_objects();
    part.save(&chunk.path).map_err(|e| e.to_string())?;
    Ok(())
}
