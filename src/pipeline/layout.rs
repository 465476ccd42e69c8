//! On-disk naming of every artifact a batch produces.
//!
//! ```text
//! <root>/<stem>_chunks/chunk_001.pdf               chunk sub-document
//! <root>/<stem>_chunks/chunk_001_output.zip        fetched job output
//! <root>/<stem>_chunks/chunk_001_extracted/        unpacked job output
//! <root>/<stem>_merged.<fmt>                       merged result (html, md)
//! <root>/<stem>_outputs/chunk_001.json             per-chunk result (json)
//! <root>/<stem>_output.<fmt>                       short-circuit result
//! <root>/<stem>_output.zip, <stem>_extracted/      short-circuit intermediates
//! ```

use crate::config::OutputFormat;
use crate::output::Chunk;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Path scheme rooted at one directory and named after the document stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    root: PathBuf,
    stem: String,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            stem: stem.into(),
        }
    }

    /// Layout for `document`, rooted at `root` or, if None, at the document's
    /// own directory.
    pub fn for_document(document: &Path, root: Option<&Path>) -> Self {
        let stem = document
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let root = match root {
            Some(r) => r.to_path_buf(),
            None => document
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };
        Self::new(root, stem)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    pub fn chunk_dir(&self) -> PathBuf {
        self.root.join(format!("{}_chunks", self.stem))
    }

    pub fn chunk_file_name(index: usize) -> String {
        format!("chunk_{index:03}.pdf")
    }

    pub fn merged_path(&self, format: OutputFormat) -> PathBuf {
        self.root
            .join(format!("{}_merged.{}", self.stem, format.extension()))
    }

    pub fn output_path(&self, format: OutputFormat) -> PathBuf {
        self.root
            .join(format!("{}_output.{}", self.stem, format.extension()))
    }

    /// Directory receiving per-chunk artifacts of unmergeable formats.
    pub fn per_chunk_dir(&self) -> PathBuf {
        self.root.join(format!("{}_outputs", self.stem))
    }

    pub fn per_chunk_path(&self, index: usize, format: OutputFormat) -> PathBuf {
        self.per_chunk_dir()
            .join(format!("chunk_{index:03}.{}", format.extension()))
    }

    /// Chunk record for the `index`-th split sub-document.
    pub fn chunk(&self, index: usize, pages: Range<usize>) -> Chunk {
        let dir = self.chunk_dir();
        with_work_paths(index, pages, dir.join(Self::chunk_file_name(index)), &format!("chunk_{index:03}"), &dir)
    }

    /// Chunk record for the short-circuit path: the whole, unsplit document.
    pub fn whole_document(&self, document: &Path, page_count: usize) -> Chunk {
        with_work_paths(1, 0..page_count, document.to_path_buf(), &self.stem, &self.root)
    }
}

/// Archive and extract paths live in `dir`, named after `stem`.
fn with_work_paths(index: usize, pages: Range<usize>, path: PathBuf, stem: &str, dir: &Path) -> Chunk {
    Chunk {
        index,
        pages,
        archive_path: dir.join(format!("{stem}_output.zip")),
        extract_dir: dir.join(format!("{stem}_extracted")),
        path,
    }
}
