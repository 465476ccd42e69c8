//! Merger: rebuild one document from the successful chunks, in sequence order.
//!
//! ## Markdown
//!
//! Each chunk becomes a section opened by a `<!-- Chunk N -->` marker, where
//! `N` is the chunk's sequence index (so gaps left by failed chunks stay
//! visible), and sections are joined by a horizontal rule.
//!
//! ## HTML
//!
//! Every chunk is a full HTML document with its own `<head>`. The merged
//! document takes the `<style>` blocks of the first included chunk, then the
//! `<body>` interior of every chunk, separated by page-break markers. A chunk
//! without a recognisable `<body>` is skipped and reported, never fatal.
//!
//! JSON has no merge rule and is rejected with
//! [`BatchError::UnsupportedMerge`].

use crate::config::OutputFormat;
use crate::error::BatchError;
use crate::output::{ChunkOutcome, MergeSkip, MergedDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Separator placed between two Markdown sections.
pub const MARKDOWN_SEPARATOR: &str = "\n\n---\n\n";

/// Separator placed between two HTML bodies.
pub const PAGE_BREAK: &str = r#"<div class="page-break"></div>"#;

const PAGE_BREAK_STYLE: &str =
    ".page-break { page-break-after: always; margin: 40px 0; border-bottom: 1px dashed #ccc; }";

static RE_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style>").unwrap());
static RE_BODY_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<body\b[^>]*>").unwrap());

/// Merge the artifacts of `outcomes` into one document.
///
/// Failed outcomes are ignored. Successful ones are read in ascending
/// sequence-index order regardless of the order they are passed in. An
/// artifact that cannot be read becomes a [`MergeSkip`].
///
/// `title` is used for the HTML `<title>`; `language` for `<html lang>`.
pub async fn merge(
    outcomes: &[ChunkOutcome],
    format: OutputFormat,
    language: &str,
    title: &str,
) -> Result<MergedDocument, BatchError> {
    if !format.is_mergeable() {
        return Err(BatchError::UnsupportedMerge { format });
    }

    let mut successful: Vec<&ChunkOutcome> = outcomes.iter().filter(|o| o.is_success()).collect();
    successful.sort_by_key(|o| o.index);

    let mut sections = Vec::with_capacity(successful.len());
    let mut unreadable = Vec::new();
    for outcome in successful {
        let Some(path) = outcome.artifact() else {
            continue;
        };
        match tokio::fs::read_to_string(path).await {
            Ok(content) => sections.push((outcome.index, content)),
            Err(e) => {
                warn!("Chunk {}: cannot read {}: {}", outcome.index, path.display(), e);
                unreadable.push(MergeSkip {
                    index: outcome.index,
                    reason: format!("cannot read {}: {}", path.display(), e),
                });
            }
        }
    }

    let mut merged = match format {
        OutputFormat::Markdown => merge_markdown(&sections),
        OutputFormat::Html => merge_html(&sections, language, title),
        OutputFormat::Json => return Err(BatchError::UnsupportedMerge { format }),
    };
    merged.skipped.extend(unreadable);
    merged.skipped.sort_by_key(|s| s.index);

    debug!(
        "Merged {} chunks into {} bytes of {} ({} skipped)",
        merged.chunk_indices.len(),
        merged.content.len(),
        format,
        merged.skipped.len()
    );
    Ok(merged)
}

/// Join Markdown sections, each labelled with its sequence index.
///
/// Section text is copied verbatim. `sections` must already be in sequence
/// order.
pub fn merge_markdown(sections: &[(usize, String)]) -> MergedDocument {
    let content = sections
        .iter()
        .map(|(index, text)| format!("<!-- Chunk {} -->\n\n{}", index, text))
        .collect::<Vec<_>>()
        .join(MARKDOWN_SEPARATOR);

    MergedDocument {
        format: OutputFormat::Markdown,
        content,
        chunk_indices: sections.iter().map(|(i, _)| *i).collect(),
        skipped: Vec::new(),
    }
}

/// Combine HTML chunk documents into one page.
///
/// `sections` must already be in sequence order.
pub fn merge_html(sections: &[(usize, String)], language: &str, title: &str) -> MergedDocument {
    let mut bodies = Vec::with_capacity(sections.len());
    let mut chunk_indices = Vec::with_capacity(sections.len());
    let mut skipped = Vec::new();
    let mut styles: Option<String> = None;

    for (index, html) in sections {
        // Styling comes from the first section even when its body is unusable.
        if styles.is_none() {
            styles = Some(extract_styles(html));
        }
        let Some(body) = body_interior(html) else {
            warn!("Chunk {}: HTML has no <body>, skipped from merge", index);
            skipped.push(MergeSkip {
                index: *index,
                reason: "no <body> element".to_string(),
            });
            continue;
        };
        bodies.push(body.trim());
        chunk_indices.push(*index);
    }

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!("<html lang=\"{}\">\n", escape(language)));
    out.push_str("<head>\n<meta charset=\"UTF-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    out.push_str(&format!("<title>{}</title>\n", escape(title)));
    if let Some(css) = styles.filter(|s| !s.is_empty()) {
        out.push_str(&css);
        out.push('\n');
    }
    out.push_str(&format!("<style>\n{}\n</style>\n", PAGE_BREAK_STYLE));
    out.push_str("</head>\n<body>\n");
    out.push_str(&bodies.join(&format!("\n{}\n", PAGE_BREAK)));
    out.push_str("\n</body>\n</html>\n");

    MergedDocument {
        format: OutputFormat::Html,
        content: out,
        chunk_indices,
        skipped,
    }
}

/// Text between the `<body ...>` open tag and the last `</body>`.
fn body_interior(html: &str) -> Option<&str> {
    let open = RE_BODY_OPEN.find(html)?;
    // ASCII lowercasing keeps byte offsets aligned with `html`.
    let close = html.to_ascii_lowercase().rfind("</body>")?;
    (close >= open.end()).then(|| &html[open.end()..close])
}

fn extract_styles(html: &str) -> String {
    RE_STYLE
        .find_iter(html)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
