//! Pipeline stages for batch document digitization.
//!
//! Each submodule implements one step, so each is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ split ──▶ process (×N, concurrent) ──▶ merge ──▶ cleanup
//! (URL/path) (lopdf)   create/upload/start/         (html/md)
//!                      poll/fetch + unpack
//! ```
//!
//! 1. [`input`]: canonicalise the user-supplied path or URL to a local PDF
//! 2. [`split`]: count pages and cut page-bounded chunk PDFs; runs in
//!    `spawn_blocking` because lopdf is synchronous
//! 3. [`process`]: drive one chunk's remote job to a terminal state; the
//!    only stage with network I/O
//! 4. [`unpack`]: persist and extract fetched job outputs
//! 5. [`merge`]: rebuild one document from successful chunks in order
//! 6. [`cleanup`]: remove intermediates once the result is final
//!
//! [`layout`] names every artifact on disk.

pub mod cleanup;
pub mod input;
pub mod layout;
pub mod merge;
pub mod process;
pub mod split;
pub mod unpack;
