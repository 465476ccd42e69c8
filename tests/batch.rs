//! Orchestrator tests against the scripted job service.
//!
//! Every test builds real PDFs with lopdf inside a temp dir and drives
//! `run_batch` end to end. No network access.

mod common;

use common::{write_pdf, FakeJobClient, Script};
use docintel_batch::{
    pipeline::cleanup::cleanup, plan, run_batch, BatchArtifact, BatchConfig, BatchError,
    BatchProgressCallback, BatchStatus, ChunkError, JobState, JobStep, OutputFormat,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_test::{assert_err, assert_ok};

fn config(format: OutputFormat) -> BatchConfig {
    BatchConfig::builder()
        .output_format(format)
        .max_pages_per_chunk(5)
        .poll_interval_ms(1)
        .max_poll_attempts(10)
        .concurrency(3)
        .build()
        .unwrap()
}

fn input(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn section_count(markdown: &str) -> usize {
    markdown.matches("<!-- Chunk ").count()
}

#[tokio::test]
async fn twelve_page_plan_is_five_five_two() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);

    let plan = assert_ok!(plan(input(&pdf), 5).await);
    assert_eq!(plan.page_count, 12);
    assert!(!plan.short_circuit);
    let sizes: Vec<usize> = plan.chunks.iter().map(|r| r.len()).collect();
    assert_eq!(sizes, vec![5, 5, 2]);
}

#[tokio::test]
async fn all_chunks_succeed_and_merge_in_order() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new());

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Markdown), client.clone()).await);

    assert_eq!(result.status, BatchStatus::AllSucceeded);
    assert!(!result.short_circuit);
    assert_eq!(result.outcomes.len(), 3);
    let pages: Vec<usize> = result.outcomes.iter().map(|o| o.pages.len()).collect();
    assert_eq!(pages, vec![5, 5, 2]);
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 3);

    let merged = result.merged_path().expect("merged path");
    assert_eq!(merged, tmp.path().join("report_merged.md"));
    let text = std::fs::read_to_string(merged).unwrap();
    assert_eq!(section_count(&text), 3);
    let a = text.find("Text of chunk_001").unwrap();
    let b = text.find("Text of chunk_002").unwrap();
    let c = text.find("Text of chunk_003").unwrap();
    assert!(a < b && b < c);

    // Default cleanup removes the chunk directory entirely.
    assert!(!tmp.path().join("report_chunks").exists());
    assert!(pdf.exists());
    assert_eq!(result.stats.total_pages, 12);
    assert_eq!(result.stats.succeeded_chunks, 3);
}

#[tokio::test]
async fn middle_chunk_failure_yields_partial_merge() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new().script("chunk_002", Script::failing_at(JobStep::Upload)));

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Markdown), client).await);

    assert_eq!(
        result.status,
        BatchStatus::PartialFailure {
            failed_chunks: vec![2]
        }
    );
    let failed: Vec<usize> = result.failures().map(|o| o.index).collect();
    assert_eq!(failed, vec![2]);
    match result.outcomes[1].error() {
        Some(ChunkError::Remote { step, .. }) => assert_eq!(*step, JobStep::Upload),
        other => panic!("unexpected chunk 2 outcome: {other:?}"),
    }

    let text = std::fs::read_to_string(result.merged_path().unwrap()).unwrap();
    assert_eq!(section_count(&text), 2);
    assert_eq!(text.matches("\n\n---\n\n").count(), 1);
    let one = text.find("<!-- Chunk 1 -->").unwrap();
    let three = text.find("<!-- Chunk 3 -->").unwrap();
    assert!(one < three);
    assert!(!text.contains("chunk_002"));

    let err = assert_err!(result.into_result());
    assert!(matches!(err, BatchError::PartialFailure { .. }));
}

#[tokio::test]
async fn every_chunk_failing_is_total_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::with_default(Script::job_failed()));

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Markdown), client).await);

    assert_eq!(result.status, BatchStatus::TotalFailure);
    assert_eq!(result.artifact, BatchArtifact::None);
    assert!(result.merged_path().is_none());
    assert!(!tmp.path().join("report_merged.md").exists());
    assert!(result
        .outcomes
        .iter()
        .all(|o| matches!(o.error(), Some(ChunkError::JobFailed { .. }))));

    let err = assert_err!(result.into_result());
    assert!(matches!(err, BatchError::AllChunksFailed { total: 3, .. }));
}

#[tokio::test]
async fn small_document_takes_single_job_path() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "memo.pdf", 4);
    let client = Arc::new(FakeJobClient::new());

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Markdown), client.clone()).await);

    assert!(result.short_circuit);
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.upload_calls.load(Ordering::SeqCst), 1);
    assert!(!tmp.path().join("memo_chunks").exists());

    let out = tmp.path().join("memo_output.md");
    assert_eq!(result.artifact, BatchArtifact::Single(out.clone()));
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("Text of memo."));
    assert_eq!(section_count(&text), 0, "single-job output is not re-labelled");

    assert!(pdf.exists(), "source document is never removed");
    assert!(!tmp.path().join("memo_extracted").exists());
    assert!(!tmp.path().join("memo_output.zip").exists());
}

#[tokio::test]
async fn exactly_max_pages_is_not_split() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "five.pdf", 5);
    let client = Arc::new(FakeJobClient::new());

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Html), client.clone()).await);
    assert!(result.short_circuit);
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.output_path(), Some(tmp.path().join("five_output.html").as_path()));
}

#[tokio::test]
async fn out_of_order_completion_keeps_page_order() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(
        FakeJobClient::new()
            .script("chunk_001", Script::delayed(200))
            .script("chunk_002", Script::delayed(100)),
    );

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Markdown), client.clone()).await);

    let order = client.fetch_order.lock().unwrap().clone();
    assert_eq!(order, vec!["chunk_003", "chunk_002", "chunk_001"]);

    let indices: Vec<usize> = result.outcomes.iter().map(|o| o.index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
    let text = std::fs::read_to_string(result.merged_path().unwrap()).unwrap();
    let a = text.find("<!-- Chunk 1 -->").unwrap();
    let b = text.find("<!-- Chunk 2 -->").unwrap();
    let c = text.find("<!-- Chunk 3 -->").unwrap();
    assert!(a < b && b < c);
}

#[tokio::test]
async fn polling_ceiling_times_out_one_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let stuck = Script {
        polls_before_terminal: 1_000,
        ..Script::default()
    };
    let client = Arc::new(FakeJobClient::new().script("chunk_003", stuck));
    let cfg = BatchConfig::builder()
        .output_format(OutputFormat::Markdown)
        .poll_interval_ms(1)
        .max_poll_attempts(3)
        .build()
        .unwrap();

    let result = assert_ok!(run_batch(input(&pdf), &cfg, client).await);

    assert_eq!(
        result.status,
        BatchStatus::PartialFailure {
            failed_chunks: vec![3]
        }
    );
    let third = &result.outcomes[2];
    assert_eq!(third.poll_attempts, 3);
    assert!(third.error().is_some_and(|e| e.is_timeout()));
}

#[tokio::test]
async fn partially_completed_jobs_count_failed_pages() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let partial = Script {
        final_state: JobState::PartiallyCompleted,
        pages_failed: 2,
        ..Script::default()
    };
    let client = Arc::new(FakeJobClient::new().script("chunk_001", partial));

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Markdown), client).await);

    assert_eq!(result.status, BatchStatus::AllSucceeded);
    assert_eq!(result.outcomes[0].failed_pages(), 2);
    assert_eq!(result.stats.failed_pages, 2);
}

#[tokio::test]
async fn html_merge_hoists_one_style_and_breaks_between_chunks() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new());

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Html), client).await);

    let merged = result.merged_path().unwrap();
    assert_eq!(merged, tmp.path().join("report_merged.html"));
    let html = std::fs::read_to_string(merged).unwrap();
    assert_eq!(html.matches(".doc { font-family: serif; }").count(), 1);
    assert_eq!(html.matches("<div class=\"page-break\"></div>").count(), 2);
    assert_eq!(html.matches("<body").count(), 1);
    assert!(html.contains("<title>report</title>"));
}

#[tokio::test]
async fn html_chunk_without_body_is_skipped_from_merge() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new().script("chunk_002", Script::without_body()));

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Html), client).await);

    // The job itself succeeded; only the merge dropped it.
    assert_eq!(result.status, BatchStatus::AllSucceeded);
    assert_eq!(result.merge_skips.len(), 1);
    assert_eq!(result.merge_skips[0].index, 2);

    let html = std::fs::read_to_string(result.merged_path().unwrap()).unwrap();
    assert!(html.contains("Text of chunk_001."));
    assert!(html.contains("Text of chunk_003."));
    assert!(!html.contains("Fragment of chunk_002."));
    assert_eq!(html.matches("<div class=\"page-break\"></div>").count(), 1);
}

#[tokio::test]
async fn zero_chunk_size_in_struct_literal_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "tiny.pdf", 3);
    let client = Arc::new(FakeJobClient::new());
    let cfg = BatchConfig {
        max_pages_per_chunk: 0,
        ..BatchConfig::default()
    };

    let err = assert_err!(run_batch(input(&pdf), &cfg, client.clone()).await);
    assert!(matches!(err, BatchError::InvalidConfig(_)));
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 0);
    assert!(!tmp.path().join("tiny_chunks").exists());
}

#[tokio::test]
async fn json_outputs_are_kept_per_chunk() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new().script("chunk_002", Script::failing_at(JobStep::Fetch)));

    let result = assert_ok!(run_batch(input(&pdf), &config(OutputFormat::Json), client).await);

    let expected = vec![
        tmp.path().join("report_outputs/chunk_001.json"),
        tmp.path().join("report_outputs/chunk_003.json"),
    ];
    assert_eq!(result.artifact, BatchArtifact::PerChunk(expected.clone()));
    for p in &expected {
        assert!(p.exists(), "{} should survive cleanup", p.display());
    }
    assert!(!tmp.path().join("report_merged.json").exists());
}

#[tokio::test]
async fn keep_chunks_leaves_chunk_pdfs() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new());
    let cfg = BatchConfig::builder()
        .output_format(OutputFormat::Markdown)
        .poll_interval_ms(1)
        .keep_chunk_artifacts(true)
        .build()
        .unwrap();

    assert_ok!(run_batch(input(&pdf), &cfg, client).await);

    let chunks = tmp.path().join("report_chunks");
    for i in 1..=3 {
        assert!(chunks.join(format!("chunk_{i:03}.pdf")).exists());
        assert!(!chunks.join(format!("chunk_{i:03}_extracted")).exists());
        assert!(!chunks.join(format!("chunk_{i:03}_output.zip")).exists());
    }
}

#[tokio::test]
async fn chunk_pdfs_hold_their_page_ranges() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new());
    let cfg = BatchConfig::builder()
        .output_format(OutputFormat::Markdown)
        .poll_interval_ms(1)
        .cleanup(false)
        .build()
        .unwrap();

    assert_ok!(run_batch(input(&pdf), &cfg, client).await);

    let chunks = tmp.path().join("report_chunks");
    let counts: Vec<usize> = (1..=3)
        .map(|i| {
            lopdf::Document::load(chunks.join(format!("chunk_{i:03}.pdf")))
                .unwrap()
                .get_pages()
                .len()
        })
        .collect();
    assert_eq!(counts, vec![5, 5, 2]);
}

#[tokio::test]
async fn cleanup_twice_is_harmless() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new());
    let cfg = BatchConfig::builder()
        .output_format(OutputFormat::Markdown)
        .poll_interval_ms(1)
        .cleanup(false)
        .build()
        .unwrap();

    let result = assert_ok!(run_batch(input(&pdf), &cfg, client).await);
    let chunk_dir = tmp.path().join("report_chunks");
    assert!(chunk_dir.join("chunk_001_extracted").exists());

    assert_ok!(cleanup(Some(&chunk_dir), &result.outcomes, false).await);
    assert!(!chunk_dir.exists());
    assert_ok!(cleanup(Some(&chunk_dir), &result.outcomes, false).await);
    assert!(result.merged_path().unwrap().exists());
}

#[tokio::test]
async fn output_dir_roots_every_artifact() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("in");
    let out = tmp.path().join("out");
    std::fs::create_dir_all(&src).unwrap();
    let pdf = write_pdf(&src, "report.pdf", 7);
    let client = Arc::new(FakeJobClient::new());
    let cfg = BatchConfig::builder()
        .output_format(OutputFormat::Markdown)
        .poll_interval_ms(1)
        .output_dir(&out)
        .build()
        .unwrap();

    let result = assert_ok!(run_batch(input(&pdf), &cfg, client).await);
    assert_eq!(result.merged_path(), Some(out.join("report_merged.md").as_path()));
    assert!(!src.join("report_merged.md").exists());
}

#[tokio::test]
async fn non_pdf_input_is_rejected_before_any_job() {
    let tmp = tempfile::tempdir().unwrap();
    let bogus = tmp.path().join("notes.pdf");
    std::fs::write(&bogus, "plain text").unwrap();
    let client = Arc::new(FakeJobClient::new());

    let err = assert_err!(run_batch(input(&bogus), &config(OutputFormat::Markdown), client.clone()).await);
    assert!(err.is_invalid_input());
    assert_eq!(client.create_calls.load(Ordering::SeqCst), 0);
}

#[derive(Default)]
struct Recorder {
    batch_total: AtomicUsize,
    completes: AtomicUsize,
    errors: AtomicUsize,
    states: Mutex<Vec<(usize, JobState)>>,
    succeeded: AtomicUsize,
}

impl BatchProgressCallback for Recorder {
    fn on_batch_start(&self, total_chunks: usize) {
        self.batch_total.store(total_chunks, Ordering::SeqCst);
    }
    fn on_chunk_state(&self, index: usize, state: JobState) {
        self.states.lock().unwrap().push((index, state));
    }
    fn on_chunk_complete(&self, _index: usize, _total: usize, _failed_pages: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }
    fn on_chunk_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
    fn on_batch_complete(&self, _total: usize, succeeded: usize) {
        self.succeeded.store(succeeded, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn progress_events_follow_the_batch() {
    let tmp = tempfile::tempdir().unwrap();
    let pdf = write_pdf(tmp.path(), "report.pdf", 12);
    let client = Arc::new(FakeJobClient::new().script("chunk_003", Script::job_failed()));
    let recorder = Arc::new(Recorder::default());
    let cfg = BatchConfig::builder()
        .output_format(OutputFormat::Markdown)
        .poll_interval_ms(1)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();

    assert_ok!(run_batch(input(&pdf), &cfg, client).await);

    assert_eq!(recorder.batch_total.load(Ordering::SeqCst), 3);
    assert_eq!(recorder.completes.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.succeeded.load(Ordering::SeqCst), 2);

    let states = recorder.states.lock().unwrap();
    let chunk1: Vec<JobState> = states.iter().filter(|(i, _)| *i == 1).map(|(_, s)| *s).collect();
    assert_eq!(
        chunk1,
        vec![
            JobState::Created,
            JobState::Uploaded,
            JobState::Started,
            JobState::Completed
        ]
    );
}
