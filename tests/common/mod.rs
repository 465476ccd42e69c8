//! Shared fixtures: lopdf-generated PDFs and a scripted in-memory job service.

#![allow(dead_code)]

use async_trait::async_trait;
use docintel_batch::{
    ClientError, Job, JobClient, JobOutputs, JobState, JobStatus, JobStep, OutputFormat, PageDetail,
};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use zip::write::SimpleFileOptions;

// ── PDFs ─────────────────────────────────────────────────────────────────────

/// Write a `pages`-page PDF whose page N shows the text "Page N".
pub fn write_pdf(dir: &Path, name: &str, pages: usize) -> PathBuf {
    let mut doc = Document::with_version("1.5");

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut page_ids = Vec::with_capacity(pages);
    for n in 1..=pages {
        let content = format!("BT /F1 12 Tf 100 700 Td (Page {n}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| id.into()).collect();
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => Object::Integer(pages as i64),
    });
    for page_id in &page_ids {
        if let Ok(Object::Dictionary(dict)) = doc.get_object_mut(*page_id) {
            dict.set("Parent", pages_id);
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let path = dir.join(name);
    doc.save(&path).unwrap();
    path
}

// ── Scripted job service ─────────────────────────────────────────────────────

/// How the fake service treats the job whose upload has a given file stem.
#[derive(Debug, Clone)]
pub struct Script {
    pub final_state: JobState,
    /// Non-terminal polls answered before `final_state`.
    pub polls_before_terminal: u32,
    pub fail_step: Option<JobStep>,
    /// Delay before the terminal status is reported.
    pub delay: Duration,
    pub pages_failed: usize,
    /// Deliver outputs as a zip (true) or as a bare file.
    pub zipped: bool,
    /// Return an HTML artifact with no `<body>` element.
    pub without_body: bool,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            final_state: JobState::Completed,
            polls_before_terminal: 1,
            fail_step: None,
            delay: Duration::ZERO,
            pages_failed: 0,
            zipped: true,
            without_body: false,
        }
    }
}

impl Script {
    pub fn failing_at(step: JobStep) -> Self {
        Self {
            fail_step: Some(step),
            ..Self::default()
        }
    }

    pub fn job_failed() -> Self {
        Self {
            final_state: JobState::Failed,
            ..Self::default()
        }
    }

    pub fn without_body() -> Self {
        Self {
            without_body: true,
            ..Self::default()
        }
    }

    pub fn delayed(ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
struct JobRecord {
    stem: String,
    polls: u32,
}

/// In-memory [`JobClient`] answering from per-file [`Script`]s.
///
/// Jobs are tied to a script at upload time by the uploaded file's stem
/// (`chunk_002`, or the document stem on the single-job path).
pub struct FakeJobClient {
    default: Script,
    scripts: HashMap<String, Script>,
    jobs: Mutex<HashMap<String, JobRecord>>,
    next_id: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    /// Stems in the order their outputs were fetched.
    pub fetch_order: Mutex<Vec<String>>,
}

impl FakeJobClient {
    pub fn new() -> Self {
        Self::with_default(Script::default())
    }

    pub fn with_default(default: Script) -> Self {
        Self {
            default,
            scripts: HashMap::new(),
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
            create_calls: AtomicUsize::new(0),
            upload_calls: AtomicUsize::new(0),
            fetch_order: Mutex::new(Vec::new()),
        }
    }

    pub fn script(mut self, stem: &str, script: Script) -> Self {
        self.scripts.insert(stem.to_string(), script);
        self
    }

    fn script_for(&self, job: &Job) -> (String, Script) {
        let stem = self
            .jobs
            .lock()
            .unwrap()
            .get(&job.id)
            .map(|r| r.stem.clone())
            .unwrap_or_default();
        let script = self.scripts.get(&stem).cloned().unwrap_or_else(|| self.default.clone());
        (stem, script)
    }

    fn fail(step: JobStep, script: &Script) -> Result<(), ClientError> {
        if script.fail_step == Some(step) {
            return Err(ClientError::Status {
                status: 503,
                body: format!("scripted {step} failure"),
            });
        }
        Ok(())
    }
}

/// Body of the artifact the fake service returns for `stem`.
pub fn artifact_body(stem: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Markdown => format!("# {stem}\n\nText of {stem}.\n"),
        OutputFormat::Html => format!(
            "<!DOCTYPE html><html><head><style>.doc {{ font-family: serif; }}</style></head>\
             <body><div class=\"doc\"><p>Text of {stem}.</p></div></body></html>"
        ),
        OutputFormat::Json => format!("{{\"source\": \"{stem}\"}}"),
    }
}

fn zip_bytes(entries: &[(String, String)]) -> Vec<u8> {
    let mut w = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in entries {
        w.start_file(name.as_str(), SimpleFileOptions::default()).unwrap();
        w.write_all(body.as_bytes()).unwrap();
    }
    w.finish().unwrap().into_inner()
}

#[async_trait]
impl JobClient for FakeJobClient {
    async fn create_job(&self, language: &str, format: OutputFormat) -> Result<Job, ClientError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = format!("job-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.jobs.lock().unwrap().insert(id.clone(), JobRecord::default());
        Ok(Job::new(id, language, format))
    }

    async fn upload(&self, job: &Job, artifact: &Path) -> Result<(), ClientError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        assert!(artifact.exists(), "uploaded file must exist: {}", artifact.display());
        let stem = artifact
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if let Some(record) = self.jobs.lock().unwrap().get_mut(&job.id) {
            record.stem = stem;
        }
        let (_, script) = self.script_for(job);
        Self::fail(JobStep::Upload, &script)
    }

    async fn start(&self, job: &Job) -> Result<(), ClientError> {
        let (_, script) = self.script_for(job);
        Self::fail(JobStep::Start, &script)
    }

    async fn poll_status(&self, job: &Job) -> Result<JobStatus, ClientError> {
        let (_, script) = self.script_for(job);
        Self::fail(JobStep::Poll, &script)?;

        let polls = {
            let mut jobs = self.jobs.lock().unwrap();
            let record = jobs.entry(job.id.clone()).or_default();
            record.polls += 1;
            record.polls
        };
        if polls <= script.polls_before_terminal {
            return Ok(JobStatus::new(JobState::Started));
        }

        tokio::time::sleep(script.delay).await;
        let mut status = JobStatus::new(script.final_state);
        status.page_details = vec![PageDetail {
            total_pages: 5,
            pages_succeeded: 5 - script.pages_failed.min(5),
            pages_failed: Some(script.pages_failed),
        }];
        if script.final_state == JobState::Failed {
            status.error_message = Some("scripted job failure".into());
        }
        Ok(status)
    }

    async fn fetch_outputs(&self, job: &Job) -> Result<JobOutputs, ClientError> {
        let (stem, script) = self.script_for(job);
        Self::fail(JobStep::Fetch, &script)?;
        self.fetch_order.lock().unwrap().push(stem.clone());

        let file = format!("{stem}.{}", job.output_format.extension());
        let body = if script.without_body {
            format!("<style>.broken {{ color: red; }}</style><p>Fragment of {stem}.</p>")
        } else {
            artifact_body(&stem, job.output_format)
        };
        let mut outputs = JobOutputs::new();
        if script.zipped {
            outputs.insert(
                "output.zip".into(),
                zip_bytes(&[(file, body), ("metadata/info.txt".into(), "meta".into())]),
            );
        } else {
            outputs.insert(file, body.into_bytes());
        }
        Ok(outputs)
    }
}
