//! reqwest implementation of [`JobClient`] for the document-digitization job API.
//!
//! ## Protocol
//!
//! ```text
//! POST {base}/doc-digitization/job/v1                      create   → job_id
//! POST {base}/doc-digitization/job/v1/upload-files         upload URL for each file
//! PUT  <presigned upload url>                              raw PDF bytes
//! POST {base}/doc-digitization/job/v1/{job_id}/start       start
//! GET  {base}/doc-digitization/job/v1/{job_id}/status      job_state + job_details
//! POST {base}/doc-digitization/job/v1/{job_id}/download-files   download URLs
//! GET  <presigned download url>                            output bytes (usually a zip)
//! ```
//!
//! API calls carry the `api-subscription-key` header. Presigned storage URLs
//! are requested without it.

use super::{JobClient, JobOutputs};
use crate::config::{ClientConfig, OutputFormat};
use crate::error::{BatchError, ClientError};
use crate::job::{Job, JobState, JobStatus};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const AUTH_HEADER: &str = "api-subscription-key";
const JOB_PATH: &str = "doc-digitization/job/v1";

/// HTTP job client. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpJobClient {
    client: Client,
    config: ClientConfig,
}

#[derive(Serialize)]
struct CreateJobRequest<'a> {
    job_parameters: JobParameters<'a>,
}

#[derive(Serialize)]
struct JobParameters<'a> {
    language: &'a str,
    output_format: OutputFormat,
}

#[derive(Deserialize)]
struct CreateJobResponse {
    job_id: String,
    #[serde(default)]
    job_state: Option<JobState>,
}

#[derive(Serialize)]
struct UploadFilesRequest<'a> {
    job_id: &'a str,
    files: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct FileUrl {
    file_url: String,
}

#[derive(Debug, Deserialize)]
struct FileUrlsResponse {
    #[serde(alias = "upload_urls", alias = "download_urls")]
    urls: HashMap<String, FileUrl>,
}

impl HttpJobClient {
    pub fn new(config: ClientConfig) -> Result<Self, BatchError> {
        if config.api_key.trim().is_empty() {
            return Err(BatchError::ClientInit("API key is empty".into()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BatchError::ClientInit(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, suffix: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        if suffix.is_empty() {
            format!("{base}/{JOB_PATH}")
        } else {
            format!("{base}/{JOB_PATH}/{suffix}")
        }
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(AUTH_HEADER, &self.config.api_key)
    }

    async fn file_urls(&self, req: RequestBuilder) -> Result<HashMap<String, String>, ClientError> {
        let resp = check(self.authed(req).send().await?).await?;
        let body: FileUrlsResponse = resp.json().await?;
        Ok(body
            .urls
            .into_iter()
            .map(|(name, u)| (name, u.file_url))
            .collect())
    }
}

/// Turn a non-2xx response into [`ClientError::Status`].
async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl JobClient for HttpJobClient {
    async fn create_job(&self, language: &str, format: OutputFormat) -> Result<Job, ClientError> {
        let req = self.client.post(self.endpoint("")).json(&CreateJobRequest {
            job_parameters: JobParameters {
                language,
                output_format: format,
            },
        });
        let resp = check(self.authed(req).send().await?).await?;
        let body: CreateJobResponse = resp.json().await?;
        debug!("Created job {} ({:?})", body.job_id, body.job_state);
        Ok(Job::new(body.job_id, language, format))
    }

    async fn upload(&self, job: &Job, artifact: &Path) -> Result<(), ClientError> {
        let file_name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        let req = self
            .client
            .post(self.endpoint("upload-files"))
            .json(&UploadFilesRequest {
                job_id: &job.id,
                files: vec![file_name.as_str()],
            });
        let mut urls = self.file_urls(req).await?;
        let url = urls.remove(&file_name).ok_or_else(|| ClientError::MissingUrl {
            kind: "upload",
            file: file_name.clone(),
        })?;

        let bytes = tokio::fs::read(artifact).await?;
        debug!("Job {}: uploading {} ({} bytes)", job.id, file_name, bytes.len());
        let resp = self
            .client
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(bytes)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn start(&self, job: &Job) -> Result<(), ClientError> {
        let req = self.client.post(self.endpoint(&format!("{}/start", job.id)));
        check(self.authed(req).send().await?).await?;
        Ok(())
    }

    async fn poll_status(&self, job: &Job) -> Result<JobStatus, ClientError> {
        let req = self.client.get(self.endpoint(&format!("{}/status", job.id)));
        let resp = check(self.authed(req).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn fetch_outputs(&self, job: &Job) -> Result<JobOutputs, ClientError> {
        let req = self
            .client
            .post(self.endpoint(&format!("{}/download-files", job.id)));
        let urls = self.file_urls(req).await?;

        let mut outputs = JobOutputs::new();
        for (name, url) in urls {
            let resp = check(self.client.get(url).send().await?).await?;
            let bytes = resp.bytes().await?;
            debug!("Job {}: downloaded {} ({} bytes)", job.id, name, bytes.len());
            outputs.insert(name, bytes.to_vec());
        }
        Ok(outputs)
    }
}
