use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use serde::Deserialize;

use super::errors::JobClientError;
use super::events::{JobEvent, SseParser};
use super::subscription::{JobSubscription, SubscriptionHandle};
use super::types::{JobRequest, JobResult, JobSnapshot};
use crate::config::ClientConfig;
use crate::types::JobId;

/// Message delivered when the stream drops without a terminal event.
const CONNECTION_LOST: &str = "Connection lost";

/// HTTP/SSE client for the external job executor.
///
/// Submissions return as soon as the executor acknowledges; results arrive
/// through [`subscribe`](Self::subscribe). Cancellation is best-effort and
/// recovery reattaches to an already-submitted job without resubmitting work.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone, Debug)]
pub struct JobClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl JobClient {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Submit a unit of work. Exactly one job is created server-side per
    /// call; the returned id is the only reference the client keeps.
    pub async fn submit(&self, request: &JobRequest) -> Result<JobId, JobClientError> {
        #[derive(Deserialize)]
        struct CreateJobResponse {
            #[serde(rename = "jobId")]
            job_id: JobId,
        }

        let url = self.config.endpoint(request.path());
        let response = match request {
            JobRequest::Text(body) => self.http.post(&url).json(body).send().await?,
            JobRequest::Image(body) => self.http.post(&url).json(body).send().await?,
        };
        if !response.status().is_success() {
            return Err(JobClientError::Rejected {
                status: response.status().as_u16(),
            });
        }
        let created: CreateJobResponse = response.json().await?;
        tracing::debug!(job = %created.job_id, block = %request.block_id(), kind = %request.kind(), "job submitted");
        Ok(created.job_id)
    }

    /// One-shot status poll, used by the recovery path.
    pub async fn fetch(&self, job_id: &JobId) -> Result<JobSnapshot, JobClientError> {
        let url = self.config.endpoint(&format!("/jobs/{job_id}"));
        let response = self.http.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(JobClientError::NotFound {
                job_id: job_id.clone(),
            });
        }
        if !response.status().is_success() {
            return Err(JobClientError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await?)
    }

    /// Best-effort server-side cancellation. Failure is logged, never
    /// surfaced; local teardown does not depend on this call succeeding.
    pub async fn cancel(&self, job_id: &JobId) {
        let url = self.config.endpoint(&format!("/jobs/{job_id}/cancel"));
        match self.http.post(&url).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(job = %job_id, "cancel acknowledged");
            }
            Ok(response) => {
                tracing::warn!(job = %job_id, status = %response.status(), "cancel request refused");
            }
            Err(err) => {
                tracing::warn!(job = %job_id, error = %err, "cancel request failed");
            }
        }
    }

    /// Open the server-push stream for a job.
    ///
    /// A reader task parses the SSE bytes into [`JobEvent`]s delivered on the
    /// subscription channel. The reader stops after forwarding a terminal
    /// event; a transport failure while the stream is open and not
    /// intentionally closed is delivered as `Error { "Connection lost" }`.
    pub fn subscribe(&self, job_id: &JobId) -> JobSubscription {
        let (tx, rx) = flume::unbounded();
        let closed = Arc::new(AtomicBool::new(false));

        let url = self.config.endpoint(&format!("/jobs/{job_id}/stream"));
        let http = self.http.clone();
        let closed_flag = Arc::clone(&closed);
        let job = job_id.clone();

        let task = tokio::spawn(async move {
            let response = match http.get(&url).send().await {
                Ok(response) if response.status().is_success() => response,
                Ok(response) => {
                    tracing::warn!(job = %job, status = %response.status(), "stream request refused");
                    deliver_lost(&tx, &closed_flag);
                    return;
                }
                Err(err) => {
                    tracing::warn!(job = %job, error = %err, "stream connect failed");
                    deliver_lost(&tx, &closed_flag);
                    return;
                }
            };

            let mut body = response.bytes_stream();
            let mut parser = SseParser::new();
            while let Some(chunk) = body.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        tracing::warn!(job = %job, error = %err, "stream read failed");
                        deliver_lost(&tx, &closed_flag);
                        return;
                    }
                };
                for frame in parser.push(&bytes) {
                    if let Some(event) = JobEvent::from_frame(&frame) {
                        let terminal = event.is_terminal();
                        if tx.send(event).is_err() {
                            return; // Subscriber gone.
                        }
                        if terminal {
                            return;
                        }
                    }
                }
            }
            // Server closed the stream without a terminal event.
            deliver_lost(&tx, &closed_flag);
        });

        let handle = SubscriptionHandle::new(closed, task.abort_handle());
        JobSubscription::new(rx, handle)
    }

    /// Normalize a job result for display: image URLs delivered host-relative
    /// are rewritten to absolute addresses against the configured API host.
    #[must_use]
    pub fn normalize(&self, result: JobResult) -> JobResult {
        match result {
            JobResult::Image {
                image_id,
                image_url,
            } => JobResult::Image {
                image_id,
                image_url: self.config.absolutize(&image_url),
            },
            text @ JobResult::Text { .. } => text,
        }
    }
}

fn deliver_lost(tx: &flume::Sender<JobEvent>, closed: &AtomicBool) {
    if !closed.load(Ordering::SeqCst) {
        let _ = tx.send(JobEvent::Error {
            message: CONNECTION_LOST.to_string(),
        });
    }
}
