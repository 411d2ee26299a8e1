//! Execution orchestration: ties the store, the scheduler, and the job client
//! together.
//!
//! The runtime owns the per-block job lifecycle: validation gating, the
//! `Running` status gate, one apply loop per in-flight job, synchronous
//! teardown on cancel, cancel-on-delete, and reconnection-safe recovery. The
//! job client never touches block payloads directly; every mutation flows
//! through the [`GraphStore`] setter API.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use blockweave::config::ClientConfig;
//! use blockweave::runtime::CanvasRuntime;
//! use blockweave::types::{BlockKind, Position};
//!
//! # async fn demo() {
//! let runtime = CanvasRuntime::new(ClientConfig::from_env());
//! let id = runtime.store().add_node(BlockKind::Text, Position::default());
//! runtime.store().set_prompt(&id, "write a haiku about rain");
//!
//! runtime.scheduler().request_run(vec![id]);
//! runtime.tick().await; // drains the queue, submits jobs, streams results
//! # }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::task::AbortHandle;

use crate::block::BlockData;
use crate::config::ClientConfig;
use crate::jobs::{
    ImageJobRequest, JobClient, JobEvent, JobRequest, JobResult, JobStatus, TextJobRequest,
};
use crate::scheduler::RunScheduler;
use crate::store::GraphStore;
use crate::types::{BlockStatus, ContentItem, JobId, NodeId};

/// Model sentinel resolved to the executor's configured default.
const DEFAULT_MODEL: &str = "default";

struct ActiveJob {
    job_id: JobId,
    stream: crate::jobs::SubscriptionHandle,
    apply: AbortHandle,
}

/// One orchestrator per canvas session.
///
/// Cheap to share behind an `Arc`; all public entry points take
/// `self: &Arc<Self>` where they need to spawn apply loops.
pub struct CanvasRuntime {
    store: Arc<GraphStore>,
    scheduler: Arc<RunScheduler>,
    client: JobClient,
    /// In-flight jobs keyed by owning block. Entries are removed by terminal
    /// events, cancel, and delete; never by the reader task alone.
    active: Mutex<FxHashMap<NodeId, ActiveJob>>,
    /// Jobs for which recovery has been attempted. An entry is only removed
    /// when the block's `job_id` clears, so a re-mount cannot double-attach.
    recovered: Mutex<FxHashSet<JobId>>,
}

impl CanvasRuntime {
    #[must_use]
    pub fn new(config: ClientConfig) -> Arc<Self> {
        Self::with_parts(
            Arc::new(GraphStore::new()),
            Arc::new(RunScheduler::new()),
            JobClient::new(config),
        )
    }

    #[must_use]
    pub fn with_parts(
        store: Arc<GraphStore>,
        scheduler: Arc<RunScheduler>,
        client: JobClient,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            scheduler,
            client,
            active: Mutex::new(FxHashMap::default()),
            recovered: Mutex::new(FxHashSet::default()),
        })
    }

    pub fn store(&self) -> &Arc<GraphStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<RunScheduler> {
        &self.scheduler
    }

    pub fn client(&self) -> &JobClient {
        &self.client
    }

    /// True if a job is currently in flight for `id`.
    pub fn is_running(&self, id: &NodeId) -> bool {
        self.active.lock().contains_key(id)
    }

    // ------------------------------------------------------------------
    // Triggering
    // ------------------------------------------------------------------

    /// Enqueue the current selection and drain the queue.
    pub async fn run_selected(self: &Arc<Self>) {
        self.scheduler.request_run(self.store.selected());
        self.tick().await;
    }

    /// Drain the run queue (dequeue-then-execute) and fire pending auto-run
    /// latches. Each claimed id triggers at most one execution; blocks that
    /// are already running are skipped by the status gate.
    pub async fn tick(self: &Arc<Self>) {
        while let Some(id) = self.scheduler.claim_next() {
            self.run_block(&id).await;
        }
        self.fire_auto_runs().await;
    }

    /// One-shot auto-run: a block created with the latch set triggers the
    /// first time it is observed Idle with a runnable action available. The
    /// latch is cleared as part of triggering so rehydration cannot
    /// re-trigger it.
    async fn fire_auto_runs(self: &Arc<Self>) {
        let candidates: Vec<NodeId> = self
            .store
            .blocks()
            .into_iter()
            .filter(|b| {
                b.status() == BlockStatus::Idle
                    && b.data.auto_run()
                    && b.prompt().is_some_and(|p| !p.trim().is_empty())
            })
            .map(|b| b.id)
            .collect();
        for id in candidates {
            if self.store.take_auto_run(&id) {
                self.run_block(&id).await;
            }
        }
    }

    /// Trigger one block. Returns true if a job was submitted.
    ///
    /// Silent no-ops: unknown id, block already `Running`, block without a
    /// usable prompt. A submission failure is surfaced on the block as an
    /// `Error` status, never propagated to other blocks.
    pub async fn run_block(self: &Arc<Self>, id: &NodeId) -> bool {
        let Some(block) = self.store.get(id) else {
            return false;
        };
        let Some(request) = build_request(&block, &self.store) else {
            return false;
        };
        // Check-and-flip under one lock; a racing trigger loses here.
        if !self.store.begin_run(id) {
            return false;
        }

        match self.client.submit(&request).await {
            Ok(job_id) => {
                self.store.set_job(id, job_id.clone());
                self.attach(id.clone(), job_id);
                true
            }
            Err(err) => {
                tracing::warn!(block = %id, error = %err, "job submission failed");
                self.store.set_status(id, BlockStatus::Error);
                self.store.set_error(id, Some(err.to_string()));
                false
            }
        }
    }

    /// Open the stream for `job_id` and spawn its apply loop.
    fn attach(self: &Arc<Self>, id: NodeId, job_id: JobId) {
        let (events, stream) = self.client.subscribe(&job_id).split();

        let runtime = Arc::clone(self);
        let block_id = id.clone();
        let job = job_id.clone();
        let apply = tokio::spawn(async move {
            while let Ok(event) = events.recv_async().await {
                if runtime.apply_event(&block_id, event) {
                    break;
                }
            }
            runtime.detach(&block_id, &job);
        });

        self.active.lock().insert(
            id,
            ActiveJob {
                job_id,
                stream,
                apply: apply.abort_handle(),
            },
        );
    }

    /// Apply one stream event to the owning block. Returns true on terminal.
    fn apply_event(&self, id: &NodeId, event: JobEvent) -> bool {
        match event {
            JobEvent::Chunk { text } => {
                // Running total from the server; replace, don't append.
                self.store.set_text_content(id, text);
                false
            }
            JobEvent::Done { result } => {
                self.apply_success(id, result);
                true
            }
            JobEvent::Error { message } => {
                self.store.set_status(id, BlockStatus::Error);
                self.store.set_error(id, Some(message));
                self.store.clear_job(id);
                true
            }
            JobEvent::Cancelled => {
                self.store.set_status(id, BlockStatus::Idle);
                self.store.clear_job(id);
                true
            }
        }
    }

    fn apply_success(&self, id: &NodeId, result: JobResult) {
        match self.client.normalize(result) {
            JobResult::Text { text } => {
                self.store.set_text_content(id, text);
            }
            JobResult::Image {
                image_id,
                image_url,
            } => {
                self.store.set_image_result(id, image_id, image_url);
            }
        }
        self.store.set_status(id, BlockStatus::Success);
        self.store.clear_job(id);
    }

    /// Drop bookkeeping for a finished job. The recovery guard is released
    /// here because this is the single place a block's `job_id` has just been
    /// cleared by the apply loop.
    fn detach(&self, id: &NodeId, job_id: &JobId) {
        let mut active = self.active.lock();
        if active.get(id).is_some_and(|a| &a.job_id == job_id) {
            active.remove(id);
        }
        drop(active);
        self.recovered.lock().remove(job_id);
    }

    // ------------------------------------------------------------------
    // Cancellation & deletion
    // ------------------------------------------------------------------

    /// Cancel the in-flight job for `id`, if any.
    ///
    /// The subscription is torn down synchronously *before* the block is
    /// reset, so a late `done` racing the cancel can never resurrect the
    /// block to Success. The server-side cancel is best-effort and fired
    /// afterwards.
    pub fn cancel_block(&self, id: &NodeId) {
        let Some(job) = self.active.lock().remove(id) else {
            return;
        };
        job.stream.close();
        job.apply.abort();
        self.recovered.lock().remove(&job.job_id);

        self.store.set_status(id, BlockStatus::Idle);
        self.store.clear_job(id);

        let client = self.client.clone();
        let job_id = job.job_id;
        tokio::spawn(async move {
            client.cancel(&job_id).await;
        });
    }

    /// Delete a block, cascading its edges; an in-flight job is cancelled
    /// rather than orphaned.
    pub fn delete_block(&self, id: &NodeId) {
        let removed = self.store.delete_node(id);

        if let Some(job) = self.active.lock().remove(id) {
            job.stream.close();
            job.apply.abort();
            self.recovered.lock().remove(&job.job_id);
            let client = self.client.clone();
            let job_id = job.job_id;
            tokio::spawn(async move {
                client.cancel(&job_id).await;
            });
        } else if let Some(job_id) = removed.as_ref().and_then(|b| b.job_id()).cloned() {
            // Rehydrated block deleted before recovery reattached.
            self.recovered.lock().remove(&job_id);
            let client = self.client.clone();
            tokio::spawn(async move {
                client.cancel(&job_id).await;
            });
        }
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Reconcile a rehydrated block that still carries a `job_id`.
    ///
    /// Attempted at most once per job identity: the guard entry is only
    /// released when the job clears, so repeated mounts cannot open duplicate
    /// subscriptions. A terminal snapshot is applied directly without opening
    /// a stream; a live job falls through to the normal subscribe path.
    pub async fn recover_block(self: &Arc<Self>, id: &NodeId) -> bool {
        let Some(job_id) = self.store.get(id).and_then(|b| b.job_id().cloned()) else {
            return false;
        };
        // Guard check-and-set is a single lock acquisition; no await between
        // the check and the insert.
        if !self.recovered.lock().insert(job_id.clone()) {
            return false;
        }

        match self.client.fetch(&job_id).await {
            Ok(snapshot) if snapshot.status.is_terminal() => {
                match snapshot.status {
                    JobStatus::Completed => match snapshot.result {
                        Some(result) => self.apply_success(id, result),
                        None => {
                            self.store.set_status(id, BlockStatus::Success);
                            self.store.clear_job(id);
                        }
                    },
                    JobStatus::Failed => {
                        let message =
                            snapshot.error.unwrap_or_else(|| "Job failed".to_string());
                        self.store.set_status(id, BlockStatus::Error);
                        self.store.set_error(id, Some(message));
                        self.store.clear_job(id);
                    }
                    JobStatus::Cancelled => {
                        self.store.set_status(id, BlockStatus::Idle);
                        self.store.clear_job(id);
                    }
                    JobStatus::Pending | JobStatus::Running => unreachable!("terminal checked"),
                }
                self.recovered.lock().remove(&job_id);
                true
            }
            Ok(_) => {
                self.store.set_status(id, BlockStatus::Running);
                self.attach(id.clone(), job_id);
                true
            }
            Err(crate::jobs::JobClientError::NotFound { .. }) => {
                // Stale reference; the executor has no such job.
                tracing::warn!(block = %id, job = %job_id, "recovery found no job; resetting block");
                self.store.set_status(id, BlockStatus::Idle);
                self.store.clear_job(id);
                self.recovered.lock().remove(&job_id);
                true
            }
            Err(err) => {
                tracing::warn!(block = %id, job = %job_id, error = %err, "recovery fetch failed");
                self.store.set_status(id, BlockStatus::Error);
                self.store.set_error(id, Some("Connection lost".to_string()));
                self.store.clear_job(id);
                self.recovered.lock().remove(&job_id);
                true
            }
        }
    }
}

/// Build the submission for a block, or `None` when the block has no
/// runnable action (missing prompt); that is a silent no-op, not an error.
fn build_request(block: &crate::block::Block, store: &GraphStore) -> Option<JobRequest> {
    let prompt = block.prompt()?.trim().to_string();
    if prompt.is_empty() {
        return None;
    }

    let inputs = store.input_content(&block.id);
    let mut texts: Vec<String> = Vec::new();
    let mut image_urls: Vec<String> = Vec::new();
    for item in inputs {
        match item {
            ContentItem::Text { content } => texts.push(content),
            ContentItem::Image { url } => image_urls.push(url),
        }
    }
    let input = (!texts.is_empty()).then(|| texts.join("\n\n"));
    let image_urls = (!image_urls.is_empty()).then_some(image_urls);

    match &block.data {
        BlockData::Text(t) => Some(JobRequest::Text(TextJobRequest {
            block_id: block.id.clone(),
            prompt,
            input,
            image_urls,
            model: if t.model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                t.model.clone()
            },
        })),
        BlockData::Image(i) => Some(JobRequest::Image(ImageJobRequest {
            block_id: block.id.clone(),
            prompt,
            input,
            image_urls,
            model: i.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            is_variation: i.variation,
        })),
    }
}
