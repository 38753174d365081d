// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Transfer Queue Application Service
//!
//! Accepts batches of file-transfer descriptors plus an executor callback,
//! runs them under a global concurrency limit, aggregates per-file progress
//! into job-level progress, and publishes lifecycle events.
//!
//! Scheduling model: one shared, dynamically-resizable semaphore admits
//! individual file-level tasks across ALL jobs; a job with many files does
//! not get dedicated slots. Within a job, files are submitted in array
//! order, but completion order follows whatever the limiter and the
//! underlying I/O produce.
//!
//! Cancellation is advisory at the bookkeeping layer, not forceful at the
//! I/O layer: `cancel_job` flips the job state immediately and not-yet
//! admitted files exit without doing work, but a transfer already mid-flight
//! runs to completion or failure in the background. Only the object-store
//! upload path carries an explicit abort channel (see the executor).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use crate::domain::events::TransferEvent;
use crate::domain::transfer::{
    FileStatus, JobId, TransferJob, TransferJobKind, TransferRequest,
};
use crate::infrastructure::event_bus::{EventBus, EventReceiver, JobEventReceiver};

/// Executor callback invoked by the queue for each file.
///
/// Implementations move exactly one file from source to destination and
/// report byte progress through the handle. Errors are caught at the task
/// boundary and recorded on the file; they never abort sibling files.
#[async_trait]
pub trait TransferHandler: Send + Sync {
    async fn execute(
        &self,
        request: &TransferRequest,
        progress: &ProgressHandle,
    ) -> anyhow::Result<()>;
}

/// Progress reporting handle scoped to one file of one job.
#[derive(Clone)]
pub struct ProgressHandle {
    shared: Arc<QueueShared>,
    job_id: JobId,
    file_index: usize,
}

impl ProgressHandle {
    /// Record the file's total size once the source has been opened.
    pub fn set_file_size(&self, size: u64) {
        self.shared.mutate_and_publish(self.job_id, |job| {
            job.files[self.file_index].size = size;
        });
    }

    /// Report newly transferred bytes. `loaded` only ever grows.
    pub fn add_loaded(&self, delta: u64) {
        self.shared.mutate_and_publish(self.job_id, |job| {
            job.files[self.file_index].loaded += delta;
        });
    }

    /// Whether the owning job has been cancelled. Long-running executors may
    /// poll this where their backend offers an abort channel.
    pub fn is_cancelled(&self) -> bool {
        self.shared
            .jobs
            .get(&self.job_id)
            .map(|job| job.status == crate::domain::transfer::JobStatus::Cancelled)
            .unwrap_or(true)
    }
}

struct QueueShared {
    jobs: DashMap<JobId, TransferJob>,
    bus: EventBus,
    limiter: RwLock<Arc<Semaphore>>,
    next_id: AtomicU64,
}

impl QueueShared {
    /// Mutate one job under its entry lock, recompute derived state, and
    /// publish the resulting snapshot. The lock is dropped before publishing.
    fn mutate_and_publish(&self, job_id: JobId, f: impl FnOnce(&mut TransferJob)) {
        let snapshot = {
            let Some(mut entry) = self.jobs.get_mut(&job_id) else {
                return;
            };
            f(&mut entry);
            entry.recompute();
            entry.value().clone()
        };
        self.bus.publish(TransferEvent::JobUpdated { job: snapshot });
    }
}

/// Bounded-concurrency job queue for bulk transfers.
///
/// Owns all job state; consumers only ever see snapshots. Constructed once
/// at process start and injected where needed.
pub struct TransferQueue {
    shared: Arc<QueueShared>,
}

impl TransferQueue {
    pub fn new(max_concurrent_transfers: usize) -> Self {
        Self::with_event_bus(max_concurrent_transfers, EventBus::with_default_capacity())
    }

    pub fn with_event_bus(max_concurrent_transfers: usize, bus: EventBus) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                jobs: DashMap::new(),
                bus,
                limiter: RwLock::new(Arc::new(Semaphore::new(max_concurrent_transfers))),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Accept a batch of transfers and begin scheduling immediately.
    ///
    /// Returns without waiting for completion; progress arrives through the
    /// event bus and `get_job` snapshots.
    pub fn queue_job(
        &self,
        kind: TransferJobKind,
        requests: Vec<TransferRequest>,
        handler: Arc<dyn TransferHandler>,
    ) -> JobId {
        let id = JobId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        let job = TransferJob::new(id, kind, &requests);
        self.shared.jobs.insert(id, job.clone());
        self.shared.bus.publish(TransferEvent::JobCreated { job });

        tracing::info!(job_id = %id, kind = ?kind, files = requests.len(), "Transfer job queued");

        for (file_index, request) in requests.into_iter().enumerate() {
            let shared = self.shared.clone();
            let handler = handler.clone();
            tokio::spawn(run_file_transfer(shared, handler, id, file_index, request));
        }

        id
    }

    /// Snapshot of one job.
    pub fn get_job(&self, id: JobId) -> Option<TransferJob> {
        self.shared.jobs.get(&id).map(|job| job.value().clone())
    }

    /// Snapshots of all tracked jobs, oldest first.
    pub fn get_all_jobs(&self) -> Vec<TransferJob> {
        let mut jobs: Vec<TransferJob> = self
            .shared
            .jobs
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by_key(|job| job.id);
        jobs
    }

    /// Ids of jobs that have not reached a terminal state.
    pub fn get_active_job_ids(&self) -> Vec<JobId> {
        let mut ids: Vec<JobId> = self
            .shared
            .jobs
            .iter()
            .filter(|entry| !entry.status.is_terminal())
            .map(|entry| entry.id)
            .collect();
        ids.sort();
        ids
    }

    /// Cancel a job. Returns `false` for unknown ids and jobs already in a
    /// terminal state.
    ///
    /// This updates bookkeeping immediately: the job becomes `cancelled` and
    /// every non-completed file is marked errored with "Cancelled by user".
    /// It does not forcibly interrupt an executor call already in flight.
    pub fn cancel_job(&self, id: JobId) -> bool {
        let snapshot = {
            let Some(mut entry) = self.shared.jobs.get_mut(&id) else {
                return false;
            };
            if entry.status.is_terminal() {
                return false;
            }
            entry.mark_cancelled();
            entry.value().clone()
        };

        tracing::info!(job_id = %id, "Transfer job cancelled");
        self.shared
            .bus
            .publish(TransferEvent::JobUpdated { job: snapshot });
        true
    }

    /// Remove terminal jobs whose completion is older than `max_age`.
    /// Queued and active jobs are never removed. Returns the removed count.
    pub fn cleanup_old_jobs(&self, max_age: Duration) -> usize {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let before = self.shared.jobs.len();
        self.shared.jobs.retain(|_, job| {
            !(job.status.is_terminal()
                && job.completed_at.map_or(false, |done| done < cutoff))
        });
        before - self.shared.jobs.len()
    }

    /// Replace the shared limiter for subsequently admitted work. Tasks
    /// already admitted (or already waiting on the old limiter) keep their
    /// previous semaphore.
    pub fn update_concurrency_limit(&self, max_concurrent_transfers: usize) {
        *self.shared.limiter.write() = Arc::new(Semaphore::new(max_concurrent_transfers));
        tracing::info!(limit = max_concurrent_transfers, "Transfer concurrency limit updated");
    }

    /// Subscribe to all job events.
    pub fn subscribe(&self) -> EventReceiver {
        self.shared.bus.subscribe()
    }

    /// Subscribe to one job's events, e.g. to feed a progress stream.
    pub fn subscribe_job(&self, id: JobId) -> JobEventReceiver {
        self.shared.bus.subscribe_job(id)
    }

    /// The underlying event bus, for wiring additional consumers.
    pub fn event_bus(&self) -> &EventBus {
        &self.shared.bus
    }
}

async fn run_file_transfer(
    shared: Arc<QueueShared>,
    handler: Arc<dyn TransferHandler>,
    job_id: JobId,
    file_index: usize,
    request: TransferRequest,
) {
    // Snapshot the current limiter; a later update_concurrency_limit call
    // must not affect tasks already queued on this semaphore.
    let semaphore = shared.limiter.read().clone();
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return;
    };

    // A job cancelled (or cleaned up) while this file waited does no work.
    match shared.jobs.get(&job_id) {
        Some(job) if !job.status.is_terminal() => {}
        _ => return,
    }

    shared.mutate_and_publish(job_id, |job| {
        job.files[file_index].status = FileStatus::Transferring;
    });

    let progress = ProgressHandle {
        shared: shared.clone(),
        job_id,
        file_index,
    };
    let result = handler.execute(&request, &progress).await;

    shared.mutate_and_publish(job_id, |job| {
        let file = &mut job.files[file_index];
        // A cancellation that raced this transfer has already marked the
        // file; its verdict stands.
        if file.status != FileStatus::Transferring {
            return;
        }
        match &result {
            Ok(()) => {
                file.status = FileStatus::Completed;
                file.loaded = file.size;
            }
            Err(e) => {
                let message = e.to_string();
                file.status = FileStatus::Error;
                file.error = Some(if message.is_empty() {
                    "Transfer failed".to_string()
                } else {
                    message
                });
                tracing::warn!(
                    job_id = %job_id,
                    source = %file.source_path,
                    error = %file.error.as_deref().unwrap_or_default(),
                    "File transfer failed"
                );
            }
        }
    });
}
