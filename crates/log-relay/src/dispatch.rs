// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The snapshot-and-enqueue protocol and the bounded delivery worker pool.
//!
//! The accumulator and the batch queue share a single mutual-exclusion
//! domain so that snapshot + enqueue is indivisible with respect to
//! concurrent inserts, and so a worker's claim of the oldest batch cannot
//! interleave with a flush splitting a logical batch.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::accumulator::{Accumulator, Batch};
use crate::errors::{InsertError, SinkError};
use crate::record::LogRecord;
use crate::sink::Sink;

struct Inner {
    accumulator: Accumulator,
    queue: VecDeque<Batch>,
}

/// Shared pipeline state: the accumulator and the FIFO dispatch queue under
/// one lock.
pub struct Pipeline {
    inner: Mutex<Inner>,
}

impl Pipeline {
    pub fn new(max_pending_records: usize) -> Self {
        Pipeline {
            inner: Mutex::new(Inner {
                accumulator: Accumulator::new(max_pending_records),
                queue: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        #[allow(clippy::expect_used)]
        let inner = self.inner.lock().expect("lock poisoned");
        inner
    }

    /// Stamps ingestion metadata onto `record` and buffers it, atomically
    /// with respect to concurrent inserts and flushes.
    pub fn stamp_and_insert(
        &self,
        mut record: LogRecord,
        project_name: &str,
        tenant_id: &str,
    ) -> Result<(), InsertError> {
        let mut inner = self.lock();
        record.stamp(project_name, tenant_id);
        inner.accumulator.insert(record)
    }

    /// Takes an isolated snapshot of the pending records, clears the
    /// accumulator, and appends the snapshot to the dispatch queue in one
    /// critical section. Returns the batch size, or `None` when nothing was
    /// pending.
    pub fn snapshot_and_enqueue(&self) -> Option<usize> {
        let mut inner = self.lock();
        if inner.accumulator.is_empty() {
            return None;
        }
        let batch = inner.accumulator.snapshot_and_clear();
        let size = batch.len();
        inner.queue.push_back(batch);
        Some(size)
    }

    /// Claims the oldest enqueued batch. The lock is held only for the pop.
    pub fn claim_oldest(&self) -> Option<Batch> {
        self.lock().queue.pop_front()
    }

    pub fn pending_records(&self) -> usize {
        self.lock().accumulator.len()
    }

    pub fn queued_batches(&self) -> usize {
        self.lock().queue.len()
    }
}

/// Token returned by a flush. Awaiting it surfaces the delivery outcome of
/// the batch that flush enqueued; failures are logged at the worker and are
/// not retried.
#[must_use]
pub enum FlushHandle {
    /// The flush found an empty accumulator; nothing was enqueued.
    Empty,
    /// A worker task was submitted for the enqueued batch.
    Dispatched(JoinHandle<Result<usize, SinkError>>),
}

impl FlushHandle {
    /// Waits for the flushed batch to be delivered. Returns the number of
    /// records the worker handed to the sink.
    pub async fn wait(self) -> Result<usize, SinkError> {
        match self {
            FlushHandle::Empty => Ok(0),
            FlushHandle::Dispatched(handle) => match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(SinkError::Worker(e.to_string())),
            },
        }
    }
}

/// Bounded-concurrency delivery pool.
///
/// Submissions spawn tracked tasks; a semaphore caps how many run their
/// sink call concurrently. The tracker is what shutdown drains.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tracker: TaskTracker,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        WorkerPool {
            permits: Arc::new(Semaphore::new(worker_count)),
            tracker: TaskTracker::new(),
        }
    }

    /// Submits one unit of delivery work: claim the oldest enqueued batch
    /// and append it to `sink`. A failure is logged here at the worker
    /// boundary and surfaced through the returned handle; it never affects
    /// other workers.
    pub fn deliver(&self, pipeline: Arc<Pipeline>, sink: Arc<dyn Sink>) -> FlushHandle {
        let permits = Arc::clone(&self.permits);
        let handle = self.tracker.spawn(async move {
            // The semaphore is never closed, so acquisition only fails if
            // the process is tearing the runtime down.
            #[allow(clippy::expect_used)]
            let _permit = permits.acquire_owned().await.expect("semaphore closed");

            let Some(batch) = pipeline.claim_oldest() else {
                return Ok(0);
            };
            let size = batch.len();
            match sink.append(batch).await {
                Ok(()) => {
                    debug!("Delivered batch of {size} records");
                    Ok(size)
                }
                Err(e) => {
                    error!("Failed to deliver batch of {size} records: {e}");
                    Err(e)
                }
            }
        });
        FlushHandle::Dispatched(handle)
    }

    /// Stops accepting new submissions. Already-submitted work keeps
    /// running until drained.
    pub fn close(&self) {
        self.tracker.close();
    }

    /// Waits for all in-flight and queued worker tasks to finish, up to
    /// `limit`.
    pub async fn drain(&self, limit: Duration) -> Result<(), tokio::time::error::Elapsed> {
        tokio::time::timeout(limit, self.tracker.wait()).await
    }
}
