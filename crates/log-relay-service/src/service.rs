// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The log service facade: stamping, flushing, and graceful shutdown over
//! the batching pipeline.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log_relay::dispatch::{FlushHandle, Pipeline, WorkerPool};
use log_relay::errors::InsertError;
use log_relay::record::LogRecord;
use log_relay::sink::{FileSink, HttpSink, Sink};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{ServiceConfig, SinkConfig};
use crate::error::ServiceError;

const STATE_RUNNING: u8 = 0;
const STATE_DRAINING: u8 = 1;
const STATE_TERMINATED: u8 = 2;

/// Lifecycle of the log service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Accepting records and flushes.
    Running,
    /// Shutdown has begun; the worker pool is draining.
    Draining,
    /// Drained and closed.
    Terminated,
}

/// Coordinates producers, the batching pipeline, the delivery worker pool,
/// and the active sink.
///
/// One instance per process is the expected deployment shape; that wiring
/// belongs to the composition root, not to this type. Construct it once and
/// hand out clones of an `Arc<LogService>`.
pub struct LogService {
    pipeline: Arc<Pipeline>,
    pool: WorkerPool,
    sink: Arc<dyn Sink>,
    state: AtomicU8,
    tenant_id: String,
    project_name: String,
    shutdown_timeout: Duration,
    flusher_cancel: CancellationToken,
}

impl LogService {
    /// Builds the service with the sink selected by `config.sink`.
    pub async fn new(config: ServiceConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let sink: Arc<dyn Sink> = match &config.sink {
            SinkConfig::File { directory } => Arc::new(
                FileSink::create(directory)
                    .await
                    .map_err(|e| ServiceError::SinkCreate(e.to_string()))?,
            ),
            SinkConfig::Http {
                base_url,
                connect_timeout,
                retry_strategy,
            } => Arc::new(
                HttpSink::new(base_url, *connect_timeout, retry_strategy.clone())
                    .map_err(|e| ServiceError::SinkCreate(e.to_string()))?,
            ),
        };
        LogService::with_sink(config, sink)
    }

    /// Builds the service around an externally constructed sink, e.g. a
    /// semantic-index sink whose embedding collaborator the caller owns.
    pub fn with_sink(config: ServiceConfig, sink: Arc<dyn Sink>) -> Result<Self, ServiceError> {
        config.validate()?;
        let service = LogService {
            pipeline: Arc::new(Pipeline::new(config.max_pending_records)),
            pool: WorkerPool::new(config.worker_count),
            sink,
            state: AtomicU8::new(STATE_RUNNING),
            tenant_id: config.tenant_id,
            project_name: config.project_name,
            shutdown_timeout: config.shutdown_timeout,
            flusher_cancel: CancellationToken::new(),
        };
        if let Some(every) = config.flush_interval {
            service.spawn_periodic_flusher(every);
        }
        Ok(service)
    }

    fn spawn_periodic_flusher(&self, every: Duration) {
        let pipeline = Arc::clone(&self.pipeline);
        let pool = self.pool.clone();
        let sink = Arc::clone(&self.sink);
        let cancel = self.flusher_cancel.clone();

        tokio::spawn(async move {
            let mut flush_interval = interval(every);
            flush_interval.tick().await; // discard first tick, which is instantaneous
            loop {
                tokio::select! {
                    _ = flush_interval.tick() => {
                        if let Some(size) = pipeline.snapshot_and_enqueue() {
                            debug!("Periodic flush of {size} records");
                            let _handle = pool.deliver(Arc::clone(&pipeline), Arc::clone(&sink));
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        });
    }

    fn ensure_running(&self) -> Result<(), ServiceError> {
        if self.state.load(Ordering::Acquire) == STATE_RUNNING {
            Ok(())
        } else {
            Err(ServiceError::NotRunning)
        }
    }

    pub fn state(&self) -> ServiceState {
        match self.state.load(Ordering::Acquire) {
            STATE_RUNNING => ServiceState::Running,
            STATE_DRAINING => ServiceState::Draining,
            _ => ServiceState::Terminated,
        }
    }

    /// Stamps ingestion metadata onto `record` and buffers it for the next
    /// flush. Never blocks on I/O and never surfaces sink failures.
    pub fn record(&self, record: LogRecord) -> Result<(), ServiceError> {
        self.ensure_running()?;
        self.pipeline
            .stamp_and_insert(record, &self.project_name, &self.tenant_id)
            .map_err(|e| match e {
                InsertError::Overflow { limit } => ServiceError::PendingCapacity { limit },
            })
    }

    /// Snapshots the pending records into an isolated batch, enqueues it,
    /// and submits a delivery worker. Returns without waiting for delivery;
    /// await the handle to observe that batch's outcome. Failed deliveries
    /// are not retried.
    pub fn flush(&self) -> Result<FlushHandle, ServiceError> {
        self.ensure_running()?;
        match self.pipeline.snapshot_and_enqueue() {
            None => Ok(FlushHandle::Empty),
            Some(size) => {
                debug!("Flushing batch of {size} records");
                Ok(self
                    .pool
                    .deliver(Arc::clone(&self.pipeline), Arc::clone(&self.sink)))
            }
        }
    }

    /// Stops accepting work, flushes anything still pending, drains the
    /// worker pool within the configured timeout, and closes the sink.
    ///
    /// An elapsed drain timeout is fatal: the error is surfaced and the
    /// sink is left unclosed rather than pretending delivery completed.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        if self
            .state
            .compare_exchange(
                STATE_RUNNING,
                STATE_DRAINING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(ServiceError::NotRunning);
        }

        info!("Draining log service");
        self.flusher_cancel.cancel();

        if let Some(size) = self.pipeline.snapshot_and_enqueue() {
            debug!("Final flush of {size} records");
            let _handle = self
                .pool
                .deliver(Arc::clone(&self.pipeline), Arc::clone(&self.sink));
        }

        self.pool.close();
        if self.pool.drain(self.shutdown_timeout).await.is_err() {
            return Err(ServiceError::ShutdownTimeout);
        }

        self.sink
            .close()
            .await
            .map_err(|e| ServiceError::SinkClose(e.to_string()))?;

        self.state.store(STATE_TERMINATED, Ordering::Release);
        info!("Log service terminated");
        Ok(())
    }

    /// The active sink, shared for read-only use by external collaborators.
    pub fn sink(&self) -> Arc<dyn Sink> {
        Arc::clone(&self.sink)
    }

    /// Records buffered and not yet flushed.
    pub fn pending_records(&self) -> usize {
        self.pipeline.pending_records()
    }
}

impl Drop for LogService {
    fn drop(&mut self) {
        self.flusher_cancel.cancel();
    }
}
