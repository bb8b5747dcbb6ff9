// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared sink doubles for the integration suite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log_relay::accumulator::Batch;
use log_relay::errors::SinkError;
use log_relay::record::LogRecord;
use log_relay::sink::Sink;

/// Captures every delivered batch for assertions.
pub struct RecordingSink {
    batches: Mutex<Vec<Vec<LogRecord>>>,
    close_calls: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingSink {
            batches: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
        })
    }

    pub fn batches(&self) -> Vec<Vec<LogRecord>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.batches()
            .into_iter()
            .flatten()
            .map(|record| record.message)
            .collect()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sink for RecordingSink {
    async fn append(&self, batch: Batch) -> Result<(), SinkError> {
        self.batches.lock().unwrap().push(batch.into_records());
        Ok(())
    }

    async fn delete_oldest(&self) -> Result<(), SinkError> {
        Err(SinkError::Unsupported("delete"))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails the first `fail_first` appends, then records like [`RecordingSink`].
pub struct FlakySink {
    pub inner: Arc<RecordingSink>,
    remaining_failures: AtomicUsize,
}

impl FlakySink {
    pub fn failing_first(fail_first: usize) -> Arc<Self> {
        Arc::new(FlakySink {
            inner: RecordingSink::new(),
            remaining_failures: AtomicUsize::new(fail_first),
        })
    }
}

#[async_trait]
impl Sink for FlakySink {
    async fn append(&self, batch: Batch) -> Result<(), SinkError> {
        if self
            .remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SinkError::Delivery { status: 500 });
        }
        self.inner.append(batch).await
    }

    async fn delete_oldest(&self) -> Result<(), SinkError> {
        Err(SinkError::Unsupported("delete"))
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.inner.close().await
    }
}

/// Holds every append until the given delay elapses; used to force drain
/// timeouts.
pub struct StallingSink {
    pub delay: Duration,
}

#[async_trait]
impl Sink for StallingSink {
    async fn append(&self, _batch: Batch) -> Result<(), SinkError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }

    async fn delete_oldest(&self) -> Result<(), SinkError> {
        Err(SinkError::Unsupported("delete"))
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
