// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Destination abstraction for delivering batches of log records.

use async_trait::async_trait;

use crate::accumulator::Batch;
use crate::errors::SinkError;

pub mod file;
pub mod http;
pub mod semantic;

pub use file::FileSink;
pub use http::{HttpSink, RetryStrategy};
pub use semantic::{EmbeddingIndex, IndexDocument, IndexMetadata, SemanticIndexSink};

/// A batch delivery destination.
///
/// Implementations are shared read-only across delivery workers and must be
/// internally thread-safe. `append` may block on I/O; it only ever runs on
/// worker tasks, never on a producer thread.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers every record in `batch` to the destination.
    async fn append(&self, batch: Batch) -> Result<(), SinkError>;

    /// Best-effort removal of a sink-chosen share of the oldest entries.
    /// Sinks that cannot delete return [`SinkError::Unsupported`] rather
    /// than silently doing nothing.
    async fn delete_oldest(&self) -> Result<(), SinkError>;

    /// Releases held resources. Runs once on shutdown after the worker pool
    /// has drained.
    async fn close(&self) -> Result<(), SinkError>;
}
