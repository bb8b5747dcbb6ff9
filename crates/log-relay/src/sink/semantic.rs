// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Semantic-index sink: converts records to searchable documents and
//! delegates embedding + storage to an external index collaborator.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::accumulator::Batch;
use crate::errors::SinkError;
use crate::record::LogRecord;
use crate::sink::Sink;

/// Structured metadata stored alongside a document for filtered retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexMetadata {
    pub severity: String,
    #[serde(rename = "threadId")]
    pub thread_id: String,
    #[serde(rename = "threadName")]
    pub thread_name: String,
    /// ISO-8601 rendering of the ingest timestamp.
    pub timestamp: String,
}

/// One searchable unit handed to the embedding index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDocument {
    pub text: String,
    pub metadata: IndexMetadata,
}

/// External embedding/vector-store boundary. Implementations own the
/// embedding model and the index; retrieval collaborators consume this
/// handle directly rather than going through the log service.
#[async_trait]
pub trait EmbeddingIndex: Send + Sync {
    /// Embeds and stores the given documents as one batch.
    async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<(), SinkError>;
}

/// Converts a record into its searchable representation: the severity,
/// message, and stack context become the embeddable text, the remaining
/// provenance fields become filterable metadata.
pub fn to_document(record: &LogRecord) -> IndexDocument {
    IndexDocument {
        text: format!(
            "{}. {}. {}",
            record.severity,
            record.message,
            record.stack_trace.as_deref().unwrap_or("None"),
        ),
        metadata: IndexMetadata {
            severity: record.severity.to_string(),
            thread_id: record.thread_id.clone().unwrap_or_default(),
            thread_name: record.thread_name.clone().unwrap_or_default(),
            timestamp: record
                .timestamp
                .map(|ts| ts.to_rfc3339())
                .unwrap_or_default(),
        },
    }
}

pub struct SemanticIndexSink {
    index: Arc<dyn EmbeddingIndex>,
}

impl SemanticIndexSink {
    pub fn new(index: Arc<dyn EmbeddingIndex>) -> Self {
        SemanticIndexSink { index }
    }

    /// The underlying index handle, for retrieval collaborators.
    pub fn index(&self) -> Arc<dyn EmbeddingIndex> {
        Arc::clone(&self.index)
    }
}

#[async_trait]
impl Sink for SemanticIndexSink {
    async fn append(&self, batch: Batch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let documents: Vec<IndexDocument> = batch.records().iter().map(to_document).collect();
        let count = documents.len();
        self.index.add_documents(documents).await?;
        debug!("Indexed {count} documents");
        Ok(())
    }

    async fn delete_oldest(&self) -> Result<(), SinkError> {
        // A non-persistent index has no deletion; report it rather than
        // letting callers believe cleanup happened.
        Err(SinkError::Unsupported("delete"))
    }

    async fn close(&self) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Severity;
    use std::sync::Mutex;

    struct RecordingIndex {
        documents: Mutex<Vec<IndexDocument>>,
    }

    #[async_trait]
    impl EmbeddingIndex for RecordingIndex {
        async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<(), SinkError> {
            self.documents.lock().unwrap().extend(documents);
            Ok(())
        }
    }

    #[test]
    fn test_to_document_text_shape() {
        let mut record = LogRecord::with_severity("payment timed out", Severity::Critical);
        record.stamp("checkout", "tenant-1");

        let document = to_document(&record);
        assert!(document.text.starts_with("critical. payment timed out. "));
        assert_eq!(document.metadata.severity, "critical");
        assert!(!document.metadata.thread_id.is_empty());
        assert!(!document.metadata.thread_name.is_empty());
        // RFC 3339 keeps the timestamp lexicographically sortable
        assert!(document.metadata.timestamp.contains('T'));
    }

    #[test]
    fn test_to_document_without_stack_context() {
        let record = LogRecord::with_severity("payment timed out", Severity::High);
        let document = to_document(&record);
        assert_eq!(document.text, "high. payment timed out. None");
        assert_eq!(document.metadata.timestamp, "");
    }

    #[tokio::test]
    async fn test_append_delegates_to_index() {
        let index = Arc::new(RecordingIndex {
            documents: Mutex::new(Vec::new()),
        });
        let sink = SemanticIndexSink::new(index.clone());

        let mut record = LogRecord::with_severity("payment timed out", Severity::High);
        record.stamp("checkout", "tenant-1");
        sink.append(vec![record].into()).await.expect("append failed");

        let stored = index.documents.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].text.starts_with("high. payment timed out."));
    }

    #[tokio::test]
    async fn test_delete_is_reported_unsupported() {
        let index = Arc::new(RecordingIndex {
            documents: Mutex::new(Vec::new()),
        });
        let sink = SemanticIndexSink::new(index);

        assert!(matches!(
            sink.delete_oldest().await,
            Err(SinkError::Unsupported("delete"))
        ));
    }
}
