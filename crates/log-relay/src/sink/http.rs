// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP sink: ships batches as JSON to an ingestion endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::warn;

use crate::accumulator::Batch;
use crate::errors::SinkError;
use crate::record::LogRecord;
use crate::sink::Sink;

const INGEST_PATH: &str = "/logs/ingest";
const WIRE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How many delivery attempts a batch gets and how they are spaced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Up to `n` back-to-back attempts.
    Immediate(u64),
    /// Up to `n` attempts with a fixed delay in milliseconds between them.
    LinearBackoff(u64, u64),
}

impl RetryStrategy {
    fn max_attempts(&self) -> u64 {
        match self {
            RetryStrategy::Immediate(attempts) => (*attempts).max(1),
            RetryStrategy::LinearBackoff(attempts, _) => (*attempts).max(1),
        }
    }

    async fn backoff(&self) {
        if let RetryStrategy::LinearBackoff(_, delay_ms) = self {
            tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
        }
    }
}

impl Default for RetryStrategy {
    // A single attempt: retrying is an explicit operator opt-in.
    fn default() -> Self {
        RetryStrategy::Immediate(1)
    }
}

/// One record as it appears on the ingestion wire. Field names and casing
/// are fixed by the endpoint's schema.
#[derive(Serialize)]
struct WireRecord<'a> {
    data: &'a str,
    severity: &'a str,
    timestamp: String,
    #[serde(rename = "threadId")]
    thread_id: &'a str,
    #[serde(rename = "threadName")]
    thread_name: &'a str,
    #[serde(rename = "stackTrace")]
    stack_trace: &'a str,
    project_name: &'a str,
    #[serde(rename = "user_Id")]
    user_id: &'a str,
}

fn to_wire(record: &LogRecord) -> WireRecord<'_> {
    WireRecord {
        data: &record.message,
        severity: record.severity.as_str(),
        timestamp: record
            .timestamp
            .map(|ts| ts.format(WIRE_TIMESTAMP_FORMAT).to_string())
            .unwrap_or_default(),
        thread_id: record.thread_id.as_deref().unwrap_or_default(),
        thread_name: record.thread_name.as_deref().unwrap_or_default(),
        stack_trace: record.stack_trace.as_deref().unwrap_or_default(),
        project_name: record.project_name.as_deref().unwrap_or_default(),
        user_id: record.tenant_id.as_deref().unwrap_or_default(),
    }
}

/// Ships batches with a synchronous POST per batch. The client is built
/// once and shared read-only across delivery workers.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    retry_strategy: RetryStrategy,
}

impl HttpSink {
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        retry_strategy: RetryStrategy,
    ) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(HttpSink {
            client,
            endpoint: format!("{}{INGEST_PATH}", base_url.trim_end_matches('/')),
            retry_strategy,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn append(&self, batch: Batch) -> Result<(), SinkError> {
        if batch.is_empty() {
            return Ok(());
        }
        let payload: Vec<WireRecord<'_>> = batch.records().iter().map(to_wire).collect();

        let max_attempts = self.retry_strategy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match self.client.post(&self.endpoint).json(&payload).send().await {
                Ok(response) if response.status() == StatusCode::OK => return Ok(()),
                Ok(response) => SinkError::Delivery {
                    status: response.status().as_u16(),
                },
                Err(e) => SinkError::Transport(e),
            };
            if attempt >= max_attempts {
                return Err(failure);
            }
            warn!(
                "Attempt {attempt}/{max_attempts} to ship {} records failed: {failure}",
                batch.len()
            );
            self.retry_strategy.backoff().await;
        }
    }

    async fn delete_oldest(&self) -> Result<(), SinkError> {
        // The ingestion endpoint owns retention; there is no remote delete.
        Err(SinkError::Unsupported("delete"))
    }

    async fn close(&self) -> Result<(), SinkError> {
        // Nothing held beyond the pooled client.
        Ok(())
    }
}
