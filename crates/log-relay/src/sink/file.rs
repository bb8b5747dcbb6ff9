// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Append-only on-disk sink using length-prefixed MessagePack frames.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

use crate::accumulator::Batch;
use crate::constants::COMPACTION_SHARE;
use crate::errors::SinkError;
use crate::record::LogRecord;
use crate::sink::Sink;

/// On-disk log of serialized records: each entry is a u32 little-endian
/// length followed by that many bytes of MessagePack.
///
/// Compaction (`delete_oldest`) decodes the whole file, drops the oldest
/// share of entries, and rewrites the remainder. O(n) in the file size;
/// acceptable only for small files.
pub struct FileSink {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl FileSink {
    /// Creates `directory` if needed and opens a fresh log file in it,
    /// named after the current epoch second.
    pub async fn create(directory: impl AsRef<Path>) -> Result<Self, SinkError> {
        let directory = directory.as_ref();
        tokio::fs::create_dir_all(directory).await?;
        let path = directory.join(format!("{}.log", Utc::now().timestamp()));
        FileSink::open(path).await
    }

    /// Opens `path` for appending, creating it if missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(FileSink {
            path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn encode_frame(record: &LogRecord) -> Result<Vec<u8>, SinkError> {
    let body = rmp_serde::to_vec_named(record).map_err(|e| SinkError::Encode(e.to_string()))?;
    let length =
        u32::try_from(body.len()).map_err(|_| SinkError::Encode("record too large".into()))?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&length.to_le_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

fn decode_frames(mut bytes: &[u8]) -> Result<Vec<LogRecord>, SinkError> {
    let mut records = Vec::new();
    while !bytes.is_empty() {
        if bytes.len() < 4 {
            return Err(SinkError::Encode("truncated frame header".into()));
        }
        let (header, rest) = bytes.split_at(4);
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        if rest.len() < length {
            return Err(SinkError::Encode("truncated frame body".into()));
        }
        let (body, remainder) = rest.split_at(length);
        let record =
            rmp_serde::from_slice(body).map_err(|e| SinkError::Encode(e.to_string()))?;
        records.push(record);
        bytes = remainder;
    }
    Ok(records)
}

#[async_trait]
impl Sink for FileSink {
    async fn append(&self, batch: Batch) -> Result<(), SinkError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SinkError::Closed)?;
        for record in batch.records() {
            let frame = encode_frame(record)?;
            writer.write_all(&frame).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    async fn delete_oldest(&self) -> Result<(), SinkError> {
        let mut guard = self.writer.lock().await;
        if let Some(writer) = guard.as_mut() {
            writer.flush().await?;
        }

        let bytes = tokio::fs::read(&self.path).await?;
        let records = decode_frames(&bytes)?;
        let drop_count = (records.len() as f64 * COMPACTION_SHARE) as usize;
        if drop_count == 0 {
            return Ok(());
        }

        let mut remainder = Vec::new();
        for record in &records[drop_count..] {
            remainder.extend_from_slice(&encode_frame(record)?);
        }
        tokio::fs::write(&self.path, remainder).await?;

        // The old append handle would still write at the new end, but a
        // fresh one keeps the buffered state unambiguous.
        if guard.is_some() {
            let file = OpenOptions::new().append(true).open(&self.path).await?;
            *guard = Some(BufWriter::new(file));
        }

        info!(
            "Compacted {}: dropped the oldest {} of {} entries",
            self.path.display(),
            drop_count,
            records.len()
        );
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        let mut guard = self.writer.lock().await;
        if let Some(mut writer) = guard.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
        }
        Ok(())
    }
}
