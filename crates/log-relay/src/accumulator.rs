// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory buffer of not-yet-flushed log records.

use crate::errors::InsertError;
use crate::record::LogRecord;

/// Immutable point-in-time snapshot of pending records, handed to delivery.
///
/// A batch is owned by the dispatch queue until a worker claims it and is
/// never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    records: Vec<LogRecord>,
}

impl Batch {
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<LogRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<LogRecord>> for Batch {
    fn from(records: Vec<LogRecord>) -> Self {
        Batch { records }
    }
}

/// Insert-only-until-snapshot buffer of pending records.
///
/// Every stamped insert is a distinct entry; two records with equal text are
/// both retained. Not internally synchronized: the pipeline serializes all
/// access under its shared lock.
#[derive(Debug)]
pub struct Accumulator {
    pending: Vec<LogRecord>,
    limit: usize,
}

impl Accumulator {
    pub fn new(limit: usize) -> Self {
        Accumulator {
            pending: Vec::new(),
            limit,
        }
    }

    /// Buffers a stamped record. Rejects the insert once `limit` records are
    /// pending so an unflushed buffer cannot grow without bound.
    pub fn insert(&mut self, record: LogRecord) -> Result<(), InsertError> {
        if self.pending.len() >= self.limit {
            return Err(InsertError::Overflow { limit: self.limit });
        }
        self.pending.push(record);
        Ok(())
    }

    /// Moves the current contents out as an independently-owned [`Batch`]
    /// and empties the buffer in the same step. Callers hold the pipeline
    /// lock across this call and the matching enqueue.
    pub fn snapshot_and_clear(&mut self) -> Batch {
        Batch {
            records: std::mem::take(&mut self.pending),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
