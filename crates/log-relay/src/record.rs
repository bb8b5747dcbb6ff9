// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The log event value type and its ingestion-time stamping.

use std::backtrace::Backtrace;
use std::fmt;
use std::thread;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity attached to a log event by its producer.
///
/// `Undefined` is the pre-ingestion default and maps to `Low` at stamping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Warn,
    #[default]
    Undefined,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Warn => "warn",
            Severity::Undefined => "undefined",
        }
    }

    /// Case-insensitive parse of a severity name.
    pub fn parse(value: &str) -> Option<Severity> {
        match value.trim().to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "warn" => Some(Severity::Warn),
            "undefined" => Some(Severity::Undefined),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One log event.
///
/// Producers set `message` and optionally `severity`; everything else is
/// stamped at ingestion and immutable afterwards. Structural clones
/// ([`Clone`]) are how snapshots copy records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub message: String,
    pub severity: Severity,
    /// Ingest timestamp (UTC, millisecond resolution). `None` until stamped.
    pub timestamp: Option<DateTime<Utc>>,
    pub thread_id: Option<String>,
    pub thread_name: Option<String>,
    pub stack_trace: Option<String>,
    pub project_name: Option<String>,
    pub tenant_id: Option<String>,
}

impl LogRecord {
    pub fn new(message: impl Into<String>) -> Self {
        LogRecord {
            message: message.into(),
            severity: Severity::Undefined,
            timestamp: None,
            thread_id: None,
            thread_name: None,
            stack_trace: None,
            project_name: None,
            tenant_id: None,
        }
    }

    pub fn with_severity(message: impl Into<String>, severity: Severity) -> Self {
        LogRecord {
            severity,
            ..LogRecord::new(message)
        }
    }

    /// Whether ingestion metadata has been stamped onto this record.
    pub fn is_stamped(&self) -> bool {
        self.timestamp.is_some()
    }

    /// Stamps ingestion metadata: wall-clock timestamp, the calling thread's
    /// id and name, the captured stack context, and the owning
    /// project/tenant identity.
    ///
    /// A severity already set by the producer is preserved; `Undefined`
    /// becomes `Low`.
    pub fn stamp(&mut self, project_name: &str, tenant_id: &str) {
        let now = DateTime::<Utc>::from_timestamp_millis(Utc::now().timestamp_millis())
            .unwrap_or_else(Utc::now);
        let current = thread::current();

        self.timestamp = Some(now);
        self.thread_id = Some(format!("{:?}", current.id()));
        self.thread_name = Some(current.name().unwrap_or("unnamed").to_string());
        self.stack_trace = Some(Backtrace::force_capture().to_string());
        if self.severity == Severity::Undefined {
            self.severity = Severity::Low;
        }
        self.project_name = Some(project_name.to_string());
        self.tenant_id = Some(tenant_id.to_string());
    }
}
