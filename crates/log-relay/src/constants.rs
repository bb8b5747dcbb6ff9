// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Default number of concurrent delivery workers.
pub const DEFAULT_WORKER_COUNT: usize = 10;

/// Default cap on records buffered between flushes. `record` calls past the
/// cap are rejected rather than growing the buffer without bound.
pub const MAX_PENDING_RECORDS: usize = 10_240;

/// Default connect timeout for the HTTP sink.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on shutdown draining.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(100);

/// Share of oldest entries dropped by file sink compaction.
pub const COMPACTION_SHARE: f64 = 0.3;
