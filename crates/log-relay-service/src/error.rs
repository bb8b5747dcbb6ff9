// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors that can occur when working with the log service
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Service is not running")]
    NotRunning,

    #[error("Pending record limit of {limit} reached")]
    PendingCapacity { limit: usize },

    #[error("Failed to create sink: {0}")]
    SinkCreate(String),

    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,

    #[error("Failed to close sink: {0}")]
    SinkClose(String),
}
