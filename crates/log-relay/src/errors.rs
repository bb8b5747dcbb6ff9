// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors raised when inserting into the accumulator.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("Pending record limit of {limit} reached")]
    Overflow { limit: usize },
}

/// Errors raised by sink operations or the delivery workers driving them.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Delivery rejected with status {status}")]
    Delivery { status: u16 },

    #[error("Delivery request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode batch: {0}")]
    Encode(String),

    #[error("Operation '{0}' is not supported by this sink")]
    Unsupported(&'static str),

    #[error("Sink is closed")]
    Closed,

    #[error("Delivery worker failed: {0}")]
    Worker(String),
}
