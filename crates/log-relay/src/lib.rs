// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching-and-dispatch pipeline for application log events.
//!
//! Producers hand [`record::LogRecord`]s to an in-memory accumulator; a
//! flush takes an isolated snapshot, enqueues it as a [`accumulator::Batch`],
//! and a bounded worker pool delivers batches to the active [`sink::Sink`]
//! off the producer threads.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod accumulator;
pub mod constants;
pub mod dispatch;
pub mod errors;
pub mod record;
pub mod sink;
