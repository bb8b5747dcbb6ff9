// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::sync::Arc;

use log_relay::record::{LogRecord, Severity};
use log_relay_service::config::ServiceConfig;
use log_relay_service::service::LogService;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
pub async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating config on log relay agent startup: {e}");
            return;
        }
    };

    let env_filter = format!("hyper=off,reqwest=off,rustls=off,{}", config.log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let service = match LogService::new(config).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!("Error starting log relay agent: {e}");
            return;
        }
    };

    info!("Log relay agent started");

    // Exercise the pipeline with a short ingestion sequence so a freshly
    // wired sink can be verified end to end.
    let startup_probe = [
        ("Payment gateway initialized successfully.", Severity::Low),
        (
            "Warning: High latency detected in DB connection pool.",
            Severity::Medium,
        ),
        (
            "CRITICAL: Connection Timeout. Failed to write transaction to table 'orders'.",
            Severity::High,
        ),
    ];
    for (message, severity) in startup_probe {
        if let Err(e) = service.record(LogRecord::with_severity(message, severity)) {
            error!("Failed to record startup probe: {e}");
        }
    }
    match service.flush() {
        Ok(handle) => {
            if let Err(e) = handle.wait().await {
                error!("Startup probe delivery failed: {e}");
            }
        }
        Err(e) => error!("Failed to flush startup probe: {e}"),
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Failed to listen for shutdown signal: {e}"),
    }

    match service.shutdown().await {
        Ok(()) => info!("Log relay agent stopped"),
        Err(e) => {
            error!("Error when draining log relay agent: {e}");
            std::process::exit(1);
        }
    }
}
