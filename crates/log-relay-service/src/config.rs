// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use log_relay::constants::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_DRAIN_TIMEOUT, DEFAULT_WORKER_COUNT, MAX_PENDING_RECORDS,
};
use log_relay::sink::RetryStrategy;

use crate::error::ServiceError;

const DEFAULT_INGEST_URL: &str = "http://localhost:8000";

/// Which sink the service delivers to, selected at construction.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkConfig {
    /// Append-only on-disk log under `directory`.
    File { directory: PathBuf },
    /// JSON batches POSTed to `<base_url>/logs/ingest`.
    Http {
        base_url: String,
        connect_timeout: Duration,
        retry_strategy: RetryStrategy,
    },
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig::Http {
            base_url: DEFAULT_INGEST_URL.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_strategy: RetryStrategy::default(),
        }
    }
}

/// Configuration for the log service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Tenant the emitted records belong to
    pub tenant_id: String,
    /// Project name stamped onto every record
    pub project_name: String,
    /// Delivery destination
    pub sink: SinkConfig,
    /// Maximum concurrent delivery workers
    pub worker_count: usize,
    /// Cap on records buffered between flushes
    pub max_pending_records: usize,
    /// Periodic background flush cadence; `None` leaves flushing to callers
    pub flush_interval: Option<Duration>,
    /// Bound on draining in-flight deliveries at shutdown
    pub shutdown_timeout: Duration,
    /// Log level for the hosting process (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tenant_id: "default".to_string(),
            project_name: "default".to_string(),
            sink: SinkConfig::default(),
            worker_count: DEFAULT_WORKER_COUNT,
            max_pending_records: MAX_PENDING_RECORDS,
            flush_interval: None,
            shutdown_timeout: DEFAULT_DRAIN_TIMEOUT,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ServiceError> {
        let defaults = ServiceConfig::default();

        let tenant_id = env::var("LR_TENANT_ID").unwrap_or(defaults.tenant_id);
        let project_name = env::var("LR_PROJECT_NAME").unwrap_or(defaults.project_name);
        let worker_count = env::var("LR_WORKER_COUNT")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(DEFAULT_WORKER_COUNT);
        let max_pending_records = env::var("LR_MAX_PENDING_RECORDS")
            .ok()
            .and_then(|val| val.parse::<usize>().ok())
            .unwrap_or(MAX_PENDING_RECORDS);
        let flush_interval = env::var("LR_FLUSH_INTERVAL_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map(Duration::from_secs);
        let shutdown_timeout = env::var("LR_SHUTDOWN_TIMEOUT_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        let log_level = env::var("LR_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let sink = match env::var("LR_SINK").as_deref() {
            Ok("file") => SinkConfig::File {
                directory: env::var("LR_LOG_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./logs")),
            },
            _ => {
                let connect_timeout = env::var("LR_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|val| val.parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_CONNECT_TIMEOUT);
                let retry_strategy = env::var("LR_DELIVERY_ATTEMPTS")
                    .ok()
                    .and_then(|val| val.parse::<u64>().ok())
                    .map(RetryStrategy::Immediate)
                    .unwrap_or_default();
                SinkConfig::Http {
                    base_url: env::var("LR_INGEST_URL")
                        .unwrap_or_else(|_| DEFAULT_INGEST_URL.to_string()),
                    connect_timeout,
                    retry_strategy,
                }
            }
        };

        let config = Self {
            tenant_id,
            project_name,
            sink,
            worker_count,
            max_pending_records,
            flush_interval,
            shutdown_timeout,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "tenant id cannot be empty".to_string(),
            ));
        }

        if self.project_name.trim().is_empty() {
            return Err(ServiceError::InvalidConfig(
                "project name cannot be empty".to_string(),
            ));
        }

        if self.worker_count == 0 {
            return Err(ServiceError::InvalidConfig(
                "worker count must be greater than 0".to_string(),
            ));
        }

        if self.max_pending_records == 0 {
            return Err(ServiceError::InvalidConfig(
                "pending record limit must be greater than 0".to_string(),
            ));
        }

        if let SinkConfig::Http { base_url, .. } = &self.sink {
            if base_url.trim().is_empty() {
                return Err(ServiceError::InvalidConfig(
                    "ingest URL cannot be empty".to_string(),
                ));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(ServiceError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}
