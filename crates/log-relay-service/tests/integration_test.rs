// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end pipeline properties exercised through the service facade.

mod common;

use std::sync::Arc;
use std::time::Duration;

use log_relay::record::{LogRecord, Severity};
use log_relay::sink::RetryStrategy;
use log_relay_service::config::{ServiceConfig, SinkConfig};
use log_relay_service::error::ServiceError;
use log_relay_service::service::LogService;

use common::{FlakySink, RecordingSink, StallingSink};

fn test_config() -> ServiceConfig {
    ServiceConfig {
        tenant_id: "da86dca2-b84c-4e99-9120-ee1bcdad348b".to_string(),
        project_name: "PaymentService".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn two_flushes_deliver_two_batches_in_order() {
    let sink = RecordingSink::new();
    let service = LogService::with_sink(test_config(), sink.clone()).expect("service failed");

    let first_wave = [
        ("FATAL: Database connection timed out after 3 attempts", Severity::Critical),
        ("WARN: Cache eviction policy is not optimal", Severity::Warn),
        ("ERROR: Null pointer exception at user processing service", Severity::High),
        ("INFO: User 'admin' logged in successfully", Severity::Low),
        ("ERROR: Failed to connect to the primary database server.", Severity::Warn),
    ];
    for (message, severity) in first_wave {
        service
            .record(LogRecord::with_severity(message, severity))
            .expect("record failed");
    }
    let first = service.flush().expect("flush failed");

    for i in 6..=10 {
        service
            .record(LogRecord::with_severity(
                format!("This is log {i}"),
                Severity::Medium,
            ))
            .expect("record failed");
    }
    let second = service.flush().expect("flush failed");

    assert_eq!(first.wait().await.expect("delivery failed"), 5);
    assert_eq!(second.wait().await.expect("delivery failed"), 5);
    service.shutdown().await.expect("shutdown failed");

    let batches = sink.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 5);
    assert_eq!(batches[1].len(), 5);
    assert_eq!(
        batches[0][0].message,
        "FATAL: Database connection timed out after 3 attempts"
    );
    assert_eq!(batches[1][0].message, "This is log 6");

    // All ten messages delivered exactly once, none duplicated by snapshots
    let mut messages = sink.messages();
    assert_eq!(messages.len(), 10);
    messages.sort();
    messages.dedup();
    assert_eq!(messages.len(), 10);

    // Every delivered record carries its ingestion stamp
    for record in batches.iter().flatten() {
        assert!(record.is_stamped());
        assert_eq!(record.project_name.as_deref(), Some("PaymentService"));
        assert_eq!(
            record.tenant_id.as_deref(),
            Some("da86dca2-b84c-4e99-9120-ee1bcdad348b")
        );
    }
}

#[tokio::test]
async fn records_after_flush_never_join_the_flushed_batch() {
    let sink = RecordingSink::new();
    let service = LogService::with_sink(test_config(), sink.clone()).expect("service failed");

    for i in 0..3 {
        service
            .record(LogRecord::new(format!("before-{i}")))
            .expect("record failed");
    }
    let handle = service.flush().expect("flush failed");

    // The accumulator is empty the moment flush returns
    assert_eq!(service.pending_records(), 0);

    service
        .record(LogRecord::new("after-0"))
        .expect("record failed");
    service
        .record(LogRecord::new("after-1"))
        .expect("record failed");

    assert_eq!(handle.wait().await.expect("delivery failed"), 3);
    let batches = sink.batches();
    assert_eq!(batches[0].len(), 3);
    assert!(batches[0].iter().all(|r| r.message.starts_with("before-")));
    assert_eq!(service.pending_records(), 2);

    service.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
async fn shutdown_drains_every_submitted_flush() {
    let sink = RecordingSink::new();
    let service = LogService::with_sink(test_config(), sink.clone()).expect("service failed");

    for batch in 0..4 {
        for i in 0..3 {
            service
                .record(LogRecord::new(format!("b{batch}-{i}")))
                .expect("record failed");
        }
        let _handle = service.flush().expect("flush failed");
    }

    service.shutdown().await.expect("shutdown failed");

    assert_eq!(sink.batches().len(), 4);
    assert_eq!(sink.messages().len(), 12);
    assert_eq!(sink.close_calls(), 1);
}

#[tokio::test]
async fn failed_delivery_does_not_stall_the_pipeline() {
    let sink = FlakySink::failing_first(1);
    let service = LogService::with_sink(test_config(), sink.clone()).expect("service failed");

    service
        .record(LogRecord::new("doomed"))
        .expect("record failed");
    let first = service.flush().expect("flush failed");

    service
        .record(LogRecord::new("survivor"))
        .expect("record failed");
    let second = service.flush().expect("flush failed");

    assert!(first.wait().await.is_err());
    assert_eq!(second.wait().await.expect("delivery failed"), 1);

    service.shutdown().await.expect("shutdown failed");
    assert_eq!(sink.inner.messages(), vec!["survivor".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_lose_no_records() {
    let sink = RecordingSink::new();
    let service =
        Arc::new(LogService::with_sink(test_config(), sink.clone()).expect("service failed"));

    let mut producers = Vec::new();
    for p in 0..4 {
        let service = Arc::clone(&service);
        producers.push(std::thread::spawn(move || {
            for i in 0..50 {
                service
                    .record(LogRecord::new(format!("p{p}-{i}")))
                    .expect("record failed");
            }
        }));
    }
    for producer in producers {
        producer.join().expect("producer panicked");
    }

    let handle = service.flush().expect("flush failed");
    assert_eq!(handle.wait().await.expect("delivery failed"), 200);
    service.shutdown().await.expect("shutdown failed");
    assert_eq!(sink.messages().len(), 200);
}

#[tokio::test]
async fn drain_timeout_is_fatal() {
    let sink = Arc::new(StallingSink {
        delay: Duration::from_secs(60),
    });
    let config = ServiceConfig {
        shutdown_timeout: Duration::from_millis(100),
        ..test_config()
    };
    let service = LogService::with_sink(config, sink).expect("service failed");

    service
        .record(LogRecord::new("stuck"))
        .expect("record failed");
    let _handle = service.flush().expect("flush failed");

    assert!(matches!(
        service.shutdown().await,
        Err(ServiceError::ShutdownTimeout)
    ));
}

#[tokio::test]
async fn periodic_flusher_ships_without_explicit_flush() {
    let sink = RecordingSink::new();
    let config = ServiceConfig {
        flush_interval: Some(Duration::from_millis(20)),
        ..test_config()
    };
    let service = LogService::with_sink(config, sink.clone()).expect("service failed");

    service
        .record(LogRecord::new("hands-free"))
        .expect("record failed");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while sink.batches().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(sink.messages(), vec!["hands-free".to_string()]);
    service.shutdown().await.expect("shutdown failed");
}

#[tokio::test]
async fn severity_defaults_to_low_only_when_unset() {
    let sink = RecordingSink::new();
    let service = LogService::with_sink(test_config(), sink.clone()).expect("service failed");

    service
        .record(LogRecord::new("no severity"))
        .expect("record failed");
    service
        .record(LogRecord::with_severity("already high", Severity::High))
        .expect("record failed");

    let handle = service.flush().expect("flush failed");
    handle.wait().await.expect("delivery failed");
    service.shutdown().await.expect("shutdown failed");

    let batches = sink.batches();
    assert_eq!(batches[0][0].severity, Severity::Low);
    assert_eq!(batches[0][1].severity, Severity::High);
}

#[tokio::test]
async fn http_sink_ships_the_wire_contract_end_to_end() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/logs/ingest")
        .match_header("Content-Type", "application/json")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex(r#""data":"CRITICAL: Connection Timeout"#.to_string()),
            mockito::Matcher::Regex(r#""severity":"high""#.to_string()),
            mockito::Matcher::Regex(r#""project_name":"PaymentService""#.to_string()),
            mockito::Matcher::Regex(r#""user_Id":"da86dca2-b84c-4e99-9120-ee1bcdad348b""#.to_string()),
            mockito::Matcher::Regex(r#""threadId""#.to_string()),
            mockito::Matcher::Regex(r#""threadName""#.to_string()),
            mockito::Matcher::Regex(r#""stackTrace""#.to_string()),
            mockito::Matcher::Regex(r#""timestamp""#.to_string()),
        ]))
        .with_status(200)
        .create_async()
        .await;

    let config = ServiceConfig {
        sink: SinkConfig::Http {
            base_url: server.url(),
            connect_timeout: Duration::from_secs(5),
            retry_strategy: RetryStrategy::Immediate(1),
        },
        ..test_config()
    };
    let service = LogService::new(config).await.expect("service failed");

    service
        .record(LogRecord::with_severity(
            "CRITICAL: Connection Timeout. Failed to write transaction to table 'orders'.",
            Severity::High,
        ))
        .expect("record failed");

    let handle = service.flush().expect("flush failed");
    assert_eq!(handle.wait().await.expect("delivery failed"), 1);
    service.shutdown().await.expect("shutdown failed");

    mock.assert_async().await;
}

#[tokio::test]
async fn file_sink_survives_service_shutdown() {
    let dir = tempfile::tempdir().expect("tempdir failed");
    let config = ServiceConfig {
        sink: SinkConfig::File {
            directory: dir.path().join("logs"),
        },
        ..test_config()
    };
    let service = LogService::new(config).await.expect("service failed");

    service
        .record(LogRecord::with_severity("persisted", Severity::Warn))
        .expect("record failed");
    let handle = service.flush().expect("flush failed");
    assert_eq!(handle.wait().await.expect("delivery failed"), 1);
    service.shutdown().await.expect("shutdown failed");

    let mut entries = std::fs::read_dir(dir.path().join("logs")).expect("read_dir failed");
    let file = entries.next().expect("log file written").expect("entry");
    let size = file.metadata().expect("metadata").len();
    assert!(size > 0, "closed log file should contain the batch");
}
