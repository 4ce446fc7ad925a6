use std::time::Duration;

use async_compression::tokio::bufread::GzipDecoder;
use bytes::Bytes;
use conduit_exporter::{ExportError, HttpExporter, OtlpHttpEncoding, RetryPolicy, Signal};
use conduit_marshal::{
    otlp::{instrumentation_scope_marshaler, InstrumentationScope, KeyValue},
    to_binary, Marshaler, MemoryMode,
};
use http::StatusCode;
use tokio::io::AsyncReadExt as _;

mod common;
use self::common::{MockCollector, MockResponse};

fn scope() -> Box<dyn Marshaler + Send> {
    instrumentation_scope_marshaler(
        InstrumentationScope {
            name: "io.conduit.checkout".to_string(),
            version: "1.4.0".to_string(),
            attributes: vec![KeyValue::new("deployment", "canary")],
            dropped_attributes_count: 0,
        },
        MemoryMode::ImmutableData,
    )
}

fn fast_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_attempts(max_attempts)
        .initial_backoff(Duration::from_millis(5))
        .max_backoff(Duration::from_millis(20))
        .build()
        .unwrap()
}

fn endpoint(collector: &MockCollector, signal: Signal) -> String {
    format!("{}{}", collector.http_endpoint(), signal.http_path())
}

#[tokio::test]
async fn protobuf_request() {
    let collector = MockCollector::start(MockResponse::http(200)).await;
    let exporter = HttpExporter::builder(Signal::Logs)
        .with_endpoint(endpoint(&collector, Signal::Logs))
        .add_header("authorization", "Bearer token")
        .build()
        .unwrap();

    let payload = scope();
    exporter.export(&*payload, 3).await.unwrap();

    let requests = collector.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.path, "/v1/logs");
    assert_eq!(request.header("content-type"), Some("application/x-protobuf"));
    assert_eq!(request.header("authorization"), Some("Bearer token"));
    assert_eq!(request.header("content-encoding"), None);
    assert_eq!(request.body, to_binary(&*payload).unwrap());
}

#[tokio::test]
async fn json_request_with_gzip() {
    let collector = MockCollector::start(MockResponse::http(200)).await;
    let exporter = HttpExporter::builder(Signal::Traces)
        .with_endpoint(endpoint(&collector, Signal::Traces))
        .with_encoding(OtlpHttpEncoding::Json)
        .with_compression("gzip")
        .build()
        .unwrap();

    exporter.export(&*scope(), 1).await.unwrap();

    let request = &collector.requests()[0];
    assert_eq!(request.path, "/v1/traces");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert_eq!(request.header("content-encoding"), Some("gzip"));

    let mut body = Vec::new();
    GzipDecoder::new(&request.body[..])
        .read_to_end(&mut body)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["name"], "io.conduit.checkout");
    assert_eq!(json["version"], "1.4.0");
    assert_eq!(json["attributes"][0]["key"], "deployment");
}

#[tokio::test]
async fn retryable_statuses_are_retried() {
    let collector = MockCollector::start(MockResponse::http(200)).await;
    collector.respond_with([MockResponse::http(503), MockResponse::http(429)]);
    let exporter = HttpExporter::builder(Signal::Metrics)
        .with_endpoint(endpoint(&collector, Signal::Metrics))
        .with_retry_policy(fast_retries(5))
        .build()
        .unwrap();

    exporter.export(&*scope(), 1).await.unwrap();
    assert_eq!(collector.requests().len(), 3);
}

#[tokio::test]
async fn client_errors_are_permanent() {
    let collector = MockCollector::start(MockResponse::Http {
        status: StatusCode::BAD_REQUEST,
        body: Bytes::from_static(br#"{"code":3,"message":"resource attributes are invalid"}"#),
    })
    .await;
    let exporter = HttpExporter::builder(Signal::Metrics)
        .with_endpoint(endpoint(&collector, Signal::Metrics))
        .with_encoding(OtlpHttpEncoding::Json)
        .with_retry_policy(fast_retries(5))
        .build()
        .unwrap();

    let error = exporter.export(&*scope(), 1).await.unwrap_err();
    match &error {
        ExportError::Http { status, message } => {
            assert_eq!(*status, StatusCode::BAD_REQUEST);
            assert_eq!(message, "resource attributes are invalid");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(!error.is_retryable());
    assert_eq!(collector.requests().len(), 1);
}

#[tokio::test]
async fn partial_success_is_still_success() {
    // ExportLogsServiceResponse { partial_success: { rejected_log_records: 2, error_message: "too old" } }
    let response = Bytes::from_static(b"\x0a\x0b\x08\x02\x12\x07too old");
    let collector = MockCollector::start(MockResponse::Http {
        status: StatusCode::OK,
        body: response,
    })
    .await;
    let exporter = HttpExporter::builder(Signal::Logs)
        .with_endpoint(endpoint(&collector, Signal::Logs))
        .build()
        .unwrap();

    exporter.export(&*scope(), 4).await.unwrap();
}

#[tokio::test]
async fn export_after_shutdown_does_no_io() {
    let collector = MockCollector::start(MockResponse::http(200)).await;
    let exporter = HttpExporter::builder(Signal::Logs)
        .with_endpoint(endpoint(&collector, Signal::Logs))
        .build()
        .unwrap();

    exporter.shutdown().await.unwrap();
    exporter.shutdown().await.unwrap();
    exporter.flush().await.unwrap();

    let error = exporter.export(&*scope(), 1).await.unwrap_err();
    assert!(matches!(error, ExportError::Shutdown));
    assert!(collector.requests().is_empty());
}
