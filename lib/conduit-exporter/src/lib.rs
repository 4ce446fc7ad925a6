//! OTLP exporters.
//!
//! [`GrpcExporter`] and [`HttpExporter`] send OTLP export requests, encoded from a [`Marshaler`][conduit_marshal::Marshaler],
//! to a collector. Both share the same behavior around the transport:
//!
//! - requests are encoded on the calling thread, then sent on a Tokio runtime, with the result delivered through an
//!   [`ExportHandle`]
//! - transient failures are retried with jittered exponential backoff, according to a [`RetryPolicy`]
//! - request bodies can be gzip-compressed, and `https` endpoints are connected to over TLS, optionally with a client
//!   identity
//! - the exporter reports on itself through [`ExporterMetrics`], in one of several [`MetricsSchema`]s
//!
//! Exporters are created through their builders, which check every setting in `build()`, or from an
//! [`ExporterConfiguration`].

mod builder;

mod compression;
pub use self::compression::Compression;

mod config;
pub use self::config::ExporterConfiguration;

mod error;
pub use self::error::{BuildError, ExportError};

mod exporter;
pub use self::exporter::ExportHandle;

mod grpc_exporter;
pub use self::grpc_exporter::{GrpcExporter, GrpcExporterBuilder, GrpcTransport};

mod http_exporter;
pub use self::http_exporter::{HttpExporter, HttpExporterBuilder};

pub mod metrics;
pub use self::metrics::{ExporterMetrics, ExporterProtocol, MetricsSchema};

mod response;
pub use self::response::PartialSuccess;

pub mod retry;
pub use self::retry::RetryPolicy;

mod signal;
pub use self::signal::Signal;

mod status;
pub use self::status::StatusError;

mod transport;
pub use self::transport::{ExportRequest, ExportResponse, OtlpHttpEncoding};
