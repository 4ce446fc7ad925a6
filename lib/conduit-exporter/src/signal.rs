use std::fmt;

use http::uri::PathAndQuery;
use serde::Deserialize;

/// A telemetry signal.
///
/// Each signal has its own collector service, HTTP path, and set of exporter metric names.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    /// Spans.
    Traces,

    /// Metric data points.
    Metrics,

    /// Log records.
    Logs,
}

impl Signal {
    /// Returns the fully-qualified gRPC method path of the collector's `Export` call for this signal.
    pub const fn grpc_path(&self) -> &'static str {
        match self {
            Self::Traces => "/opentelemetry.proto.collector.trace.v1.TraceService/Export",
            Self::Metrics => "/opentelemetry.proto.collector.metrics.v1.MetricsService/Export",
            Self::Logs => "/opentelemetry.proto.collector.logs.v1.LogsService/Export",
        }
    }

    pub(crate) fn grpc_path_and_query(&self) -> PathAndQuery {
        PathAndQuery::from_static(self.grpc_path())
    }

    /// Returns the OTLP/HTTP path for this signal.
    pub const fn http_path(&self) -> &'static str {
        match self {
            Self::Traces => "/v1/traces",
            Self::Metrics => "/v1/metrics",
            Self::Logs => "/v1/logs",
        }
    }

    /// Returns the item type used in the `type` label of legacy exporter metrics.
    pub const fn legacy_item_type(&self) -> &'static str {
        match self {
            Self::Traces => "span",
            Self::Metrics => "metric",
            Self::Logs => "log",
        }
    }

    pub(crate) const fn inflight_metric_name(&self) -> &'static str {
        match self {
            Self::Traces => "otel.sdk.exporter.span.inflight",
            Self::Metrics => "otel.sdk.exporter.metric_data_point.inflight",
            Self::Logs => "otel.sdk.exporter.log.inflight",
        }
    }

    pub(crate) const fn exported_metric_name(&self) -> &'static str {
        match self {
            Self::Traces => "otel.sdk.exporter.span.exported",
            Self::Metrics => "otel.sdk.exporter.metric_data_point.exported",
            Self::Logs => "otel.sdk.exporter.log.exported",
        }
    }

    pub(crate) const fn grpc_component_type(&self) -> &'static str {
        match self {
            Self::Traces => "otlp_grpc_span_exporter",
            Self::Metrics => "otlp_grpc_metric_exporter",
            Self::Logs => "otlp_grpc_log_exporter",
        }
    }

    pub(crate) const fn http_component_type(&self) -> &'static str {
        match self {
            Self::Traces => "otlp_http_span_exporter",
            Self::Metrics => "otlp_http_metric_exporter",
            Self::Logs => "otlp_http_log_exporter",
        }
    }

    pub(crate) const fn http_json_component_type(&self) -> &'static str {
        match self {
            Self::Traces => "otlp_http_json_span_exporter",
            Self::Metrics => "otlp_http_json_metric_exporter",
            Self::Logs => "otlp_http_json_log_exporter",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Traces => f.write_str("traces"),
            Self::Metrics => f.write_str("metrics"),
            Self::Logs => f.write_str("logs"),
        }
    }
}
