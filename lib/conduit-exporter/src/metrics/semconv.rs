use std::{sync::Arc, time::Instant};

use conduit_metrics::{MeterProvider, MetricsBuilder};
use metrics::{Counter, Gauge, Histogram};

use super::{ComponentInfo, ExporterProtocol, LazyInstruments};

const OPERATION_DURATION: &str = "otel.sdk.exporter.operation.duration";

struct SemConvInstruments {
    inflight: Gauge,
    exported_success: Counter,
    duration_success: Histogram,
}

/// Exporter metrics following the semantic conventions for SDK exporters.
///
/// - `otel.sdk.exporter.<item>.inflight`: items currently being exported.
/// - `otel.sdk.exporter.<item>.exported`: items whose export finished, with `error.type` set on failure.
/// - `otel.sdk.exporter.operation.duration`: duration of each export, in seconds.
///
/// All of them carry `otel.component.type` and `otel.component.name`, and `server.address` and `server.port` when the
/// collector endpoint is known.
pub struct SemConvExporterMetrics {
    shared: Arc<Shared>,
}

struct Shared {
    provider: MeterProvider,
    component: ComponentInfo,
    instruments: LazyInstruments<SemConvInstruments>,
}

impl Shared {
    fn builder(&self) -> MetricsBuilder {
        self.component.metrics_builder(&self.provider)
    }

    fn success_status(&self) -> (&'static str, String) {
        match self.component.protocol {
            ExporterProtocol::Grpc => ("rpc.grpc.status_code", "0".to_string()),
            ExporterProtocol::HttpProtobuf | ExporterProtocol::HttpJson => {
                ("http.response.status_code", "200".to_string())
            }
        }
    }
}

impl SemConvExporterMetrics {
    pub(super) fn new(provider: MeterProvider, component: ComponentInfo) -> Self {
        Self {
            shared: Arc::new(Shared {
                provider,
                component,
                instruments: LazyInstruments::new(),
            }),
        }
    }

    pub(super) fn start(&self, item_count: u64) -> SemConvRecording {
        let shared = &self.shared;
        let instruments = shared.instruments.get_or_register(&shared.provider, || {
            let builder = shared.builder();
            let signal = shared.component.signal;
            SemConvInstruments {
                inflight: builder.register_gauge(signal.inflight_metric_name()),
                exported_success: builder.register_counter(signal.exported_metric_name()),
                duration_success: builder.register_histogram_with_tags(OPERATION_DURATION, [shared.success_status()]),
            }
        });

        instruments.inflight.increment(item_count as f64);
        SemConvRecording {
            shared: Arc::clone(&self.shared),
            instruments,
            item_count,
            start: Instant::now(),
        }
    }
}

pub(super) struct SemConvRecording {
    shared: Arc<Shared>,
    instruments: Arc<SemConvInstruments>,
    item_count: u64,
    start: Instant,
}

impl SemConvRecording {
    pub(super) fn finish_success(self) {
        self.instruments.inflight.decrement(self.item_count as f64);
        self.instruments.exported_success.increment(self.item_count);
        self.instruments
            .duration_success
            .record(self.start.elapsed().as_secs_f64());
    }

    pub(super) fn finish_failed(self, error_type: &str, attributes: &[(&'static str, String)]) {
        self.instruments.inflight.decrement(self.item_count as f64);

        // `error.type` is only known now, so failure instruments are registered on demand.
        let builder = self.shared.builder();
        let signal = self.shared.component.signal;

        builder
            .register_counter_with_tags(signal.exported_metric_name(), [("error.type", error_type.to_string())])
            .increment(self.item_count);

        let mut tags = Vec::with_capacity(attributes.len() + 1);
        tags.push(("error.type", error_type.to_string()));
        tags.extend(attributes.iter().cloned());
        builder
            .register_histogram_with_tags(OPERATION_DURATION, tags)
            .record(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use conduit_metrics::test::TestRecorder;

    use crate::{
        metrics::{ComponentInfo, ExporterMetrics, ExporterProtocol, MetricsSchema},
        Signal,
    };

    fn semconv_metrics(recorder: &TestRecorder) -> (ExporterMetrics, String) {
        let component = ComponentInfo::new(Signal::Traces, ExporterProtocol::Grpc).with_server("collector", 4317);
        let name = component.component_name().to_string();
        let metrics = ExporterMetrics::new(
            MetricsSchema::SemConv,
            conduit_metrics::MeterProvider::from_recorder(recorder.clone()),
            component,
        );
        (metrics, name)
    }

    #[test]
    fn success_and_failure_are_attributed() {
        let recorder = TestRecorder::default();
        let (metrics, name) = semconv_metrics(&recorder);
        let base = [
            ("otel.component.type", "otlp_grpc_span_exporter"),
            ("otel.component.name", name.as_str()),
            ("server.address", "collector"),
            ("server.port", "4317"),
        ];

        metrics.start_recording_export(6).finish_success();
        metrics
            .start_recording_export(4)
            .finish_failed("UNAVAILABLE", &[("rpc.grpc.status_code", "14".to_string())]);

        assert_eq!(recorder.counter_with_labels("otel.sdk.exporter.span.exported", &base), Some(6));

        let mut failed = base.to_vec();
        failed.push(("error.type", "UNAVAILABLE"));
        assert_eq!(recorder.counter_with_labels("otel.sdk.exporter.span.exported", &failed), Some(4));

        assert_eq!(recorder.counter_total("otel.sdk.exporter.span.exported"), 10);
        assert_eq!(recorder.histogram_samples("otel.sdk.exporter.operation.duration").len(), 2);
    }

    #[test]
    fn inflight_returns_to_its_previous_value() {
        let recorder = TestRecorder::default();
        let (metrics, name) = semconv_metrics(&recorder);
        let labels = [
            ("otel.component.type", "otlp_grpc_span_exporter"),
            ("otel.component.name", name.as_str()),
            ("server.address", "collector"),
            ("server.port", "4317"),
        ];

        let first = metrics.start_recording_export(5);
        let second = metrics.start_recording_export(2);
        assert_eq!(recorder.gauge_with_labels("otel.sdk.exporter.span.inflight", &labels), Some(7.0));

        first.finish_failed("DEADLINE_EXCEEDED", &[]);
        assert_eq!(recorder.gauge_with_labels("otel.sdk.exporter.span.inflight", &labels), Some(2.0));

        second.finish_success();
        assert_eq!(recorder.gauge_with_labels("otel.sdk.exporter.span.inflight", &labels), Some(0.0));
    }
}
