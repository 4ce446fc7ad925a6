use std::sync::Arc;

use conduit_metrics::MeterProvider;
use metrics::Counter;

use super::{ComponentInfo, LazyInstruments};

struct LegacyInstruments {
    seen: Counter,
    exported_success: Counter,
    exported_failed: Counter,
}

/// Legacy exporter metrics.
///
/// - `otlp.exporter.seen`: items handed to the exporter, labeled with the item `type`.
/// - `otlp.exporter.exported`: items whose export finished, labeled with the item `type` and `success`.
pub struct LegacyExporterMetrics {
    provider: MeterProvider,
    item_type: &'static str,
    instruments: LazyInstruments<LegacyInstruments>,
}

impl LegacyExporterMetrics {
    pub(super) fn new(provider: MeterProvider, component: ComponentInfo) -> Self {
        Self {
            provider,
            item_type: component.signal.legacy_item_type(),
            instruments: LazyInstruments::new(),
        }
    }

    pub(super) fn start(&self, item_count: u64) -> LegacyRecording {
        let instruments = self.instruments.get_or_register(&self.provider, || {
            let builder = self.provider.metrics_builder().add_default_tag(("type", self.item_type));
            LegacyInstruments {
                seen: builder.register_counter("otlp.exporter.seen"),
                exported_success: builder.register_counter_with_tags("otlp.exporter.exported", ["success:true"]),
                exported_failed: builder.register_counter_with_tags("otlp.exporter.exported", ["success:false"]),
            }
        });

        instruments.seen.increment(item_count);
        LegacyRecording {
            instruments,
            item_count,
        }
    }
}

pub(super) struct LegacyRecording {
    instruments: Arc<LegacyInstruments>,
    item_count: u64,
}

impl LegacyRecording {
    pub(super) fn finish(self, success: bool) {
        if success {
            self.instruments.exported_success.increment(self.item_count);
        } else {
            self.instruments.exported_failed.increment(self.item_count);
        }
    }
}

#[cfg(test)]
mod tests {
    use conduit_metrics::test::TestRecorder;

    use crate::{
        metrics::{ComponentInfo, ExporterMetrics, ExporterProtocol, MetricsSchema},
        Signal,
    };

    #[test]
    fn seen_and_exported_add_up() {
        let recorder = TestRecorder::default();
        let metrics = ExporterMetrics::new(
            MetricsSchema::Legacy,
            conduit_metrics::MeterProvider::from_recorder(recorder.clone()),
            ComponentInfo::new(Signal::Traces, ExporterProtocol::Grpc),
        );

        metrics.start_recording_export(7).finish_success();
        metrics
            .start_recording_export(3)
            .finish_failed("UNAVAILABLE", &[("rpc.grpc.status_code", "14".to_string())]);

        assert_eq!(recorder.counter_with_labels("otlp.exporter.seen", &[("type", "span")]), Some(10));
        assert_eq!(
            recorder.counter_with_labels("otlp.exporter.exported", &[("type", "span"), ("success", "true")]),
            Some(7)
        );
        assert_eq!(
            recorder.counter_with_labels("otlp.exporter.exported", &[("type", "span"), ("success", "false")]),
            Some(3)
        );
    }
}
