//! Telemetry about the exporter itself.
//!
//! Two naming schemes are supported: the legacy `otlp.exporter.*` counters, and the OpenTelemetry semantic conventions
//! for SDK exporters. Which one is used is decided once, by the [`MetricsSchema`] handed to the exporter builder.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering::Acquire, Ordering::Release},
        Arc, Mutex, PoisonError,
    },
};

use arc_swap::ArcSwapOption;
use conduit_metrics::{MeterProvider, MetricsBuilder};
use serde::Deserialize;
use tracing::warn;

use crate::Signal;

mod legacy;
use self::legacy::{LegacyExporterMetrics, LegacyRecording};

mod semconv;
use self::semconv::{SemConvExporterMetrics, SemConvRecording};

/// Which set of exporter metrics to emit.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSchema {
    /// No exporter metrics.
    Disabled,

    /// `otlp.exporter.seen` and `otlp.exporter.exported`.
    #[default]
    Legacy,

    /// The semantic conventions for SDK exporters: in-flight items, exported items, and operation duration.
    SemConv,
}

/// The wire protocol an exporter speaks.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
pub enum ExporterProtocol {
    /// OTLP over gRPC.
    #[default]
    #[serde(rename = "grpc")]
    Grpc,

    /// OTLP over HTTP, with protobuf bodies.
    #[serde(rename = "http/protobuf")]
    HttpProtobuf,

    /// OTLP over HTTP, with JSON bodies.
    #[serde(rename = "http/json")]
    HttpJson,
}

impl ExporterProtocol {
    fn component_type(&self, signal: Signal) -> &'static str {
        match self {
            Self::Grpc => signal.grpc_component_type(),
            Self::HttpProtobuf => signal.http_component_type(),
            Self::HttpJson => signal.http_json_component_type(),
        }
    }
}

/// Identity of the exporter being instrumented.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    signal: Signal,
    protocol: ExporterProtocol,
    component_type: &'static str,
    component_name: String,
    server_address: Option<String>,
    server_port: Option<u16>,
}

impl ComponentInfo {
    /// Creates the identity of a new exporter component.
    ///
    /// Every call allocates a new component name of the form `<component type>/<n>`, where `n` counts up from zero per
    /// component type for the lifetime of the process.
    pub fn new(signal: Signal, protocol: ExporterProtocol) -> Self {
        let component_type = protocol.component_type(signal);
        let component_name = format!("{}/{}", component_type, next_component_id(component_type));
        Self {
            signal,
            protocol,
            component_type,
            component_name,
            server_address: None,
            server_port: None,
        }
    }

    /// Sets the address and port of the collector being exported to.
    pub fn with_server(mut self, address: impl Into<String>, port: u16) -> Self {
        self.server_address = Some(address.into());
        self.server_port = Some(port);
        self
    }

    /// Returns the component name.
    pub fn component_name(&self) -> &str {
        &self.component_name
    }

    fn metrics_builder(&self, provider: &MeterProvider) -> MetricsBuilder {
        let mut builder = provider
            .metrics_builder()
            .add_default_tag(("otel.component.type", self.component_type))
            .add_default_tag(("otel.component.name", self.component_name.clone()));
        if let Some(address) = &self.server_address {
            builder = builder.add_default_tag(("server.address", address.clone()));
        }
        if let Some(port) = self.server_port {
            builder = builder.add_default_tag(("server.port", port.to_string()));
        }
        builder
    }
}

static COMPONENT_IDS: Mutex<BTreeMap<&'static str, u64>> = Mutex::new(BTreeMap::new());

fn next_component_id(component_type: &'static str) -> u64 {
    let mut ids = COMPONENT_IDS.lock().unwrap_or_else(PoisonError::into_inner);
    let next = ids.entry(component_type).or_insert(0);
    let id = *next;
    *next += 1;
    id
}

/// Instruments that are registered on first use, and registered again if telemetry was not yet enabled back then.
///
/// Registering against a provider with no recorder yields no-op instruments. Holding on to those forever would lose
/// every measurement taken after the recorder is installed, so they are only kept once the provider is enabled.
struct LazyInstruments<T> {
    slot: ArcSwapOption<T>,
    bound: AtomicBool,
}

impl<T> LazyInstruments<T> {
    fn new() -> Self {
        Self {
            slot: ArcSwapOption::empty(),
            bound: AtomicBool::new(false),
        }
    }

    fn get_or_register<F>(&self, provider: &MeterProvider, register: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let enabled = provider.is_enabled();
        if let Some(instruments) = self.slot.load_full() {
            if self.bound.load(Acquire) || !enabled {
                return instruments;
            }
        }

        let instruments = Arc::new(register());
        self.slot.store(Some(Arc::clone(&instruments)));
        self.bound.store(enabled, Release);
        instruments
    }
}

/// Exporter metrics.
///
/// Every export is measured through a [`Recording`], obtained from [`start_recording_export`][Self::start_recording_export]
/// before the export is sent.
pub enum ExporterMetrics {
    /// Records nothing.
    Noop,

    /// Legacy `otlp.exporter.*` counters.
    Legacy(LegacyExporterMetrics),

    /// Semantic-convention SDK exporter metrics.
    SemConv(SemConvExporterMetrics),
}

impl ExporterMetrics {
    /// Creates the exporter metrics for the given schema.
    pub fn new(schema: MetricsSchema, provider: MeterProvider, component: ComponentInfo) -> Self {
        match schema {
            MetricsSchema::Disabled => Self::Noop,
            MetricsSchema::Legacy => Self::Legacy(LegacyExporterMetrics::new(provider, component)),
            MetricsSchema::SemConv => Self::SemConv(SemConvExporterMetrics::new(provider, component)),
        }
    }

    /// Starts measuring an export of `item_count` items.
    pub fn start_recording_export(&self, item_count: u64) -> Recording {
        let inner = match self {
            Self::Noop => RecordingInner::Noop,
            Self::Legacy(metrics) => RecordingInner::Legacy(metrics.start(item_count)),
            Self::SemConv(metrics) => RecordingInner::SemConv(metrics.start(item_count)),
        };
        Recording { inner: Some(inner) }
    }
}

enum RecordingInner {
    Noop,
    Legacy(LegacyRecording),
    SemConv(SemConvRecording),
}

/// An export being measured.
///
/// Exactly one of [`finish_success`][Self::finish_success] or [`finish_failed`][Self::finish_failed] must be called. Both
/// consume the recording. A recording dropped without either is counted as failed, with an `error.type` of `dropped`.
#[must_use = "recordings must be finished with `finish_success` or `finish_failed`"]
pub struct Recording {
    inner: Option<RecordingInner>,
}

impl Recording {
    /// Finishes the recording as a successful export of every item.
    pub fn finish_success(mut self) {
        match self.inner.take() {
            Some(RecordingInner::Legacy(recording)) => recording.finish(true),
            Some(RecordingInner::SemConv(recording)) => recording.finish_success(),
            Some(RecordingInner::Noop) | None => {}
        }
    }

    /// Finishes the recording as a failed export of every item.
    ///
    /// `error_type` is a low-cardinality description of the failure. `attributes` are added to the failure measurements,
    /// and are typically the status code the collector answered with.
    pub fn finish_failed(mut self, error_type: &str, attributes: &[(&'static str, String)]) {
        match self.inner.take() {
            Some(RecordingInner::Legacy(recording)) => recording.finish(false),
            Some(RecordingInner::SemConv(recording)) => recording.finish_failed(error_type, attributes),
            Some(RecordingInner::Noop) | None => {}
        }
    }
}

impl Drop for Recording {
    fn drop(&mut self) {
        let Some(inner) = self.inner.take() else {
            return;
        };

        warn!("Export recording dropped without being finished. Counting the export as failed.");
        match inner {
            RecordingInner::Legacy(recording) => recording.finish(false),
            RecordingInner::SemConv(recording) => recording.finish_failed("dropped", &[]),
            RecordingInner::Noop => {}
        }
    }
}
