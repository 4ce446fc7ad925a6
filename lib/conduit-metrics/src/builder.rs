use metrics::{Counter, Gauge, Histogram, Key, Label, Level, Metadata, SharedString};

use crate::MeterProvider;

mod private {
    use metrics::SharedString;

    pub trait Sealed {}

    impl Sealed for &'static str {}
    impl Sealed for String {}
    impl<T> Sealed for (&'static str, T) where T: Into<SharedString> {}
}

/// A metric tag.
///
/// Marker trait for types which can support being used as a metric tag, in order to optimize their internal
/// representation to avoid unnecessary allocations.
///
/// This trait is sealed and cannot be implemented outside of this crate.
pub trait MetricTag: private::Sealed {
    /// Consumes `self` and converts it to a tag.
    ///
    /// The [`metrics`][metrics] crate calls tags "labels", which is where the return type comes from.
    ///
    /// [metrics]: https://docs.rs/metrics
    fn into_label(self) -> Label;
}

impl MetricTag for &'static str {
    fn into_label(self) -> Label {
        match self.split_once(':') {
            Some((key, value)) => Label::from_static_parts(key, value),
            None => Label::from_static_parts(self, ""),
        }
    }
}

impl MetricTag for String {
    fn into_label(self) -> Label {
        match self.split_once(':') {
            Some((key, value)) => Label::new(key.to_string(), value.to_string()),
            None => Label::new(self, ""),
        }
    }
}

impl<T> MetricTag for (&'static str, T)
where
    T: Into<SharedString>,
{
    fn into_label(self) -> Label {
        Label::new(SharedString::const_str(self.0), self.1.into())
    }
}

/// Builder for constructing metrics.
///
/// Instruments are registered against the recorder installed in the builder's [`MeterProvider`] at the time of
/// registration. When none is installed, no-op instruments are returned.
#[derive(Clone, Default)]
pub struct MetricsBuilder {
    provider: MeterProvider,
    default_tags: Vec<Label>,
}

impl MetricsBuilder {
    pub(crate) fn from_provider(provider: MeterProvider) -> Self {
        Self {
            provider,
            default_tags: Vec::new(),
        }
    }

    /// Adds an additional default tag to use when constructing metrics.
    ///
    /// Tags can be provided in numerous forms:
    /// - individual tags (`"tag_name"` or `"tag_name:tag_value"`, either as `&'static str` or `String`)
    /// - key/value tuples (`("tag_name", "tag_value")`, with the name as `&'static str` and the value as anything
    ///   convertible to `SharedString`)
    pub fn add_default_tag<T>(mut self, tag: T) -> Self
    where
        T: MetricTag,
    {
        self.default_tags.push(tag.into_label());
        self
    }

    /// Returns `true` if instruments registered now would be backed by a real recorder.
    pub fn is_enabled(&self) -> bool {
        self.provider.is_enabled()
    }

    fn key_for<I, T>(&self, metric_name: &'static str, additional_tags: I) -> Key
    where
        I: IntoIterator<Item = T>,
        T: MetricTag,
    {
        let mut tags = self.default_tags.clone();
        tags.extend(additional_tags.into_iter().map(MetricTag::into_label));
        Key::from_parts(metric_name, tags)
    }

    /// Registers a counter.
    pub fn register_counter(&self, metric_name: &'static str) -> Counter {
        self.register_counter_with_tags(metric_name, None::<&'static str>)
    }

    /// Registers a counter with additional tags.
    ///
    /// See [`add_default_tag`](MetricsBuilder::add_default_tag) for information on the supported tag formats.
    pub fn register_counter_with_tags<I, T>(&self, metric_name: &'static str, additional_tags: I) -> Counter
    where
        I: IntoIterator<Item = T>,
        T: MetricTag,
    {
        match self.provider.recorder() {
            Some(recorder) => recorder.register_counter(&self.key_for(metric_name, additional_tags), &metadata()),
            None => Counter::noop(),
        }
    }

    /// Registers a gauge.
    pub fn register_gauge(&self, metric_name: &'static str) -> Gauge {
        match self.provider.recorder() {
            Some(recorder) => recorder.register_gauge(&self.key_for(metric_name, None::<&'static str>), &metadata()),
            None => Gauge::noop(),
        }
    }

    /// Registers a histogram.
    pub fn register_histogram(&self, metric_name: &'static str) -> Histogram {
        self.register_histogram_with_tags(metric_name, None::<&'static str>)
    }

    /// Registers a histogram with additional tags.
    pub fn register_histogram_with_tags<I, T>(&self, metric_name: &'static str, additional_tags: I) -> Histogram
    where
        I: IntoIterator<Item = T>,
        T: MetricTag,
    {
        match self.provider.recorder() {
            Some(recorder) => recorder.register_histogram(&self.key_for(metric_name, additional_tags), &metadata()),
            None => Histogram::noop(),
        }
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestRecorder;

    #[test]
    fn default_tags_are_applied() {
        let recorder = TestRecorder::default();
        let provider = MeterProvider::from_recorder(recorder.clone());

        let builder = provider
            .metrics_builder()
            .add_default_tag("component:exporter")
            .add_default_tag(("signal", "span"));
        builder
            .register_counter_with_tags("exports", ["outcome:success"])
            .increment(3);

        assert_eq!(
            recorder.counter_with_labels(
                "exports",
                &[("component", "exporter"), ("signal", "span"), ("outcome", "success")]
            ),
            Some(3)
        );
        assert_eq!(recorder.counter_with_labels("exports", &[("signal", "span")]), None);
    }

    #[test]
    fn registration_follows_late_install() {
        let provider = MeterProvider::new();
        let builder = provider.metrics_builder();
        builder.register_gauge("inflight").increment(1.0);

        let recorder = TestRecorder::default();
        provider.install(recorder.clone());
        assert!(builder.is_enabled());

        builder.register_gauge("inflight").increment(2.0);
        assert_eq!(recorder.gauge_with_labels("inflight", &[]), Some(2.0));
    }
}
