use std::{fmt, sync::Arc};

use arc_swap::ArcSwapOption;
use metrics::Recorder;

use crate::MetricsBuilder;

type SharedRecorder = Arc<dyn Recorder + Send + Sync>;

/// A handle to a metrics recorder that may be installed later.
///
/// Cloning is cheap and every clone observes the same recorder slot, so a provider can be handed out at startup and
/// have its recorder installed once the telemetry pipeline is ready.
#[derive(Clone)]
pub struct MeterProvider {
    slot: Arc<ArcSwapOption<SharedRecorder>>,
}

impl MeterProvider {
    /// Creates a provider with no recorder installed.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Creates a provider that never records anything.
    ///
    /// This is equivalent to [`MeterProvider::new`] where nothing is ever installed, and exists to make intent obvious
    /// at the call site.
    pub fn noop() -> Self {
        Self::new()
    }

    /// Creates a provider with the given recorder already installed.
    pub fn from_recorder<R>(recorder: R) -> Self
    where
        R: Recorder + Send + Sync + 'static,
    {
        let provider = Self::new();
        provider.install(recorder);
        provider
    }

    /// Installs the given recorder, replacing any previously installed recorder.
    ///
    /// Instruments already registered through this provider are not migrated.
    pub fn install<R>(&self, recorder: R)
    where
        R: Recorder + Send + Sync + 'static,
    {
        let recorder: SharedRecorder = Arc::new(recorder);
        self.slot.store(Some(Arc::new(recorder)));
    }

    /// Returns `true` if a recorder is installed.
    pub fn is_enabled(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Returns the currently installed recorder, if any.
    pub fn recorder(&self) -> Option<Arc<dyn Recorder + Send + Sync>> {
        self.slot.load_full().map(|recorder| Arc::clone(&*recorder))
    }

    /// Creates a metrics builder that registers instruments against this provider.
    pub fn metrics_builder(&self) -> MetricsBuilder {
        MetricsBuilder::from_provider(self.clone())
    }
}

impl Default for MeterProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MeterProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeterProvider")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestRecorder;

    #[test]
    fn install_is_visible_to_clones() {
        let provider = MeterProvider::new();
        let clone = provider.clone();
        assert!(!clone.is_enabled());

        provider.install(TestRecorder::default());
        assert!(clone.is_enabled());
        assert!(clone.recorder().is_some());
    }

    #[test]
    fn noop_registers_noop_instruments() {
        let provider = MeterProvider::noop();
        let counter = provider.metrics_builder().register_counter("requests");
        counter.increment(1);
        assert!(!provider.is_enabled());
    }
}
