//! Testing-related helpers.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering::SeqCst},
        Arc, Mutex,
    },
};

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};

struct CounterStorage {
    total: AtomicU64,
}

impl CounterFn for CounterStorage {
    fn increment(&self, value: u64) {
        self.total.fetch_add(value, SeqCst);
    }

    fn absolute(&self, value: u64) {
        self.total.store(value, SeqCst);
    }
}

struct GaugeStorage {
    current: AtomicU64,
}

impl GaugeStorage {
    fn update(&self, f: impl Fn(f64) -> f64) {
        let mut current = self.current.load(SeqCst);
        loop {
            let new = f(f64::from_bits(current)).to_bits();
            match self.current.compare_exchange(current, new, SeqCst, SeqCst) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }
}

impl GaugeFn for GaugeStorage {
    fn increment(&self, value: f64) {
        self.update(|v| v + value);
    }

    fn decrement(&self, value: f64) {
        self.update(|v| v - value);
    }

    fn set(&self, value: f64) {
        self.current.store(value.to_bits(), SeqCst);
    }
}

struct HistogramStorage {
    samples: Mutex<Vec<f64>>,
}

impl HistogramFn for HistogramStorage {
    fn record(&self, value: f64) {
        self.samples.lock().unwrap().push(value);
    }
}

#[derive(Default)]
struct RecorderState {
    counters: HashMap<Key, Arc<CounterStorage>>,
    gauges: HashMap<Key, Arc<GaugeStorage>>,
    histograms: HashMap<Key, Arc<HistogramStorage>>,
}

/// An in-memory recorder for asserting on instrument values in tests.
///
/// Clones share the same storage, so one clone can be installed into a [`MeterProvider`][crate::MeterProvider] while
/// another is kept around for assertions.
#[derive(Clone, Default)]
pub struct TestRecorder {
    state: Arc<Mutex<RecorderState>>,
}

fn matches(key: &Key, name: &str, labels: &[(&str, &str)]) -> bool {
    key.name() == name
        && key.labels().count() == labels.len()
        && labels
            .iter()
            .all(|(k, v)| key.labels().any(|label| label.key() == *k && label.value() == *v))
}

impl TestRecorder {
    /// Returns the current value of the counter with the given key, or `None` if no such counter exists.
    pub fn counter<K>(&self, key: K) -> Option<u64>
    where
        K: Into<Key>,
    {
        let state = self.state.lock().unwrap();
        state.counters.get(&key.into()).map(|c| c.total.load(SeqCst))
    }

    /// Returns the value of the counter with the given name and exactly the given labels, in any order.
    pub fn counter_with_labels(&self, name: &str, labels: &[(&str, &str)]) -> Option<u64> {
        let state = self.state.lock().unwrap();
        state
            .counters
            .iter()
            .find(|(key, _)| matches(key, name, labels))
            .map(|(_, c)| c.total.load(SeqCst))
    }

    /// Returns the sum of all counters with the given name, regardless of labels.
    pub fn counter_total(&self, name: &str) -> u64 {
        let state = self.state.lock().unwrap();
        state
            .counters
            .iter()
            .filter(|(key, _)| key.name() == name)
            .map(|(_, c)| c.total.load(SeqCst))
            .sum()
    }

    /// Returns the value of the gauge with the given name and exactly the given labels, in any order.
    pub fn gauge_with_labels(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let state = self.state.lock().unwrap();
        state
            .gauges
            .iter()
            .find(|(key, _)| matches(key, name, labels))
            .map(|(_, g)| f64::from_bits(g.current.load(SeqCst)))
    }

    /// Returns the samples of every histogram with the given name, regardless of labels.
    pub fn histogram_samples(&self, name: &str) -> Vec<f64> {
        let state = self.state.lock().unwrap();
        state
            .histograms
            .iter()
            .filter(|(key, _)| key.name() == name)
            .flat_map(|(_, h)| h.samples.lock().unwrap().clone())
            .collect()
    }

    /// Returns the labels of every registered counter with the given name.
    pub fn counter_labels(&self, name: &str) -> Vec<Vec<(String, String)>> {
        let state = self.state.lock().unwrap();
        state
            .counters
            .keys()
            .filter(|key| key.name() == name)
            .map(|key| {
                key.labels()
                    .map(|l| (l.key().to_string(), l.value().to_string()))
                    .collect()
            })
            .collect()
    }
}

impl Recorder for TestRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let mut state = self.state.lock().unwrap();
        let counter = state.counters.entry(key.clone()).or_insert_with(|| {
            Arc::new(CounterStorage {
                total: AtomicU64::new(0),
            })
        });

        Counter::from_arc(Arc::clone(counter))
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        let mut state = self.state.lock().unwrap();
        let gauge = state.gauges.entry(key.clone()).or_insert_with(|| {
            Arc::new(GaugeStorage {
                current: AtomicU64::new(0.0f64.to_bits()),
            })
        });

        Gauge::from_arc(Arc::clone(gauge))
    }

    fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
        let mut state = self.state.lock().unwrap();
        let histogram = state.histograms.entry(key.clone()).or_insert_with(|| {
            Arc::new(HistogramStorage {
                samples: Mutex::new(Vec::new()),
            })
        });

        Histogram::from_arc(Arc::clone(histogram))
    }
}
