//! Metrics registration against an explicitly passed, late-bindable recorder.
//!
//! Instruments are built with the [`metrics`][metrics] crate, but never through its global recorder: a
//! [`MeterProvider`] is handed to whatever needs telemetry, and a recorder can be installed into it at any point.
//! Instruments registered before that remain no-ops, so callers that care check [`MeterProvider::is_enabled`] and
//! re-register once it flips.
//!
//! [metrics]: https://docs.rs/metrics

mod builder;
pub use self::builder::{MetricTag, MetricsBuilder};

mod provider;
pub use self::provider::MeterProvider;

#[cfg(any(test, feature = "test"))]
pub mod test;
