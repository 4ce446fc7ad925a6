use std::{sync::Arc, time::Duration};

use tracing::debug;

use crate::{error::ExportError, Signal};

pub trait RetryLifecycle<Req, Res, Error> {
    fn before_retry(&self, req: &Req, res: &Result<Res, Error>, retry_backoff: Duration, attempt: u32);
    fn after_success(&self, req: &Req, res: &Result<Res, Error>, attempt: u32);
}

/// Retry lifecycle that logs each retry of an export at debug level.
///
/// Retries are expected while a collector restarts, so they are not surfaced above debug. The final outcome of the
/// export is logged by the exporter itself, once.
#[derive(Clone, Debug)]
pub struct ExportRetryLifecycle {
    signal: Signal,
    endpoint: Arc<str>,
}

impl ExportRetryLifecycle {
    /// Creates a new `ExportRetryLifecycle` for exports of `signal` to `endpoint`.
    pub fn new(signal: Signal, endpoint: impl Into<Arc<str>>) -> Self {
        Self {
            signal,
            endpoint: endpoint.into(),
        }
    }
}

impl<Req, Res> RetryLifecycle<Req, Res, ExportError> for ExportRetryLifecycle {
    fn before_retry(&self, _: &Req, res: &Result<Res, ExportError>, retry_backoff: Duration, attempt: u32) {
        if let Err(e) = res {
            debug!(
                signal = %self.signal,
                endpoint = %self.endpoint,
                attempt,
                error = %e,
                "Export attempt failed. Retrying after {:?}.",
                retry_backoff
            );
        }
    }

    fn after_success(&self, _: &Req, res: &Result<Res, ExportError>, attempt: u32) {
        if res.is_ok() && attempt > 1 {
            debug!(signal = %self.signal, endpoint = %self.endpoint, attempt, "Export succeeded after retrying.");
        }
    }
}
