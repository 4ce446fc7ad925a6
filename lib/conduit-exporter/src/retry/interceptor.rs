use std::sync::{
    atomic::{AtomicBool, Ordering::Acquire},
    Arc,
};

use tokio::time::{sleep, Sleep};
use tower::retry::Policy;
use tracing::debug;

use super::{ExponentialBackoff, ExportRetryClassifier, RetryClassifier, RetryLifecycle, RetryPolicy};
use crate::error::ExportError;

/// A bounded exponential backoff retry policy for export attempts.
///
/// Failed attempts that the classifier deems transient are sent again, unchanged, after a jittered exponential backoff,
/// until the attempt limit of the [`RetryPolicy`] is reached. The error of the last attempt is what the caller sees once
/// attempts are exhausted.
///
/// Once the exporter has been shut down, no further retries are started, although an attempt that is already in flight
/// is allowed to finish.
///
/// `tower::retry::Retry` clones its policy for every request, so the attempt count kept here is per request.
#[derive(Clone, Debug)]
pub struct RetryInterceptor<L, C = ExportRetryClassifier> {
    classifier: C,
    retry_lifecycle: L,
    backoff: ExponentialBackoff,
    max_attempts: u32,
    attempt: u32,
    shutdown: Arc<AtomicBool>,
}

impl<L> RetryInterceptor<L> {
    /// Creates a new `RetryInterceptor` from the given policy.
    ///
    /// `shutdown` is checked before every retry, and no retry is started once it is set.
    pub fn new(policy: &RetryPolicy, retry_lifecycle: L, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            classifier: ExportRetryClassifier,
            retry_lifecycle,
            backoff: policy.backoff(),
            max_attempts: policy.max_attempts(),
            attempt: 0,
            shutdown,
        }
    }
}

impl<L, C> RetryInterceptor<L, C> {
    /// Sets the classifier used to decide which failures are retried.
    pub fn with_classifier<C2>(self, classifier: C2) -> RetryInterceptor<L, C2> {
        RetryInterceptor {
            classifier,
            retry_lifecycle: self.retry_lifecycle,
            backoff: self.backoff,
            max_attempts: self.max_attempts,
            attempt: self.attempt,
            shutdown: self.shutdown,
        }
    }

    /// Replaces the backoff strategy.
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl<L, C, Req, Res> Policy<Req, Res, ExportError> for RetryInterceptor<L, C>
where
    C: RetryClassifier<Res, ExportError>,
    L: RetryLifecycle<Req, Res, ExportError>,
    Req: Clone,
{
    type Future = Sleep;

    fn retry(&mut self, request: &mut Req, response: &mut Result<Res, ExportError>) -> Option<Self::Future> {
        self.attempt += 1;

        if !self.classifier.should_retry(response) {
            self.retry_lifecycle.after_success(request, response, self.attempt);
            return None;
        }

        if self.attempt >= self.max_attempts {
            debug!(attempts = self.attempt, "Retry attempts exhausted.");
            return None;
        }

        if self.shutdown.load(Acquire) {
            debug!(attempts = self.attempt, "Exporter shut down. Not retrying.");
            return None;
        }

        let backoff_dur = self.backoff.get_backoff_duration(self.attempt);
        self.retry_lifecycle
            .before_retry(request, response, backoff_dur, self.attempt);

        Some(sleep(backoff_dur))
    }

    fn clone_request(&mut self, req: &Req) -> Option<Req> {
        Some(req.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU32, Ordering::SeqCst},
        time::Duration,
    };

    use tokio::time::Instant;
    use tonic::{Code, Status};
    use tower::{retry::RetryLayer, service_fn, ServiceBuilder, ServiceExt as _};

    use super::*;
    use crate::{retry::ExportRetryLifecycle, Signal};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::builder()
            .max_attempts(max_attempts)
            .initial_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_secs(1))
            .backoff_multiplier(2.0)
            .jitter(0.0)
            .build()
            .unwrap()
    }

    fn interceptor(max_attempts: u32, shutdown: Arc<AtomicBool>) -> RetryInterceptor<ExportRetryLifecycle> {
        RetryInterceptor::new(
            &policy(max_attempts),
            ExportRetryLifecycle::new(Signal::Traces, "http://localhost:4317"),
            shutdown,
        )
    }

    /// Runs one request through a retrying service whose attempts fail with the given codes, in order, and succeed once
    /// the codes run out. Returns the result and the number of attempts made.
    async fn run(
        interceptor: RetryInterceptor<ExportRetryLifecycle>, failures: Vec<Code>,
    ) -> (Result<u32, ExportError>, u32) {
        let attempts = Arc::new(AtomicU32::new(0));
        let failures = Arc::new(failures);

        let service = {
            let attempts = Arc::clone(&attempts);
            service_fn(move |_: ()| {
                let attempt = attempts.fetch_add(1, SeqCst) + 1;
                let failure = failures.get(attempt as usize - 1).copied();
                async move {
                    match failure {
                        Some(code) => Err(ExportError::grpc(Status::new(code, "injected"))),
                        None => Ok(attempt),
                    }
                }
            })
        };

        let result = ServiceBuilder::new()
            .layer(RetryLayer::new(interceptor))
            .service(service)
            .oneshot(())
            .await;
        (result, attempts.load(SeqCst))
    }

    #[tokio::test(start_paused = true)]
    async fn always_transient_failure_makes_exactly_max_attempts() {
        for max_attempts in 1..=5 {
            let (result, attempts) = run(
                interceptor(max_attempts, Arc::new(AtomicBool::new(false))),
                vec![Code::Unavailable; 10],
            )
            .await;

            assert_eq!(attempts, max_attempts);
            assert_eq!(result.unwrap_err().grpc_code(), Some(Code::Unavailable));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_at_attempt_k_stops_retrying() {
        let (result, attempts) = run(
            interceptor(3, Arc::new(AtomicBool::new(false))),
            vec![Code::DeadlineExceeded, Code::DeadlineExceeded],
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn last_error_is_returned_on_exhaustion() {
        let (result, attempts) = run(
            interceptor(3, Arc::new(AtomicBool::new(false))),
            vec![Code::Unavailable, Code::ResourceExhausted, Code::DataLoss],
        )
        .await;

        assert_eq!(attempts, 3);
        assert_eq!(result.unwrap_err().grpc_code(), Some(Code::DataLoss));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_failure_is_not_retried() {
        let (result, attempts) = run(
            interceptor(5, Arc::new(AtomicBool::new(false))),
            vec![Code::PermissionDenied],
        )
        .await;

        assert_eq!(attempts, 1);
        assert_eq!(result.unwrap_err().grpc_code(), Some(Code::PermissionDenied));
    }

    #[tokio::test(start_paused = true)]
    async fn no_retry_after_shutdown() {
        let (result, attempts) = run(interceptor(5, Arc::new(AtomicBool::new(true))), vec![Code::Unavailable]).await;

        assert_eq!(attempts, 1);
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_between_attempts() {
        let start = Instant::now();
        let (result, attempts) = run(
            interceptor(4, Arc::new(AtomicBool::new(false))),
            vec![Code::Unavailable, Code::Unavailable, Code::Unavailable],
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(attempts, 4);
        // 100ms + 200ms + 400ms.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(700) && elapsed < Duration::from_millis(710));
    }
}
