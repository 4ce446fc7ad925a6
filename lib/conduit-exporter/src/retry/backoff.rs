use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use rand::{Rng as _, RngCore};

#[derive(Clone)]
pub enum BackoffRng {
    /// A lazily-initialized, thread-local CSPRNG seeded by the operating system.
    ///
    /// Provided by [`rand::rngs::ThreadRng`][rand_threadrng].
    ///
    /// [rand_threadrng]: https://docs.rs/rand/latest/rand/rngs/struct.ThreadRng.html
    SecureDefault,

    /// A shared random number generator.
    Shared(Arc<Mutex<Box<dyn RngCore + Send + Sync>>>),
}

impl fmt::Debug for BackoffRng {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffRng::SecureDefault => f.debug_tuple("SecureDefault").finish(),
            BackoffRng::Shared(_) => f.debug_tuple("Shared").finish(),
        }
    }
}

impl RngCore for BackoffRng {
    fn next_u32(&mut self) -> u32 {
        match self {
            BackoffRng::SecureDefault => rand::rng().next_u32(),
            BackoffRng::Shared(rng) => rng.lock().unwrap_or_else(PoisonError::into_inner).next_u32(),
        }
    }

    fn next_u64(&mut self) -> u64 {
        match self {
            BackoffRng::SecureDefault => rand::rng().next_u64(),
            BackoffRng::Shared(rng) => rng.lock().unwrap_or_else(PoisonError::into_inner).next_u64(),
        }
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            BackoffRng::SecureDefault => rand::rng().fill_bytes(dest),
            BackoffRng::Shared(rng) => rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(dest),
        }
    }
}

/// An exponential backoff strategy with symmetric jitter.
///
/// The backoff before retry `n` (starting at one) is `min(initial * multiplier^(n-1), max)`, scaled by a random factor
/// drawn uniformly from `[1 - jitter, 1 + jitter]`. Jittering spreads out callers that started failing at the same
/// time, so that they don't all retry in lockstep.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
    jitter: f64,
    rng: BackoffRng,
}

impl ExponentialBackoff {
    /// Creates a new `ExponentialBackoff` without jitter.
    pub fn new(initial_backoff: Duration, max_backoff: Duration, multiplier: f64) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            multiplier,
            jitter: 0.0,
            rng: BackoffRng::SecureDefault,
        }
    }

    /// Sets the jitter fraction, clamped to `[0, 1]`.
    ///
    /// A jitter of zero disables jitter entirely.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Sets the random number generator to use for calculating jittered backoff durations.
    ///
    /// Useful for testing purposes, where the RNG must be overridden to add determinism. The RNG is shared atomically
    /// behind a mutex, allowing it to be cloned, so care should be taken to never use this outside of tests.
    ///
    /// Defaults to a lazily-initialized, thread-local CSPRNG seeded by the operating system.
    pub fn with_rng<R>(self, rng: R) -> Self
    where
        R: RngCore + Send + Sync + 'static,
    {
        ExponentialBackoff {
            rng: BackoffRng::Shared(Arc::new(Mutex::new(Box::new(rng)))),
            ..self
        }
    }

    /// Returns the backoff duration before jitter is applied for the given retry number.
    pub fn base_backoff_duration(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    /// Calculates the backoff duration for the given retry number.
    ///
    /// Retry numbers start at one: the first retry after the initial attempt failed.
    pub fn get_backoff_duration(&mut self, retry: u32) -> Duration {
        let backoff = self.base_backoff_duration(retry);
        if self.jitter == 0.0 {
            return backoff;
        }

        let factor = self.rng.random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        backoff.mul_f64(factor)
    }
}
