//! Retrying of failed export attempts.

use std::time::Duration;

use serde::Deserialize;

use crate::error::BuildError;

mod backoff;
pub use self::backoff::ExponentialBackoff;

mod classifier;
pub use self::classifier::{ExportRetryClassifier, RetryClassifier};

mod interceptor;
pub use self::interceptor::RetryInterceptor;

mod lifecycle;
pub use self::lifecycle::{ExportRetryLifecycle, RetryLifecycle};

const fn default_max_attempts() -> u32 {
    5
}

const fn default_initial_backoff() -> Duration {
    Duration::from_secs(1)
}

const fn default_max_backoff() -> Duration {
    Duration::from_secs(5)
}

const fn default_backoff_multiplier() -> f64 {
    1.5
}

const fn default_jitter() -> f64 {
    0.2
}

/// Retry policy for export attempts.
///
/// `max_attempts` counts the initial attempt, so a policy with `max_attempts` of one never retries.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the initial one.
    ///
    /// Must be at least one. Defaults to 5.
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,

    /// Backoff before the first retry.
    ///
    /// Must be greater than zero. Defaults to one second.
    #[serde(default = "default_initial_backoff", with = "millis")]
    initial_backoff: Duration,

    /// Upper bound on the backoff between attempts, before jitter.
    ///
    /// Must be greater than zero. Defaults to five seconds.
    #[serde(default = "default_max_backoff", with = "millis")]
    max_backoff: Duration,

    /// Factor applied to the backoff after each retry.
    ///
    /// Must be greater than one. Defaults to 1.5.
    #[serde(default = "default_backoff_multiplier")]
    backoff_multiplier: f64,

    /// Fraction of the backoff by which it is randomly scaled up or down.
    ///
    /// Must be between zero and one, inclusive. Defaults to 0.2.
    #[serde(default = "default_jitter")]
    jitter: f64,
}

impl RetryPolicy {
    /// Returns a builder seeded with the default policy.
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder { policy: Self::default() }
    }

    /// Returns the maximum number of attempts, including the initial one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff before the first retry.
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Returns the upper bound on the backoff between attempts.
    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    /// Returns the backoff multiplier.
    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    /// Returns the jitter fraction.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Checks that the policy is usable.
    ///
    /// ## Errors
    ///
    /// If any setting is out of range, an error will be returned describing which.
    pub fn validate(&self) -> Result<(), BuildError> {
        let reason = if self.max_attempts < 1 {
            format!("max_attempts must be at least 1, got {}", self.max_attempts)
        } else if self.initial_backoff.is_zero() {
            "initial_backoff must be greater than zero".to_string()
        } else if self.max_backoff.is_zero() {
            "max_backoff must be greater than zero".to_string()
        } else if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier > 1.0) {
            format!("backoff_multiplier must be greater than 1.0, got {}", self.backoff_multiplier)
        } else if !(0.0..=1.0).contains(&self.jitter) {
            format!("jitter must be between 0.0 and 1.0, got {}", self.jitter)
        } else {
            return Ok(());
        };

        Err(BuildError::InvalidRetryPolicy { reason })
    }

    /// Creates the backoff strategy described by this policy.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.initial_backoff, self.max_backoff, self.backoff_multiplier)
            .with_jitter(self.jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

/// Builder for [`RetryPolicy`].
///
/// Policies obtained through deserialization skip this builder, so exporter builders check the policy again in their own
/// `build()`.
#[derive(Clone, Debug)]
pub struct RetryPolicyBuilder {
    policy: RetryPolicy,
}

impl RetryPolicyBuilder {
    /// Sets the maximum number of attempts, including the initial one.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff before the first retry.
    pub fn initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.policy.initial_backoff = initial_backoff;
        self
    }

    /// Sets the upper bound on the backoff between attempts.
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.policy.max_backoff = max_backoff;
        self
    }

    /// Sets the backoff multiplier.
    pub fn backoff_multiplier(mut self, backoff_multiplier: f64) -> Self {
        self.policy.backoff_multiplier = backoff_multiplier;
        self
    }

    /// Sets the jitter fraction.
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.policy.jitter = jitter;
        self
    }

    /// Builds the policy.
    ///
    /// ## Errors
    ///
    /// If any setting is out of range, an error will be returned describing which.
    pub fn build(self) -> Result<RetryPolicy, BuildError> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize as _, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
