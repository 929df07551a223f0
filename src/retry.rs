use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Custom delay source: `(attempt, base_delay_ms) -> delay_ms`.
pub type CustomBackoff = Arc<dyn Fn(u32, u64) -> u64 + Send + Sync>;

#[derive(Clone, Default)]
pub enum BackoffStrategy {
    Fixed,
    Linear,
    #[default]
    Exponential,
    Custom(CustomBackoff),
}

impl std::fmt::Debug for BackoffStrategy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Fixed => "Fixed",
            Self::Linear => "Linear",
            Self::Exponential => "Exponential",
            Self::Custom(_) => "Custom",
        };
        formatter.write_str(text)
    }
}

/// Conditions under which a failed attempt is eligible for another try.
///
/// `Network` matches failures with no HTTP status (transport errors and
/// deadline expiries), `ServerError` matches any status >= 500, `Status`
/// matches one exact code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RetryOn {
    Network,
    ServerError,
    Status(u16),
}

#[derive(Clone)]
pub struct RetryPolicy {
    enabled: bool,
    max_attempts: u32,
    strategy: BackoffStrategy,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
    retry_on: BTreeSet<RetryOn>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RetryPolicy")
            .field("enabled", &self.enabled)
            .field("max_attempts", &self.max_attempts)
            .field("strategy", &self.strategy)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("retry_on", &self.retry_on)
            .finish()
    }
}

impl RetryPolicy {
    pub fn standard() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            jitter: true,
            retry_on: default_retry_on(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_attempts: 1,
            strategy: BackoffStrategy::Fixed,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            jitter: false,
            retry_on: default_retry_on(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        if self.max_delay < self.base_delay {
            self.max_delay = self.base_delay;
        }
        self
    }

    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay.max(self.base_delay);
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn retry_on(mut self, rules: impl IntoIterator<Item = RetryOn>) -> Self {
        self.retry_on = rules.into_iter().collect();
        self
    }

    pub(crate) fn max_attempts_value(&self) -> u32 {
        self.max_attempts
    }

    /// True iff retries are enabled, another attempt remains, and at least one
    /// configured rule matches the observed outcome (`None` status means a
    /// transport-level failure).
    pub fn should_retry(&self, status: Option<u16>, attempt: u32) -> bool {
        if !self.enabled || attempt >= self.max_attempts {
            return false;
        }
        self.retry_on.iter().any(|rule| match (rule, status) {
            (RetryOn::Network, None) => true,
            (RetryOn::ServerError, Some(status)) => status >= 500,
            (RetryOn::Status(code), Some(status)) => *code == status,
            _ => false,
        })
    }

    /// Delay before the attempt following `attempt`, capped at the configured
    /// maximum; with jitter the capped delay is scaled by a uniform factor in
    /// [0.5, 1.0) and floored to whole milliseconds.
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis().min(u64::MAX as u128) as u64;
        let raw_ms = match &self.strategy {
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Linear => base_ms.saturating_mul(u64::from(attempt)),
            BackoffStrategy::Exponential => {
                let exponent = attempt.saturating_sub(1).min(31);
                base_ms.saturating_mul(1_u64 << exponent)
            }
            BackoffStrategy::Custom(delay_for) => delay_for(attempt, base_ms),
        };
        let max_ms = self.max_delay.as_millis().min(u64::MAX as u128) as u64;
        let capped_ms = raw_ms.min(max_ms);
        if !self.jitter {
            return Duration::from_millis(capped_ms);
        }
        let factor: f64 = rand::rng().random_range(0.5..1.0);
        Duration::from_millis(((capped_ms as f64) * factor).floor() as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

fn default_retry_on() -> BTreeSet<RetryOn> {
    [RetryOn::Network, RetryOn::ServerError, RetryOn::Status(429)]
        .into_iter()
        .collect()
}
