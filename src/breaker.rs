use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::util::lock_unpoisoned;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BreakerPolicy {
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
}

impl BreakerPolicy {
    pub const fn standard() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }

    pub const fn failure_threshold(mut self, failure_threshold: u32) -> Self {
        self.failure_threshold = if failure_threshold == 0 {
            1
        } else {
            failure_threshold
        };
        self
    }

    pub const fn reset_timeout(mut self, reset_timeout: Duration) -> Self {
        self.reset_timeout = reset_timeout;
        self
    }

    pub const fn half_open_max_calls(mut self, half_open_max_calls: u32) -> Self {
        self.half_open_max_calls = if half_open_max_calls == 0 {
            1
        } else {
            half_open_max_calls
        };
        self
    }
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

/// Admission was refused because the circuit is open (or its half-open probe
/// budget is spent).
#[derive(Debug)]
pub(crate) struct BreakerRejected;

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    half_open_calls: u32,
    last_opened_at: Option<Instant>,
}

/// Cross-request health gate shared by every attempt of a client.
///
/// The failure counter is per closed epoch: it grows on each recorded failure
/// and is cleared by any success or by closing the circuit.
#[derive(Debug)]
pub(crate) struct CircuitBreaker {
    policy: BreakerPolicy,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub(crate) fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                half_open_calls: 0,
                last_opened_at: None,
            }),
        }
    }

    /// Gate one attempt. An open circuit whose reset timeout has elapsed
    /// flips to half-open and admits up to `half_open_max_calls` probes.
    pub(crate) fn check(&self) -> Result<(), BreakerRejected> {
        let mut inner = lock_unpoisoned(&self.inner);
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_opened_at
                .map(|opened_at| opened_at.elapsed())
                .unwrap_or(Duration::MAX);
            if elapsed < self.policy.reset_timeout {
                return Err(BreakerRejected);
            }
            inner.state = CircuitState::HalfOpen;
            inner.half_open_calls = 0;
        }
        if inner.state == CircuitState::HalfOpen {
            if inner.half_open_calls >= self.policy.half_open_max_calls {
                return Err(BreakerRejected);
            }
            inner.half_open_calls += 1;
        }
        Ok(())
    }

    pub(crate) fn record_success(&self) {
        let mut inner = lock_unpoisoned(&self.inner);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
            }
            CircuitState::Closed => inner.failures = 0,
            // Unreachable in practice: check() gates every attempt.
            CircuitState::Open => {}
        }
    }

    pub(crate) fn record_failure(&self) {
        let mut inner = lock_unpoisoned(&self.inner);
        inner.failures = inner.failures.saturating_add(1);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.last_opened_at = Some(Instant::now());
            }
            CircuitState::Closed => {
                if inner.failures >= self.policy.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.last_opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {}
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        lock_unpoisoned(&self.inner).state
    }

    pub(crate) fn failures(&self) -> u32 {
        lock_unpoisoned(&self.inner).failures
    }
}
