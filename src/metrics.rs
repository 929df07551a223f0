use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use http::Method;

use crate::util::lock_unpoisoned;

pub(crate) const MAX_SAMPLES: usize = 1000;
pub(crate) const RECENT_FAILURE_WINDOW: Duration = Duration::from_secs(60);

/// One completed attempt outcome as retained by the sample ring.
#[derive(Clone, Debug)]
pub struct RequestSample {
    pub request_id: String,
    pub url: String,
    pub method: Method,
    pub latency_ms: u64,
    pub attempt: u32,
    pub status: Option<u16>,
    pub success: bool,
    pub recorded_at: Instant,
}

impl RequestSample {
    pub(crate) fn new(
        request_id: impl Into<String>,
        url: impl Into<String>,
        method: Method,
        latency_ms: u64,
        attempt: u32,
        status: Option<u16>,
        success: bool,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            url: url.into(),
            method,
            latency_ms,
            attempt,
            status,
            success,
            recorded_at: Instant::now(),
        }
    }
}

/// Ring of the most recent request samples, capped at [`MAX_SAMPLES`];
/// the oldest sample is discarded on overflow.
#[derive(Debug, Default)]
pub(crate) struct MetricsBuffer {
    samples: Mutex<VecDeque<RequestSample>>,
}

impl MetricsBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&self, sample: RequestSample) {
        let mut samples = lock_unpoisoned(&self.samples);
        if samples.len() >= MAX_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(sample);
    }

    /// Mean latency over every resident sample; 0.0 when empty.
    pub(crate) fn average_latency_ms(&self) -> f64 {
        let samples = lock_unpoisoned(&self.samples);
        if samples.is_empty() {
            return 0.0;
        }
        let total: u64 = samples.iter().map(|sample| sample.latency_ms).sum();
        total as f64 / samples.len() as f64
    }

    /// Failed samples recorded within the trailing window.
    pub(crate) fn recent_failures(&self, window: Duration) -> usize {
        let samples = lock_unpoisoned(&self.samples);
        samples
            .iter()
            .filter(|sample| !sample.success && sample.recorded_at.elapsed() <= window)
            .count()
    }

    pub(crate) fn samples_snapshot(&self) -> Vec<RequestSample> {
        lock_unpoisoned(&self.samples).iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use http::Method;

    use super::{MAX_SAMPLES, MetricsBuffer, RequestSample};

    fn sample(id: u32, latency_ms: u64, success: bool) -> RequestSample {
        RequestSample::new(
            format!("req_{id}"),
            "https://api.example.com/users",
            Method::GET,
            latency_ms,
            1,
            if success { Some(200) } else { None },
            success,
        )
    }

    #[test]
    fn average_latency_is_zero_when_empty() {
        let buffer = MetricsBuffer::new();
        assert_eq!(buffer.average_latency_ms(), 0.0);
    }

    #[test]
    fn average_latency_covers_resident_samples() {
        let buffer = MetricsBuffer::new();
        buffer.record(sample(1, 10, true));
        buffer.record(sample(2, 30, true));
        assert_eq!(buffer.average_latency_ms(), 20.0);
    }

    #[test]
    fn ring_discards_oldest_on_overflow() {
        let buffer = MetricsBuffer::new();
        for id in 0..(MAX_SAMPLES as u32 + 5) {
            buffer.record(sample(id, 1, true));
        }
        let resident = buffer.samples_snapshot();
        assert_eq!(resident.len(), MAX_SAMPLES);
        assert_eq!(resident[0].request_id, "req_5", "oldest samples are gone");
    }

    #[test]
    fn recent_failures_counts_only_failures_in_window() {
        let buffer = MetricsBuffer::new();
        buffer.record(sample(1, 5, true));
        buffer.record(sample(2, 5, false));
        buffer.record(sample(3, 5, false));
        assert_eq!(buffer.recent_failures(Duration::from_secs(60)), 2);
        assert_eq!(buffer.recent_failures(Duration::ZERO), 0);
    }
}
