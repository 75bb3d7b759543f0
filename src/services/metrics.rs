use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct MetricsService;

impl MetricsService {
    pub fn new() -> Self {
        Self
    }

    pub fn record_humanize(&self, outcome: &'static str) {
        counter!("humanize_requests_total", "outcome" => outcome).increment(1);
    }

    pub fn record_words_charged(&self, words: i64, premium: bool) {
        let plan = if premium { "premium" } else { "free" };
        counter!("words_charged_total", "plan" => plan).increment(words.max(0) as u64);
    }

    pub fn record_upstream_latency(&self, duration: Duration, success: bool) {
        let result = if success { "ok" } else { "error" };
        histogram!("upstream_request_duration_seconds", "result" => result)
            .record(duration.as_secs_f64());
    }

    pub fn record_premium_upgrade(&self) {
        counter!("premium_upgrades_total").increment(1);
    }

    pub fn record_error(&self, error_type: &str) {
        counter!("errors_total", "type" => error_type.to_string()).increment(1);
    }

    pub fn set_in_flight(&self, count: i64) {
        gauge!("humanize_in_flight").set(count as f64);
    }
}

pub struct RequestTimer {
    start: Instant,
    endpoint: String,
}

impl RequestTimer {
    pub fn new(endpoint: String) -> Self {
        Self {
            start: Instant::now(),
            endpoint,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        histogram!("request_duration_seconds", "endpoint" => self.endpoint.clone())
            .record(self.start.elapsed().as_secs_f64());
    }
}
