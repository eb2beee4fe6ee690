//! Metrics instrumentation for meshname-dns.
//!
//! All metrics are prefixed with `meshname_dns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// How one question was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionOutcome {
    /// Answered from the local zone table.
    Local,
    /// Queued for forwarding to the encoded address.
    Forwarded,
    /// Name too short, or suffix not served.
    InvalidName,
    /// Sub-label is not a valid address encoding.
    DecodeError,
    /// Client is not allowed to trigger remote lookups.
    RemoteDenied,
    /// Decoded address outside the suffix's subnet.
    SubnetMismatch,
}

impl QuestionOutcome {
    fn as_str(self) -> &'static str {
        match self {
            QuestionOutcome::Local => "local",
            QuestionOutcome::Forwarded => "forwarded",
            QuestionOutcome::InvalidName => "invalid_name",
            QuestionOutcome::DecodeError => "decode_error",
            QuestionOutcome::RemoteDenied => "remote_denied",
            QuestionOutcome::SubnetMismatch => "subnet_mismatch",
        }
    }
}

/// Record the outcome of classifying one question.
pub fn record_question(record_type: &str, outcome: QuestionOutcome) {
    counter!(
        "meshname_dns.question.count",
        "type" => record_type.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Result of one forward exchange.
#[derive(Debug, Clone, Copy)]
pub enum ForwardResult {
    /// Response received and merged.
    Success,
    /// No response within the timeout.
    Timeout,
    /// Transport error or malformed response.
    Error,
}

/// Record a forward exchange.
pub fn record_forward(result: ForwardResult, questions: usize, duration: std::time::Duration) {
    let result_str = match result {
        ForwardResult::Success => "success",
        ForwardResult::Timeout => "timeout",
        ForwardResult::Error => "error",
    };

    counter!("meshname_dns.forward.count", "result" => result_str).increment(1);
    histogram!("meshname_dns.forward.questions").record(questions as f64);
    histogram!("meshname_dns.forward.duration.seconds", "result" => result_str)
        .record(duration.as_secs_f64());
}

/// Record a handled request.
pub fn record_request(answers: usize, duration: std::time::Duration) {
    counter!("meshname_dns.request.count").increment(1);
    histogram!("meshname_dns.request.answers").record(answers as f64);
    histogram!("meshname_dns.request.duration.seconds").record(duration.as_secs_f64());
}

/// Record a request refused because none of its questions is served here.
pub fn record_refused() {
    counter!("meshname_dns.request.refused.count").increment(1);
}

/// Record a zone reload attempt.
pub fn record_reload(success: bool) {
    let result = if success { "success" } else { "error" };
    counter!("meshname_dns.reload.count", "result" => result).increment(1);
}

/// Record table sizes (call on change).
pub fn record_state_counts(labels: usize, records: usize, networks: usize) {
    gauge!("meshname_dns.state.labels.count").set(labels as f64);
    gauge!("meshname_dns.state.records.count").set(records as f64);
    gauge!("meshname_dns.state.networks.count").set(networks as f64);
}

/// Record the table generation.
pub fn record_generation(generation: u64) {
    gauge!("meshname_dns.state.generation").set(generation as f64);
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}
