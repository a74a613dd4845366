//! Retry pacing and diagnostic classification

use std::time::Duration;

use async_trait::async_trait;

/// How a failed probe should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticClass {
    RateLimited,
    NotFound,
    Transient,
    Unknown,
}

const RATE_LIMIT_MARKERS: &[&str] = &["toomanyrequests", "too many requests", "rate limit"];

/// Matched as whole words only; diagnostics echo image tags such as `app:1f4290ab`.
const RATE_LIMIT_STATUS_CODES: &[&str] = &["429", "503"];

const NOT_FOUND_MARKERS: &[&str] = &[
    "manifest unknown",
    "no such manifest",
    "not found",
    "denied",
];

const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "timed out",
    "connection refused",
    "connection reset",
    "temporary failure",
    "tls handshake",
];

/// Case-insensitive substring match, rate limits first.
pub fn classify(diagnostic: &str) -> DiagnosticClass {
    let text = diagnostic.to_lowercase();
    let matches = |markers: &[&str]| markers.iter().any(|m| text.contains(m));

    if matches(RATE_LIMIT_MARKERS) || has_status_code(&text, RATE_LIMIT_STATUS_CODES) {
        DiagnosticClass::RateLimited
    } else if matches(NOT_FOUND_MARKERS) {
        DiagnosticClass::NotFound
    } else if matches(TRANSIENT_MARKERS) {
        DiagnosticClass::Transient
    } else {
        DiagnosticClass::Unknown
    }
}

fn has_status_code(text: &str, codes: &[&str]) -> bool {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .any(|word| codes.contains(&word))
}

/// `unit * 2^(attempt - 1)` for 1-based attempts, saturating.
pub fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    unit.saturating_mul(1u32 << exponent)
}

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
