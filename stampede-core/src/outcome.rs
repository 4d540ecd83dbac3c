//! Verdicts and per-request outcomes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a request counted as a failure
///
/// `Display` yields the reason string recorded in the metrics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FailureReason {
    /// 5xx from the target service
    #[error("Server Error: {0}")]
    ServerError(u16),

    /// 401/403 under an auth-sensitive policy; points at harness credentials
    #[error("Auth Error: {0}")]
    AuthError(u16),

    /// Remaining 4xx statuses
    #[error("Client Error: {0}")]
    ClientError(u16),

    /// Body could not be decoded
    #[error("JSON Parse Error: {0}")]
    ParseError(String),

    /// `success: false` with a code the scenario does not expect
    #[error("Business Error: {0}")]
    BusinessError(String),

    /// Required fields absent from the payload
    #[error("Missing fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// A returned value broke a documented invariant
    #[error("Invalid expectedCount: {value} for {item}")]
    RangeError { item: String, value: f64 },

    /// No response at all (connection refused, client timeout, ...)
    #[error("Request Error: {0}")]
    RequestError(String),
}

impl FailureReason {
    /// Short category name, stable across messages
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::ServerError(_) => "server_error",
            FailureReason::AuthError(_) => "auth_error",
            FailureReason::ClientError(_) => "client_error",
            FailureReason::ParseError(_) => "parse_error",
            FailureReason::BusinessError(_) => "business_error",
            FailureReason::MissingFields(_) => "schema_error",
            FailureReason::RangeError { .. } => "range_error",
            FailureReason::RequestError(_) => "request_error",
        }
    }
}

/// Classification outcome of a single request
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Success,
    /// A benign business exception; never counts against the failure ratio
    ExpectedException { code: String },
    Failure(FailureReason),
}

impl Verdict {
    pub fn is_failure(&self) -> bool {
        matches!(self, Verdict::Failure(_))
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Verdict::Failure(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Success => "success",
            Verdict::ExpectedException { .. } => "expected_exception",
            Verdict::Failure(_) => "failure",
        }
    }
}

/// Page statistics pulled out of paginated responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtractedMetrics {
    pub total_elements: u64,
    pub number_of_elements: u64,
}

/// Result of running the classifier over one response
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub verdict: Verdict,
    pub extracted: Option<ExtractedMetrics>,
}

impl Classification {
    pub fn success() -> Self {
        Self {
            verdict: Verdict::Success,
            extracted: None,
        }
    }

    pub fn failure(reason: FailureReason) -> Self {
        Self {
            verdict: Verdict::Failure(reason),
            extracted: None,
        }
    }

    pub fn expected_exception(code: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::ExpectedException { code: code.into() },
            extracted: None,
        }
    }
}

/// One classified request, folded into the aggregates and then dropped
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub scenario: String,
    /// HTTP status, or 0 when no response arrived
    pub status: u16,
    pub elapsed: Duration,
    pub verdict: Verdict,
    pub extracted: Option<ExtractedMetrics>,
    pub timestamp: DateTime<Utc>,
}

impl RequestOutcome {
    pub fn new(
        scenario: impl Into<String>,
        status: u16,
        elapsed: Duration,
        classification: Classification,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            status,
            elapsed,
            verdict: classification.verdict,
            extracted: classification.extracted,
            timestamp: Utc::now(),
        }
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        self.verdict.failure_reason()
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}
