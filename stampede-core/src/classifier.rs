//! Response classification
//!
//! Maps one HTTP response plus the scenario's rules to a [`Classification`].
//! Rules are applied in a fixed order and the first match wins:
//!
//! 1. expected-timeout scenarios accept a 503 or a slow response
//! 2. status >= 500 is a server error
//! 3. 401/403 under an auth-sensitive policy is an auth error
//! 4. statuses the policy explicitly accepts are successes
//! 5. remaining status >= 400 is a client error
//! 6. the body must decode (unless the policy does not require JSON)
//! 7. `success: false` is an expected exception or a business error
//! 8. required fields must be present
//! 9. item `expectedCount` values must be non-negative
//!
//! Classification never fails: every problem becomes a verdict.

use crate::outcome::{Classification, ExtractedMetrics, FailureReason};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use stampede_http::{HttpError, HttpResponse};
use std::collections::BTreeSet;
use std::time::Duration;

/// Named rule set a scenario points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierPolicy {
    /// Report 401/403 as auth errors instead of client errors
    pub auth_sensitive: bool,

    /// Statuses treated as success before the generic 4xx rule
    pub accepted_statuses: Vec<u16>,

    /// Whether the body must be JSON at all
    #[serde(default = "default_require_json")]
    pub require_json: bool,

    /// Fields that must be present in the payload
    pub required_fields: Vec<String>,

    /// Check `items[].expectedCount >= 0`
    pub check_item_counts: bool,

    /// Pull `totalElements` / `numberOfElements` out of the payload
    pub extract_page_stats: bool,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            auth_sensitive: false,
            accepted_statuses: Vec::new(),
            require_json: true,
            required_fields: Vec::new(),
            check_item_counts: false,
            extract_page_stats: false,
        }
    }
}

fn default_require_json() -> bool {
    true
}

/// Everything the classifier needs to know about the scenario
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub policy: &'a ClassifierPolicy,
    /// Business error codes that count as expected exceptions
    pub expected_codes: &'a BTreeSet<String>,
    /// Latency threshold for expected-timeout scenarios
    pub expected_timeout: Option<Duration>,
}

/// Decoded response body
///
/// A body carrying a `success` key is the wrapped envelope; anything else
/// is the payload itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Wrapped {
        success: bool,
        data: JsonValue,
        error: Option<ApiError>,
    },
    Direct(JsonValue),
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: JsonValue,
    #[serde(default)]
    error: Option<ApiError>,
}

impl ResponseBody {
    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let value: JsonValue = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;

        let is_wrapped = value
            .as_object()
            .is_some_and(|object| object.contains_key("success"));
        if !is_wrapped {
            return Ok(ResponseBody::Direct(value));
        }

        let envelope: Envelope = serde_json::from_value(value).map_err(|e| e.to_string())?;
        Ok(ResponseBody::Wrapped {
            success: envelope.success,
            data: envelope.data,
            error: envelope.error,
        })
    }
}

/// Classify a response that arrived
pub fn classify(
    response: &HttpResponse,
    elapsed: Duration,
    context: &ClassifyContext<'_>,
) -> Classification {
    let status = response.status;
    let policy = context.policy;

    if let Some(threshold) = context.expected_timeout {
        if status == 503 || elapsed > threshold {
            return Classification::success();
        }
    }

    if status >= 500 {
        return Classification::failure(FailureReason::ServerError(status));
    }

    if policy.auth_sensitive && (status == 401 || status == 403) {
        return Classification::failure(FailureReason::AuthError(status));
    }

    if policy.accepted_statuses.contains(&status) {
        return Classification::success();
    }

    if status >= 400 {
        return Classification::failure(FailureReason::ClientError(status));
    }

    if !policy.require_json {
        return Classification::success();
    }

    let body = match ResponseBody::decode(&response.body) {
        Ok(body) => body,
        Err(detail) => return Classification::failure(FailureReason::ParseError(detail)),
    };

    let payload = match body {
        ResponseBody::Wrapped {
            success: false,
            error,
            ..
        } => {
            let error = error.unwrap_or_default();
            if let Some(code) = error
                .code
                .filter(|code| context.expected_codes.contains(code))
            {
                return Classification::expected_exception(code);
            }
            let message = error.message.unwrap_or_else(|| "Unknown error".to_string());
            return Classification::failure(FailureReason::BusinessError(message));
        }
        ResponseBody::Wrapped { data, .. } => data,
        ResponseBody::Direct(value) => value,
    };

    let missing: Vec<String> = policy
        .required_fields
        .iter()
        .filter(|field| payload.get(field.as_str()).is_none())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Classification::failure(FailureReason::MissingFields(missing));
    }

    if policy.check_item_counts {
        if let Some(reason) = check_item_counts(&payload) {
            return Classification::failure(reason);
        }
    }

    let mut classification = Classification::success();
    if policy.extract_page_stats {
        classification.extracted = Some(extract_page_stats(&payload));
    }
    classification
}

/// Classify a request that produced no response
pub fn classify_transport_error(error: &HttpError, context: &ClassifyContext<'_>) -> Classification {
    if context.expected_timeout.is_some() && error.is_timeout() {
        return Classification::success();
    }
    Classification::failure(FailureReason::RequestError(error.to_string()))
}

// Zero is a valid count (the optimal state); a missing count reads as -1.
fn check_item_counts(payload: &JsonValue) -> Option<FailureReason> {
    let items = payload.get("items")?.as_array()?;
    items.iter().find_map(|item| {
        let value = item
            .get("expectedCount")
            .and_then(JsonValue::as_f64)
            .unwrap_or(-1.0);
        (value < 0.0).then(|| FailureReason::RangeError {
            item: item
                .get("itemName")
                .and_then(JsonValue::as_str)
                .unwrap_or("unknown")
                .to_string(),
            value,
        })
    })
}

fn extract_page_stats(payload: &JsonValue) -> ExtractedMetrics {
    let read = |key: &str| payload.get(key).and_then(JsonValue::as_u64).unwrap_or(0);
    ExtractedMetrics {
        total_elements: read("totalElements"),
        number_of_elements: read("numberOfElements"),
    }
}
