//! Response envelope and `Retry-After` handling.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use serde_json::value::RawValue;

use archdocs_shared::{ArchDocsError, PollPolicy, Result};

/// `{status, jobId, error, result}` as returned on every submit and poll.
///
/// `error` and `result` stay as raw JSON text.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub error: Option<Box<RawValue>>,
    #[serde(default)]
    pub result: Option<Box<RawValue>>,
}

impl Envelope {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| {
            ArchDocsError::parse(format!(
                "invalid response envelope: {e} (body: {})",
                String::from_utf8_lossy(body)
            ))
        })
    }

    pub fn result_text(&self) -> Option<&str> {
        self.result.as_deref().map(RawValue::get)
    }

    pub fn error_text(&self) -> &str {
        self.error
            .as_deref()
            .map(RawValue::get)
            .unwrap_or("unknown error")
    }
}

/// Interval to wait before the next poll.
///
/// Whole seconds from `Retry-After`; a missing, non-numeric or non-positive
/// value falls back to the default, and anything above the maximum is capped.
pub fn poll_interval(value: Option<&str>, policy: &PollPolicy) -> Duration {
    let Some(secs) = value.and_then(|v| v.trim().parse::<i64>().ok()) else {
        return policy.default_interval;
    };
    if secs < 1 {
        return policy.default_interval;
    }
    Duration::from_secs(secs.unsigned_abs()).min(policy.max_interval)
}

pub(crate) fn poll_interval_from(headers: &HeaderMap, policy: &PollPolicy) -> Duration {
    let value = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok());
    poll_interval(value, policy)
}
