//! Request/response payloads carried by the wire frames

use serde::{Deserialize, Serialize};

use dispatcher::DispatchReport;

/// Outcome code of one dispatch request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Every active dispatcher was attempted
    Success,
    /// Payload over the blob limit; no dispatcher was invoked
    SizeLimitExceeded,
    /// Malformed or oversized frame
    BadRequest,
}

/// Body of a `RESULT` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub code: ResultCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Dispatchers whose `accept` failed or timed out, in active-set order
    #[serde(default)]
    pub failed_dispatchers: Vec<String>,
}

impl DispatchResult {
    pub fn success() -> Self {
        Self {
            code: ResultCode::Success,
            error_message: None,
            failed_dispatchers: Vec::new(),
        }
    }

    pub fn size_limit_exceeded(message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::SizeLimitExceeded,
            error_message: Some(message.into()),
            failed_dispatchers: Vec::new(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            code: ResultCode::BadRequest,
            error_message: Some(message.into()),
            failed_dispatchers: Vec::new(),
        }
    }

    /// Summarize a fan-out; partial failures still count as success
    pub fn from_report(report: &DispatchReport) -> Self {
        let failures: Vec<String> = report.failures().map(|o| o.to_string()).collect();
        Self {
            code: ResultCode::Success,
            error_message: (!failures.is_empty()).then(|| failures.join("; ")),
            failed_dispatchers: report.failed_dispatchers(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success
    }
}
