use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which pass of the scan produced a result.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Initial,
    Rescan,
}

impl ScanPhase {
    pub fn is_rescan(self) -> bool {
        matches!(self, ScanPhase::Rescan)
    }

    pub fn label(self) -> &'static str {
        match self {
            ScanPhase::Initial => "Initial Scan",
            ScanPhase::Rescan => "Re-scan",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse classification of a transport failure.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkErrorKind {
    Timeout,
    Connect,
    Request,
    Other,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkErrorKind::Timeout => "timeout",
            NetworkErrorKind::Connect => "connection failed",
            NetworkErrorKind::Request => "request failed",
            NetworkErrorKind::Other => "network error",
        };
        f.write_str(s)
    }
}

/// Why a single probe did not produce a status code.
#[derive(Serialize, Deserialize, Error, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    /// The target could not be turned into a request URI. No request was sent.
    #[error("invalid target format '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    /// Timeout, DNS, refused connection, TLS, ... The cause text is preserved.
    #[error("{kind}: {message}")]
    NetworkError {
        kind: NetworkErrorKind,
        message: String,
    },
}

impl FailureReason {
    pub fn invalid_target(target: &str, reason: impl fmt::Display) -> Self {
        FailureReason::InvalidTarget {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn network(kind: NetworkErrorKind, message: impl fmt::Display) -> Self {
        FailureReason::NetworkError {
            kind,
            message: message.to_string(),
        }
    }

    pub fn is_invalid_target(&self) -> bool {
        matches!(self, FailureReason::InvalidTarget { .. })
    }
}

/// Result of the secondary CORS probe. `error` set means the check itself failed,
/// which says nothing about whether the target is safe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CorsOutcome {
    pub vulnerable: bool,
    pub detail: String,
    pub error: Option<FailureReason>,
}

impl CorsOutcome {
    pub fn failed(error: FailureReason) -> Self {
        Self {
            vulnerable: false,
            detail: String::new(),
            error: Some(error),
        }
    }
}

/// One probed target. Built by a worker, handed to the aggregator by value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanResult {
    pub target: String,
    /// 0 when no response was received.
    pub status_code: u16,
    pub error: Option<FailureReason>,
    pub phase: ScanPhase,
    pub cors: Option<CorsOutcome>,
}

impl ScanResult {
    pub fn from_probe(target: String, outcome: Result<u16, FailureReason>, phase: ScanPhase) -> Self {
        let (status_code, error) = match outcome {
            Ok(code) => (code, None),
            Err(e) => (0, Some(e)),
        };
        Self {
            target,
            status_code,
            error,
            phase,
            cors: None,
        }
    }

    /// A response was received. Any status code counts, including 4xx/5xx.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.status_code != 0
    }

    pub fn is_rescan(&self) -> bool {
        self.phase.is_rescan()
    }
}

/// Counters after one phase completed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PhaseSummary {
    pub phase: ScanPhase,
    pub phase_targets: u64,
    pub total_targets: u64,
    pub success_count: i64,
    pub failure_count: i64,
    pub histogram: BTreeMap<u16, i64>,
    pub failed_targets: Vec<String>,
    pub elapsed_ms: u64,
}

/// Final report for a whole run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub total_targets: u64,
    pub success_count: i64,
    pub failure_count: i64,
    pub histogram: BTreeMap<u16, i64>,
    pub rescanned: bool,
    pub elapsed_ms: u64,
}
