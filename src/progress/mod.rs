//! Progress poller
//!
//! Follows a long-running server-side analysis by querying a status
//! endpoint on a fixed interval and reacting once to its terminal state.

pub mod poller;
pub mod sink;
pub mod source;

pub use poller::{PollOutcome, PollState, Poller, PollerHandle};
pub use sink::{LogSink, ProgressSink};
pub use source::StatusSource;

#[cfg(feature = "http")]
pub use source::HttpStatusSource;

use crate::Result;
use serde::{Deserialize, Serialize};

/// Poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollerConfig {
    /// Time between status requests in milliseconds
    pub interval_ms: u64,
    /// Per-request timeout in milliseconds (HTTP source)
    pub request_timeout_ms: u64,
    /// Stop after this many failed requests in a row; `None` polls forever
    pub max_consecutive_failures: Option<u32>,
    /// Where to go when the server reports completion without a target
    pub fallback_redirect: Option<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            request_timeout_ms: 30000,
            max_consecutive_failures: None,
            fallback_redirect: None,
        }
    }
}

/// Server-side state of the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollStatus {
    Running,
    Complete,
    Failed,
}

/// One status snapshot, normalised from whichever schema the server speaks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    /// 0–100
    pub percentage: u8,
    pub status: PollStatus,
    pub redirect_target: Option<String>,
    pub error_message: Option<String>,
}

/// Status body as sent by the server.
///
/// Two dialects exist: `{progress, complete, redirect_url}` and
/// `{progress, status, redirect_url, error}`. Both deserialize here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireProgress {
    #[serde(default, alias = "percentage")]
    pub progress: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub complete: Option<bool>,
    #[serde(default, alias = "redirect")]
    pub redirect_url: Option<String>,
    #[serde(default, alias = "message")]
    pub error: Option<String>,
}

impl WireProgress {
    fn status(&self) -> PollStatus {
        if let Some(status) = &self.status {
            return match status.trim().to_ascii_lowercase().as_str() {
                "complete" | "completed" | "done" | "success" => PollStatus::Complete,
                "failed" | "failure" | "error" => PollStatus::Failed,
                _ => PollStatus::Running,
            };
        }
        if self.complete == Some(true) {
            PollStatus::Complete
        } else if self.error.as_deref().is_some_and(|e| !e.is_empty()) {
            PollStatus::Failed
        } else {
            PollStatus::Running
        }
    }
}

impl From<WireProgress> for ProgressRecord {
    fn from(wire: WireProgress) -> Self {
        let status = wire.status();
        let percentage = wire
            .progress
            .filter(|p| p.is_finite())
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(if status == PollStatus::Complete { 100 } else { 0 });
        Self {
            percentage,
            status,
            redirect_target: wire.redirect_url.filter(|u| !u.is_empty()),
            error_message: wire.error.filter(|e| !e.is_empty()),
        }
    }
}

impl ProgressRecord {
    /// Parse a status response body
    pub fn parse(body: &str) -> Result<Self> {
        let wire: WireProgress = serde_json::from_str(body)?;
        Ok(wire.into())
    }

    pub fn running(percentage: u8) -> Self {
        Self {
            percentage: percentage.min(100),
            status: PollStatus::Running,
            redirect_target: None,
            error_message: None,
        }
    }

    pub fn complete(redirect: impl Into<String>) -> Self {
        Self {
            percentage: 100,
            status: PollStatus::Complete,
            redirect_target: Some(redirect.into()),
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            percentage: 0,
            status: PollStatus::Failed,
            redirect_target: None,
            error_message: Some(message.into()),
        }
    }
}
