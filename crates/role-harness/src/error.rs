//! Error taxonomy for scenario execution
//!
//! Every component returns [`HarnessError`]. Errors surface to the scenario
//! that raised them and fail only that scenario.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HarnessError {
    #[error("login as {email} did not reach the dashboard within {waited:?} (last url: {last_url})")]
    Authentication {
        email: String,
        waited: Duration,
        last_url: String,
    },

    #[error("logout for {identity} failed: {reason}")]
    Logout { identity: String, reason: String },

    #[error("navigation entry \"{label}\" is not present")]
    NavigationUnavailable { label: String },

    #[error("navigating to \"{label}\" did not reach {pattern} within {waited:?} (last url: {last_url})")]
    NavigationTimeout {
        label: String,
        pattern: String,
        waited: Duration,
        last_url: String,
    },

    #[error("frame \"{frame}\" did not become ready within {waited:?}")]
    FrameTimeout { frame: String, waited: Duration },

    #[error("frame \"{frame}\" reported a load error {}", retry_suffix(.retried))]
    FrameLoad { frame: String, retried: bool },

    /// Content frame vanished or its document is being replaced
    #[error("frame \"{frame}\" is not attached")]
    FrameDetached { frame: String },

    #[error("in {scope}: expected {expected}: {detail}")]
    Assertion {
        scope: String,
        expected: String,
        detail: String,
    },

    #[error("scenario exceeded its {0:?} deadline")]
    ScenarioTimeout(Duration),

    #[error("browser driver error: {0}")]
    Driver(String),

    #[error("configuration error: {0}")]
    Config(String),
}

fn retry_suffix(retried: &bool) -> &'static str {
    if *retried {
        "again after retry"
    } else {
        "with no retry control"
    }
}

/// Stable tag for a [`HarnessError`] variant, used in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Logout,
    NavigationUnavailable,
    NavigationTimeout,
    FrameTimeout,
    FrameLoad,
    FrameDetached,
    Assertion,
    ScenarioTimeout,
    Driver,
    Config,
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::Authentication { .. } => ErrorKind::Authentication,
            HarnessError::Logout { .. } => ErrorKind::Logout,
            HarnessError::NavigationUnavailable { .. } => ErrorKind::NavigationUnavailable,
            HarnessError::NavigationTimeout { .. } => ErrorKind::NavigationTimeout,
            HarnessError::FrameTimeout { .. } => ErrorKind::FrameTimeout,
            HarnessError::FrameLoad { .. } => ErrorKind::FrameLoad,
            HarnessError::FrameDetached { .. } => ErrorKind::FrameDetached,
            HarnessError::Assertion { .. } => ErrorKind::Assertion,
            HarnessError::ScenarioTimeout(_) => ErrorKind::ScenarioTimeout,
            HarnessError::Driver(_) => ErrorKind::Driver,
            HarnessError::Config(_) => ErrorKind::Config,
        }
    }

    /// True when the failure is a deadline expiring rather than the
    /// application showing something wrong.
    ///
    /// Authentication and logout failures are both bounded waits on a URL
    /// transition, but they are reported as application failures: a
    /// dashboard that never appears after valid credentials is a regression.
    pub fn is_timing(&self) -> bool {
        matches!(
            self,
            HarnessError::NavigationTimeout { .. }
                | HarnessError::FrameTimeout { .. }
                | HarnessError::FrameDetached { .. }
                | HarnessError::ScenarioTimeout(_)
        )
    }

    pub(crate) fn assertion(
        scope: impl Into<String>,
        expected: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        HarnessError::Assertion {
            scope: scope.into(),
            expected: expected.into(),
            detail: detail.into(),
        }
    }
}

impl From<chromiumoxide::error::CdpError> for HarnessError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        HarnessError::Driver(err.to_string())
    }
}
