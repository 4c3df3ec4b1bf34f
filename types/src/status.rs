//! Lifecycle status enums for sessions, modules, and upload ledger entries.
//!
//! Statuses are persisted as kebab-case strings. Parsing happens at the
//! storage boundary via `from_key`; an unknown string is a typed error, not
//! a default.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} status '{raw}'; expected one of: {expected:?}")]
pub struct StatusParseError {
    kind: &'static str,
    raw: String,
    expected: &'static [&'static str],
}

impl StatusParseError {
    fn new(kind: &'static str, raw: &str, expected: &'static [&'static str]) -> Self {
        Self {
            kind,
            raw: raw.to_owned(),
            expected,
        }
    }
}

// ============================================================================
// Session status
// ============================================================================

/// Lifecycle state of a training-session attempt chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    CurriculumGenerating,
    InProgress,
    InRemediation,
    Evaluating,
    Passed,
    Failed,
    Exhausted,
    Abandoned,
}

const SESSION_STATUS_KEYS: &[&str] = &[
    "curriculum-generating",
    "in-progress",
    "in-remediation",
    "evaluating",
    "passed",
    "failed",
    "exhausted",
    "abandoned",
];

impl SessionStatus {
    /// Stable storage/wire key.
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::CurriculumGenerating => "curriculum-generating",
            Self::InProgress => "in-progress",
            Self::InRemediation => "in-remediation",
            Self::Evaluating => "evaluating",
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
            Self::Abandoned => "abandoned",
        }
    }

    pub fn from_key(raw: &str) -> Result<Self, StatusParseError> {
        match raw {
            "curriculum-generating" => Ok(Self::CurriculumGenerating),
            "in-progress" => Ok(Self::InProgress),
            "in-remediation" => Ok(Self::InRemediation),
            "evaluating" => Ok(Self::Evaluating),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "exhausted" => Ok(Self::Exhausted),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(StatusParseError::new("session", raw, SESSION_STATUS_KEYS)),
        }
    }

    /// Terminal statuses have no outgoing transitions; the session is frozen
    /// except for its evidence linkage.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Exhausted | Self::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

// ============================================================================
// Module status
// ============================================================================

/// Lifecycle state of one module within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleStatus {
    Locked,
    ContentGenerating,
    Learning,
    ScenarioActive,
    QuizActive,
    Scored,
}

const MODULE_STATUS_KEYS: &[&str] = &[
    "locked",
    "content-generating",
    "learning",
    "scenario-active",
    "quiz-active",
    "scored",
];

impl ModuleStatus {
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::ContentGenerating => "content-generating",
            Self::Learning => "learning",
            Self::ScenarioActive => "scenario-active",
            Self::QuizActive => "quiz-active",
            Self::Scored => "scored",
        }
    }

    pub fn from_key(raw: &str) -> Result<Self, StatusParseError> {
        match raw {
            "locked" => Ok(Self::Locked),
            "content-generating" => Ok(Self::ContentGenerating),
            "learning" => Ok(Self::Learning),
            "scenario-active" => Ok(Self::ScenarioActive),
            "quiz-active" => Ok(Self::QuizActive),
            "scored" => Ok(Self::Scored),
            _ => Err(StatusParseError::new("module", raw, MODULE_STATUS_KEYS)),
        }
    }
}

impl fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

// ============================================================================
// Upload status
// ============================================================================

/// Ledger status of a compliance upload. Transitions only
/// pending → succeeded or pending → failed, never reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadStatus {
    Pending,
    Succeeded,
    Failed,
}

const UPLOAD_STATUS_KEYS: &[&str] = &["pending", "succeeded", "failed"];

impl UploadStatus {
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn from_key(raw: &str) -> Result<Self, StatusParseError> {
        match raw {
            "pending" => Ok(Self::Pending),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(StatusParseError::new("upload", raw, UPLOAD_STATUS_KEYS)),
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}
