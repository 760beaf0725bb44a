//! Job status lifecycle and state machine.
//!
//! ```text
//! accepted ──> running ──> successful
//!    │            │
//!    └────────────┴──────> failed
//! ```
//!
//! `successful` and `failed` are terminal. This module lives in `core` so the
//! job stores and the API layer validate transitions with the same rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Running,
    Successful,
    Failed,
}

impl JobStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Accepted,
        JobStatus::Running,
        JobStatus::Successful,
        JobStatus::Failed,
    ];

    /// Storage / wire name of the status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Running => "running",
            Self::Successful => "successful",
            Self::Failed => "failed",
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }

    /// Statuses reachable from `self` in one step.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            Self::Accepted => &[Self::Running, Self::Failed],
            Self::Running => &[Self::Successful, Self::Failed],
            Self::Successful | Self::Failed => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(Self::Accepted),
            "running" => Ok(Self::Running),
            "successful" => Ok(Self::Successful),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}
