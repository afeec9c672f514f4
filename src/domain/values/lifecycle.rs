//! Per-match lifecycle: `NEW -> ANALYZED -> DELIVERED`, with an optional
//! terminal `ABANDONED` state when a bounded analysis retry policy is set, and
//! a terminal `EXPIRED` state for matches that kicked off before delivery.
//!
//! The status is never stored directly. The store derives it from the
//! presence and delivery state of a match's recommendation, and the workflow
//! engine feeds every outcome through [`MatchStatus::apply`] to decide which
//! store write follows.

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// No recommendation yet.
    New,
    /// Recommendation stored, delivery not confirmed.
    Analyzed,
    /// Recommendation delivered. Terminal.
    Delivered,
    /// Analysis attempts exhausted under a bounded retry policy. Terminal
    /// until an operator resets the match.
    Abandoned,
    /// Kicked off before a recommendation was delivered. Terminal.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    AnalysisSucceeded,
    /// `attempts` counts every failed analysis so far, this one included.
    AnalysisFailed { attempts: u32 },
    DeliverySucceeded,
    DeliveryFailed,
    /// The match start time has passed.
    KickedOff,
}

/// Retry ceiling for analysis. `None` retries forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_analysis_attempts: Option<u32>,
}

impl RetryPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn bounded(max_attempts: u32) -> Self {
        Self {
            max_analysis_attempts: Some(max_attempts.max(1)),
        }
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        self.max_analysis_attempts
            .map(|max| attempts >= max)
            .unwrap_or(false)
    }
}

impl MatchStatus {
    /// Transition function for the lifecycle. Repeated delivery events on a
    /// delivered match are absorbed so that status updates stay idempotent.
    pub fn apply(self, event: LifecycleEvent, policy: &RetryPolicy) -> Result<MatchStatus, DomainError> {
        use LifecycleEvent::*;
        use MatchStatus::*;

        match (self, event) {
            (New, AnalysisSucceeded) => Ok(Analyzed),
            (New, AnalysisFailed { attempts }) => {
                if policy.is_exhausted(attempts) {
                    Ok(Abandoned)
                } else {
                    Ok(New)
                }
            }
            (Analyzed, DeliverySucceeded) => Ok(Delivered),
            (Analyzed, DeliveryFailed) => Ok(Analyzed),
            (Delivered, DeliverySucceeded) | (Delivered, DeliveryFailed) => Ok(Delivered),
            (New | Analyzed, KickedOff) => Ok(Expired),
            (status @ (Delivered | Abandoned | Expired), KickedOff) => Ok(status),
            (status, event) => Err(DomainError::Conflict(format!(
                "cannot apply {event:?} to a match in status {status}"
            ))),
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::New => write!(f, "new"),
            MatchStatus::Analyzed => write!(f, "analyzed"),
            MatchStatus::Delivered => write!(f, "delivered"),
            MatchStatus::Abandoned => write!(f, "abandoned"),
            MatchStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for MatchStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "new" => Ok(MatchStatus::New),
            "analyzed" => Ok(MatchStatus::Analyzed),
            "delivered" => Ok(MatchStatus::Delivered),
            "abandoned" => Ok(MatchStatus::Abandoned),
            "expired" => Ok(MatchStatus::Expired),
            _ => Err(format!("Unknown match status: {s}")),
        }
    }
}
