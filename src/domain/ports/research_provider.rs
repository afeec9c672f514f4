use crate::domain::entities::match_record::Match;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Marker passed to analysis when a match has no usable research.
pub const NO_QUALITATIVE_DATA: &str = "No qualitative data available.";

/// Qualitative signals (news, injuries, form) for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QualitativeReport {
    Findings(String),
    Empty,
}

impl QualitativeReport {
    /// Blank findings collapse to `Empty`.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.trim().is_empty() {
            QualitativeReport::Empty
        } else {
            QualitativeReport::Findings(text)
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, QualitativeReport::Empty)
    }

    /// Text handed to the analysis engine and stored with the recommendation.
    pub fn as_context(&self) -> &str {
        match self {
            QualitativeReport::Findings(text) => text,
            QualitativeReport::Empty => NO_QUALITATIVE_DATA,
        }
    }
}

/// Never fails: a provider that cannot find anything returns `Empty`.
#[async_trait]
pub trait ResearchProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn research(&self, record: &Match) -> QualitativeReport;
}
