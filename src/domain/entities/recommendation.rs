use crate::domain::error::DomainError;
use crate::domain::values::delivery_status::DeliveryStatus;
use crate::domain::values::pick::{ConfidenceLevel, Pick};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Structured output of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationContent {
    pub pick: Pick,
    /// Short human-readable pick, e.g. "Arsenal Win".
    pub pick_text: String,
    pub confidence: ConfidenceLevel,
    /// One sentence explaining the edge.
    pub edge_reason: String,
    pub key_factors: Vec<String>,
}

impl RecommendationContent {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.pick_text.trim().is_empty() {
            return Err(DomainError::Analysis("empty pick_text".into()));
        }
        if self.edge_reason.trim().is_empty() {
            return Err(DomainError::Analysis("empty edge_reason".into()));
        }
        if self.key_factors.iter().all(|f| f.trim().is_empty()) {
            return Err(DomainError::Analysis("no key_factors".into()));
        }
        Ok(())
    }
}

/// The stored recommendation for a match. At most one exists per match; after
/// creation only the delivery fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub match_id: String,
    pub content: RecommendationContent,
    /// Qualitative context the analysis was based on.
    pub research_context: String,
    pub created_at: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
    pub last_delivery_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Recommendation {
    pub fn new(match_id: String, content: RecommendationContent, research_context: String) -> Self {
        Self {
            match_id,
            content,
            research_context,
            created_at: Utc::now(),
            delivery_status: DeliveryStatus::Pending,
            last_delivery_error: None,
            last_attempt_at: None,
            delivered_at: None,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.delivery_status.is_confirmed()
    }
}
