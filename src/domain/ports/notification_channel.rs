use crate::domain::entities::match_record::Match;
use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::values::pick::ConfidenceLevel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Everything a channel needs to render a finished recommendation.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub pick_text: String,
    pub confidence: ConfidenceLevel,
    pub edge_reason: String,
    pub key_factors: Vec<String>,
}

impl Notification {
    pub fn new(record: &Match, recommendation: &Recommendation) -> Self {
        Self {
            match_id: record.id.clone(),
            home_team: record.home_team.clone(),
            away_team: record.away_team.clone(),
            start_time: record.start_time,
            pick_text: recommendation.content.pick_text.clone(),
            confidence: recommendation.content.confidence,
            edge_reason: recommendation.content.edge_reason.clone(),
            key_factors: recommendation.content.key_factors.clone(),
        }
    }
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with `Delivery` when the destination did not accept the message.
    async fn send(&self, destination: &str, notification: &Notification) -> Result<(), DomainError>;
}
