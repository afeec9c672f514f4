use crate::domain::entities::match_record::Match;
use crate::domain::entities::odds_snapshot::OddsSnapshot;
use crate::domain::error::DomainError;
use async_trait::async_trait;

/// A match as seen in one fetch, with the prices observed for it.
#[derive(Debug, Clone)]
pub struct ObservedMatch {
    pub record: Match,
    pub snapshot: OddsSnapshot,
}

/// Produces current odds for a set of leagues. Called once per cycle.
#[async_trait]
pub trait OddsSource: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with `SourceUnavailable` on provider outage.
    async fn fetch(&self, leagues: &[String]) -> Result<Vec<ObservedMatch>, DomainError>;
}
