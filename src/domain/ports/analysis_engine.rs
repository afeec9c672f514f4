use crate::config::strategy::StrategyConfig;
use crate::domain::entities::match_record::Match;
use crate::domain::entities::odds_snapshot::OddsSnapshot;
use crate::domain::entities::recommendation::RecommendationContent;
use crate::domain::error::DomainError;
use crate::domain::ports::research_provider::QualitativeReport;
use async_trait::async_trait;

/// Turns odds history and research into a structured recommendation.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    fn name(&self) -> &str;

    /// `odds_history` is oldest first. Fails with `Analysis` on provider errors
    /// or output that does not validate.
    async fn analyze(
        &self,
        record: &Match,
        odds_history: &[OddsSnapshot],
        report: &QualitativeReport,
        strategy: &StrategyConfig,
    ) -> Result<RecommendationContent, DomainError>;
}
