use crate::domain::entities::match_record::Match;
use crate::domain::ports::research_provider::{QualitativeReport, ResearchProvider};

/// Research disabled: every match is analyzed on odds alone.
pub struct NoopResearch;

#[async_trait::async_trait]
impl ResearchProvider for NoopResearch {
    fn name(&self) -> &str {
        "noop"
    }

    async fn research(&self, _record: &Match) -> QualitativeReport {
        QualitativeReport::Empty
    }
}
