use crate::domain::entities::cycle_summary::CycleSummary;
use crate::domain::entities::odds_snapshot::OddsSnapshot;
use crate::domain::error::DomainError;
use crate::domain::ports::match_store::{MatchFilter, MatchOverview, MatchStore};
use crate::domain::values::lifecycle::MatchStatus;
use serde::Serialize;
use std::sync::Arc;

pub struct StatusUseCase {
    store: Arc<dyn MatchStore>,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub new: usize,
    pub analyzed: usize,
    pub delivered: usize,
    pub abandoned: usize,
    pub expired: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub counts: StatusCounts,
    pub matches: Vec<MatchOverview>,
}

impl StatusUseCase {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Counts cover every match; `matches` honours the filter.
    pub fn report(&self, status: Option<MatchStatus>, limit: Option<usize>) -> Result<StatusReport, DomainError> {
        let all = self.store.list_matches(&MatchFilter::default())?;
        let mut counts = StatusCounts::default();
        for m in &all {
            match m.status {
                MatchStatus::New => counts.new += 1,
                MatchStatus::Analyzed => counts.analyzed += 1,
                MatchStatus::Delivered => counts.delivered += 1,
                MatchStatus::Abandoned => counts.abandoned += 1,
                MatchStatus::Expired => counts.expired += 1,
            }
        }

        let matches = self.store.list_matches(&MatchFilter { status, limit })?;
        Ok(StatusReport { counts, matches })
    }

    pub fn history(&self, match_id: &str) -> Result<Vec<OddsSnapshot>, DomainError> {
        if self.store.get_match(match_id)?.is_none() {
            return Err(DomainError::NotFound(format!("Match not found: {match_id}")));
        }
        self.store.odds_history(match_id)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<CycleSummary>, DomainError> {
        self.store.recent_cycles(limit)
    }
}
