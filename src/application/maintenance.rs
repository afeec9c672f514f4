use crate::domain::error::DomainError;
use crate::domain::ports::match_store::MatchStore;
use crate::domain::values::lifecycle::MatchStatus;
use std::sync::Arc;
use tracing::info;

/// Operator actions outside the normal cycle.
pub struct MaintenanceUseCase {
    store: Arc<dyn MatchStore>,
}

impl MaintenanceUseCase {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    /// Returns a match to `NEW` so the next cycle analyzes it again. Returns
    /// the status it had before the reset.
    pub fn reset(&self, match_id: &str) -> Result<MatchStatus, DomainError> {
        let previous = self.store.match_status(match_id)?;
        self.store.reset_match(match_id)?;
        info!(match_id, previous = %previous, "match reset for re-analysis");
        Ok(previous)
    }
}
