use crate::domain::entities::cycle_summary::CycleSummary;
use crate::domain::entities::match_record::Match;
use crate::domain::entities::odds_snapshot::OddsSnapshot;
use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::values::lifecycle::MatchStatus;
use serde::Serialize;

#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub limit: Option<usize>,
}

/// A match together with its derived lifecycle status and failure annotations.
#[derive(Debug, Clone, Serialize)]
pub struct MatchOverview {
    #[serde(flatten)]
    pub record: Match,
    pub status: MatchStatus,
    pub snapshot_count: usize,
    pub analysis_attempts: u32,
    pub last_error: Option<String>,
    pub last_delivery_error: Option<String>,
}

/// A stored recommendation whose delivery has not been confirmed.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub record: Match,
    pub recommendation: Recommendation,
}

/// Durable storage for matches, odds history and recommendations.
///
/// Each operation is atomic. The store, not the caller, enforces the
/// one-recommendation-per-match and append-only snapshot invariants.
pub trait MatchStore: Send + Sync {
    /// Inserts the match if its id is unknown. Returns `true` when inserted;
    /// an existing match is left untouched.
    fn upsert_match(&self, record: &Match) -> Result<bool, DomainError>;

    /// Always inserts a new snapshot. `NotFound` if the match is unknown.
    fn append_snapshot(&self, snapshot: &OddsSnapshot) -> Result<(), DomainError>;

    /// Snapshots for a match, oldest first.
    fn odds_history(&self, match_id: &str) -> Result<Vec<OddsSnapshot>, DomainError>;

    /// Matches with no recommendation (not abandoned or expired), in discovery order.
    fn find_matches_needing_analysis(&self) -> Result<Vec<Match>, DomainError>;

    /// Unexpired matches whose recommendation has not been confirmed delivered.
    fn find_matches_pending_delivery(&self) -> Result<Vec<PendingDelivery>, DomainError>;

    /// `Conflict` if the match already has a recommendation, `NotFound` if the
    /// match is unknown.
    fn save_recommendation(&self, recommendation: &Recommendation) -> Result<(), DomainError>;

    /// Idempotent.
    fn mark_delivered(&self, match_id: &str) -> Result<(), DomainError>;

    /// Idempotent; a delivered recommendation is left delivered.
    fn mark_delivery_failed(&self, match_id: &str, reason: &str) -> Result<(), DomainError>;

    /// Records a failed analysis and returns the total failed attempts.
    fn record_analysis_failure(&self, match_id: &str, reason: &str) -> Result<u32, DomainError>;

    fn abandon_analysis(&self, match_id: &str) -> Result<(), DomainError>;

    /// Marks a match that kicked off before delivery. It leaves both work
    /// queues and reports as expired unless already delivered.
    fn expire_match(&self, match_id: &str) -> Result<(), DomainError>;

    /// Maintenance: drops the recommendation and failure counters so the match
    /// is analyzed again from scratch.
    fn reset_match(&self, match_id: &str) -> Result<(), DomainError>;

    fn get_match(&self, match_id: &str) -> Result<Option<Match>, DomainError>;
    fn get_recommendation(&self, match_id: &str) -> Result<Option<Recommendation>, DomainError>;
    fn match_status(&self, match_id: &str) -> Result<MatchStatus, DomainError>;
    fn list_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchOverview>, DomainError>;

    fn record_cycle(&self, summary: &CycleSummary) -> Result<(), DomainError>;
    /// Most recent first.
    fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleSummary>, DomainError>;
}
