use crate::domain::values::stage::Stage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A failure recorded during a cycle. `match_id` is `None` for failures that
/// are not tied to one match (an odds source outage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFailure {
    pub match_id: Option<String>,
    pub stage: Stage,
    pub reason: String,
}

/// Outcome of one `run_cycle` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Matches returned by the odds source.
    pub fetched: usize,
    /// Previously unseen matches among `fetched`.
    pub new_matches: usize,
    /// Snapshots appended.
    pub snapshots: usize,
    /// Recommendations newly generated and stored.
    pub analyzed: usize,
    /// Recommendations confirmed delivered (new and retried).
    pub delivered: usize,
    /// Of `delivered`, how many came from the retry phase.
    pub redelivered: usize,
    /// Matches moved to the abandoned state this cycle.
    pub abandoned: usize,
    /// Matches that kicked off before delivery and were moved to expired.
    #[serde(default)]
    pub expired: usize,
    pub failures: Vec<StageFailure>,
}

impl CycleSummary {
    pub fn start() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            fetched: 0,
            new_matches: 0,
            snapshots: 0,
            analyzed: 0,
            delivered: 0,
            redelivered: 0,
            abandoned: 0,
            expired: 0,
            failures: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn record_failure(&mut self, match_id: Option<&str>, stage: Stage, reason: impl Into<String>) {
        self.failures.push(StageFailure {
            match_id: match_id.map(String::from),
            stage,
            reason: reason.into(),
        });
    }

    pub fn failed_at(&self, stage: Stage) -> usize {
        self.failures.iter().filter(|f| f.stage == stage).count()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}
