use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sporting event tracked by the pipeline. Identity fields are written once
/// when the match is first observed and never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Provider-assigned identifier.
    pub id: String,
    /// Provider league key (e.g. `soccer_epl`).
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: DateTime<Utc>,
    pub first_seen_at: DateTime<Utc>,
}

impl Match {
    pub fn new(
        id: String,
        league: String,
        home_team: String,
        away_team: String,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            league,
            home_team,
            away_team,
            start_time,
            first_seen_at: Utc::now(),
        }
    }

    /// True once the start time is at or before `now`.
    pub fn has_kicked_off(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }

    pub fn title(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }
}
