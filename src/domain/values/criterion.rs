use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Research criteria a strategy can rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Injuries,
    Suspensions,
    RecentForm,
    HomeAwayForm,
    HeadToHead,
    Motivation,
    TeamNews,
    TacticalMatchup,
    OddsMovement,
}

impl Criterion {
    pub const ALL: [Criterion; 9] = [
        Criterion::Injuries,
        Criterion::Suspensions,
        Criterion::RecentForm,
        Criterion::HomeAwayForm,
        Criterion::HeadToHead,
        Criterion::Motivation,
        Criterion::TeamNews,
        Criterion::TacticalMatchup,
        Criterion::OddsMovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Injuries => "injuries",
            Criterion::Suspensions => "suspensions",
            Criterion::RecentForm => "recent_form",
            Criterion::HomeAwayForm => "home_away_form",
            Criterion::HeadToHead => "head_to_head",
            Criterion::Motivation => "motivation",
            Criterion::TeamNews => "team_news",
            Criterion::TacticalMatchup => "tactical_matchup",
            Criterion::OddsMovement => "odds_movement",
        }
    }

    /// Human-readable label used in prompts.
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Criterion {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        Criterion::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == key)
            .ok_or_else(|| format!("Unknown search criterion: {s}"))
    }
}
