use crate::application::run_cycle::{CycleOptions, StageTimeouts};
use crate::domain::error::DomainError;
use crate::domain::values::lifecycle::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DB_PATH: &str = "./oddsagent.db";
pub const DEFAULT_LEAGUES: &str = "soccer_epl,soccer_spain_la_liga";
pub const DEFAULT_STRATEGY_PATH: &str = "config.json";

/// Process-wide settings, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub odds_api_key: String,
    pub gemini_api_key: String,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub db_path: String,
    pub leagues: Vec<String>,
    pub strategy_path: PathBuf,
    /// Whether `strategy_path` came from the environment rather than the default.
    pub strategy_path_explicit: bool,
    pub max_analysis_attempts: Option<u32>,
    pub timeouts: StageTimeouts,
    pub gemini_model: Option<String>,
    pub gemini_search_model: Option<String>,
    /// `ODDSAGENT_RESEARCH=off` analyzes on odds alone.
    pub research_enabled: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, DomainError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| DomainError::Config(format!("{key} not set")))
        };

        let leagues: Vec<String> = get("ODDSAGENT_LEAGUES")
            .unwrap_or_else(|| DEFAULT_LEAGUES.to_string())
            .split(',')
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if leagues.is_empty() {
            return Err(DomainError::Config("ODDSAGENT_LEAGUES lists no leagues".into()));
        }

        let strategy_env = get("ODDSAGENT_STRATEGY");
        let max_analysis_attempts = match get("ODDSAGENT_MAX_ANALYSIS_ATTEMPTS") {
            Some(raw) => {
                let n: u32 = raw.trim().parse().map_err(|_| {
                    DomainError::Config(format!(
                        "ODDSAGENT_MAX_ANALYSIS_ATTEMPTS must be a positive integer, got '{raw}'"
                    ))
                })?;
                if n == 0 {
                    return Err(DomainError::Config(
                        "ODDSAGENT_MAX_ANALYSIS_ATTEMPTS must be at least 1".into(),
                    ));
                }
                Some(n)
            }
            None => None,
        };

        let defaults = StageTimeouts::default();
        let timeout = |key: &str, fallback: Duration| -> Result<Duration, DomainError> {
            match get(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or_else(|| {
                        DomainError::Config(format!("{key} must be a positive number of seconds, got '{raw}'"))
                    }),
                None => Ok(fallback),
            }
        };
        let timeouts = StageTimeouts {
            odds: timeout("ODDSAGENT_ODDS_TIMEOUT_SECS", defaults.odds)?,
            research: timeout("ODDSAGENT_RESEARCH_TIMEOUT_SECS", defaults.research)?,
            analysis: timeout("ODDSAGENT_ANALYSIS_TIMEOUT_SECS", defaults.analysis)?,
            delivery: timeout("ODDSAGENT_DELIVERY_TIMEOUT_SECS", defaults.delivery)?,
        };

        Ok(Self {
            odds_api_key: required("ODDS_API_KEY")?,
            gemini_api_key: required("GEMINI_API_KEY")?,
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            telegram_chat_id: required("TELEGRAM_DEFAULT_CHAT_ID")?,
            db_path: get("ODDSAGENT_DB").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            leagues,
            strategy_path_explicit: strategy_env.is_some(),
            strategy_path: PathBuf::from(
                strategy_env.unwrap_or_else(|| DEFAULT_STRATEGY_PATH.to_string()),
            ),
            max_analysis_attempts,
            timeouts,
            gemini_model: get("GEMINI_MODEL"),
            gemini_search_model: get("GEMINI_SEARCH_MODEL"),
            research_enabled: !matches!(
                get("ODDSAGENT_RESEARCH").map(|v| v.trim().to_lowercase()).as_deref(),
                Some("off" | "false" | "0")
            ),
        })
    }

    /// Database path alone, for commands that never call external services.
    pub fn db_path_from_env() -> String {
        std::env::var("ODDSAGENT_DB")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
    }

    /// Strategy path alone, and whether it was set explicitly.
    pub fn strategy_path_from_env() -> (PathBuf, bool) {
        match std::env::var("ODDSAGENT_STRATEGY").ok().filter(|v| !v.trim().is_empty()) {
            Some(path) => (PathBuf::from(path), true),
            None => (PathBuf::from(DEFAULT_STRATEGY_PATH), false),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match self.max_analysis_attempts {
            Some(n) => RetryPolicy::bounded(n),
            None => RetryPolicy::unbounded(),
        }
    }

    pub fn cycle_options(&self) -> CycleOptions {
        CycleOptions {
            leagues: self.leagues.clone(),
            destination: self.telegram_chat_id.clone(),
            retry: self.retry_policy(),
            timeouts: self.timeouts,
        }
    }
}
