//! Analysis strategy: persona, ranked research priorities and free-text
//! instructions, loaded from a JSON file once per run.
//!
//! ```json
//! {
//!   "analysis_persona": "You are a sharp football betting analyst.",
//!   "search_priorities": { "injuries": 1, "recent_form": 2, "head_to_head": 3 },
//!   "instructions": "Prefer value over favourites."
//! }
//! ```
//!
//! Ranks start at 1 (highest) and must be unique. Unknown criteria are
//! rejected at load time.

use crate::domain::error::DomainError;
use crate::domain::values::criterion::Criterion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const DEFAULT_PERSONA: &str = "You are a sports betting analyst.";
pub const DEFAULT_INSTRUCTIONS: &str = "Generate a JSON object.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Priority {
    pub criterion: Criterion,
    pub rank: u32,
}

/// Immutable, validated strategy. Fields are only reachable through getters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyConfig {
    persona: String,
    priorities: Vec<Priority>,
    instructions: String,
}

#[derive(Debug, Deserialize)]
struct RawStrategy {
    #[serde(default)]
    analysis_persona: Option<String>,
    #[serde(default)]
    search_priorities: BTreeMap<String, i64>,
    #[serde(default)]
    instructions: Option<String>,
}

impl StrategyConfig {
    /// Validates and builds a strategy. Blank persona or instructions fall back
    /// to the defaults.
    pub fn new<I>(persona: &str, priorities: I, instructions: &str) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = (String, i64)>,
    {
        let mut by_rank: HashMap<u32, Criterion> = HashMap::new();
        let mut ranked = Vec::new();

        for (name, rank) in priorities {
            let criterion: Criterion = name.parse().map_err(DomainError::Config)?;
            if rank < 1 || rank > u32::MAX as i64 {
                return Err(DomainError::Config(format!(
                    "priority rank for '{name}' must be a positive integer, got {rank}"
                )));
            }
            let rank = rank as u32;
            if let Some(existing) = by_rank.insert(rank, criterion) {
                return Err(DomainError::Config(format!(
                    "duplicate priority rank {rank} for '{existing}' and '{criterion}'"
                )));
            }
            ranked.push(Priority { criterion, rank });
        }
        ranked.sort_by_key(|p| p.rank);

        Ok(Self {
            persona: non_blank_or(persona, DEFAULT_PERSONA),
            priorities: ranked,
            instructions: non_blank_or(instructions, DEFAULT_INSTRUCTIONS),
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, DomainError> {
        let raw: RawStrategy = serde_json::from_str(json)
            .map_err(|e| DomainError::Config(format!("invalid strategy config: {e}")))?;
        Self::new(
            raw.analysis_persona.as_deref().unwrap_or_default(),
            raw.search_priorities,
            raw.instructions.as_deref().unwrap_or_default(),
        )
    }

    pub fn load(path: &Path) -> Result<Self, DomainError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DomainError::Config(format!("cannot read strategy config {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Loads `path`, or falls back to defaults when the file is absent and the
    /// path was not explicitly configured.
    pub fn load_or_default(path: &Path, explicit: bool) -> Result<Self, DomainError> {
        if !explicit && !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "strategy config not found, using default persona and instructions"
            );
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    /// Priorities ordered by rank, highest (rank 1) first.
    pub fn priorities(&self) -> &[Priority] {
        &self.priorities
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn ranked_criteria(&self) -> Vec<Criterion> {
        self.priorities.iter().map(|p| p.criterion).collect()
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
            priorities: Vec::new(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

fn non_blank_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
