use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Research,
    Analysis,
    Storage,
    Delivery,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "fetch"),
            Stage::Research => write!(f, "research"),
            Stage::Analysis => write!(f, "analysis"),
            Stage::Storage => write!(f, "storage"),
            Stage::Delivery => write!(f, "delivery"),
        }
    }
}
