use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Odds source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Analysis failed: {0}")]
    Analysis(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl DomainError {
    /// Storage invariant violations. These abort the current operation for one
    /// match but never the whole cycle.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, DomainError::Conflict(_) | DomainError::NotFound(_))
    }

    /// Errors that must terminate a run instead of being recorded per match.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::Config(_) | DomainError::Database(_))
    }
}

impl From<rusqlite::Error> for DomainError {
    fn from(e: rusqlite::Error) -> Self {
        DomainError::Database(e.to_string())
    }
}
