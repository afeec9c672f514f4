pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

use crate::application::maintenance::MaintenanceUseCase;
use crate::application::run_cycle::{Collaborators, CycleOptions, WorkflowEngine};
use crate::application::status::{StatusReport, StatusUseCase};
use crate::config::settings::Settings;
use crate::config::strategy::StrategyConfig;
use crate::domain::entities::cycle_summary::CycleSummary;
use crate::domain::entities::odds_snapshot::OddsSnapshot;
use crate::domain::error::DomainError;
use crate::domain::ports::match_store::MatchStore;
use crate::domain::ports::research_provider::ResearchProvider;
use crate::domain::values::lifecycle::MatchStatus;
use crate::infrastructure::analysis::gemini::GeminiAnalysisEngine;
use crate::infrastructure::notify::telegram::TelegramNotifier;
use crate::infrastructure::odds::the_odds_api::TheOddsApiSource;
use crate::infrastructure::research::gemini_search::GeminiSearchResearch;
use crate::infrastructure::research::noop::NoopResearch;
use crate::infrastructure::sqlite::match_store::SqliteMatchStore;
use std::sync::Arc;

pub struct OddsAgent {
    store: Arc<dyn MatchStore>,
    engine: WorkflowEngine,
    status_uc: StatusUseCase,
    maintenance_uc: MaintenanceUseCase,
}

impl OddsAgent {
    /// Wires the production adapters from settings and loads the strategy file.
    pub fn new(settings: &Settings) -> Result<Self, DomainError> {
        let strategy =
            StrategyConfig::load_or_default(&settings.strategy_path, settings.strategy_path_explicit)?;

        let research: Arc<dyn ResearchProvider> = if settings.research_enabled {
            Arc::new(GeminiSearchResearch::new(
                settings.gemini_api_key.clone(),
                settings.gemini_search_model.clone(),
            ))
        } else {
            Arc::new(NoopResearch)
        };

        let collaborators = Collaborators {
            odds: Arc::new(TheOddsApiSource::new(settings.odds_api_key.clone())),
            research,
            analysis: Arc::new(GeminiAnalysisEngine::new(
                settings.gemini_api_key.clone(),
                settings.gemini_model.clone(),
            )),
            notifier: Arc::new(TelegramNotifier::new(settings.telegram_bot_token.clone())),
        };

        Self::with_providers(&settings.db_path, collaborators, strategy, settings.cycle_options())
    }

    pub fn with_providers(
        db_path: &str,
        collaborators: Collaborators,
        strategy: StrategyConfig,
        options: CycleOptions,
    ) -> Result<Self, DomainError> {
        let store: Arc<dyn MatchStore> = Arc::new(SqliteMatchStore::open(db_path)?);
        Ok(Self::with_store(store, collaborators, strategy, options))
    }

    /// Builds the agent over an already opened store.
    pub fn with_store(
        store: Arc<dyn MatchStore>,
        collaborators: Collaborators,
        strategy: StrategyConfig,
        options: CycleOptions,
    ) -> Self {
        Self {
            engine: WorkflowEngine::new(store.clone(), collaborators, Arc::new(strategy), options),
            status_uc: StatusUseCase::new(store.clone()),
            maintenance_uc: MaintenanceUseCase::new(store.clone()),
            store,
        }
    }

    pub async fn run_cycle(&self) -> Result<CycleSummary, DomainError> {
        self.engine.run_cycle().await
    }

    pub fn status(&self, status: Option<MatchStatus>, limit: Option<usize>) -> Result<StatusReport, DomainError> {
        self.status_uc.report(status, limit)
    }

    pub fn history(&self, match_id: &str) -> Result<Vec<OddsSnapshot>, DomainError> {
        self.status_uc.history(match_id)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<CycleSummary>, DomainError> {
        self.status_uc.recent_runs(limit)
    }

    pub fn reset(&self, match_id: &str) -> Result<MatchStatus, DomainError> {
        self.maintenance_uc.reset(match_id)
    }

    pub fn store(&self) -> Arc<dyn MatchStore> {
        self.store.clone()
    }
}
