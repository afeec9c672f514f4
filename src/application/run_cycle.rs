//! The workflow engine: one `run_cycle` drives every match through
//! `NEW -> ANALYZED -> DELIVERED`.
//!
//! A cycle runs three phases in order:
//!
//! 1. **Retry**: resend every stored but undelivered recommendation, using the
//!    stored content as-is.
//! 2. **Ingest**: fetch odds once for the configured leagues, upsert matches and
//!    append snapshots.
//! 3. **Analyze**: for every match without a recommendation, research, analyze,
//!    store the recommendation, then deliver it.
//!
//! Matches that kick off before their recommendation is delivered are moved to
//! `EXPIRED` instead of being analyzed or sent.
//!
//! The recommendation is always persisted before delivery is attempted, so a
//! cycle killed at any point leaves each match in a resumable state. Failures
//! of external calls are recorded on the match and in the summary; only config
//! and storage-unavailable errors end the cycle early.

use crate::config::strategy::StrategyConfig;
use crate::domain::entities::cycle_summary::CycleSummary;
use crate::domain::entities::match_record::Match;
use crate::domain::entities::recommendation::Recommendation;
use crate::domain::error::DomainError;
use crate::domain::ports::analysis_engine::AnalysisEngine;
use crate::domain::ports::match_store::MatchStore;
use crate::domain::ports::notification_channel::{Notification, NotificationChannel};
use crate::domain::ports::odds_source::{ObservedMatch, OddsSource};
use crate::domain::ports::research_provider::{QualitativeReport, ResearchProvider};
use crate::domain::values::lifecycle::{LifecycleEvent, MatchStatus, RetryPolicy};
use crate::domain::values::stage::Stage;
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Independent timeout per external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub odds: Duration,
    pub research: Duration,
    pub analysis: Duration,
    pub delivery: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            odds: Duration::from_secs(20),
            research: Duration::from_secs(60),
            analysis: Duration::from_secs(90),
            delivery: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleOptions {
    /// League keys passed to the odds source.
    pub leagues: Vec<String>,
    /// Notification destination (chat id or `@username`).
    pub destination: String,
    pub retry: RetryPolicy,
    pub timeouts: StageTimeouts,
}

/// External collaborators the engine orchestrates.
#[derive(Clone)]
pub struct Collaborators {
    pub odds: Arc<dyn OddsSource>,
    pub research: Arc<dyn ResearchProvider>,
    pub analysis: Arc<dyn AnalysisEngine>,
    pub notifier: Arc<dyn NotificationChannel>,
}

pub struct WorkflowEngine {
    store: Arc<dyn MatchStore>,
    collaborators: Collaborators,
    strategy: Arc<StrategyConfig>,
    options: CycleOptions,
}

impl WorkflowEngine {
    pub fn new(
        store: Arc<dyn MatchStore>,
        collaborators: Collaborators,
        strategy: Arc<StrategyConfig>,
        options: CycleOptions,
    ) -> Self {
        Self {
            store,
            collaborators,
            strategy,
            options,
        }
    }

    pub fn options(&self) -> &CycleOptions {
        &self.options
    }

    /// Runs one full cycle. Per-match failures end up in the returned summary;
    /// an `Err` means the store (or config) is unusable.
    pub async fn run_cycle(&self) -> Result<CycleSummary, DomainError> {
        let mut summary = CycleSummary::start();
        info!(cycle_id = %summary.id, leagues = ?self.options.leagues, "cycle started");

        self.retry_deliveries(&mut summary).await?;
        self.ingest(&mut summary).await?;
        self.analyze_new_matches(&mut summary).await?;

        summary.finish();
        if let Err(e) = self.store.record_cycle(&summary) {
            warn!(cycle_id = %summary.id, error = %e, "failed to persist cycle summary");
        }

        info!(
            cycle_id = %summary.id,
            fetched = summary.fetched,
            new_matches = summary.new_matches,
            analyzed = summary.analyzed,
            delivered = summary.delivered,
            expired = summary.expired,
            failed = summary.failed(),
            "cycle finished"
        );
        Ok(summary)
    }

    async fn retry_deliveries(&self, summary: &mut CycleSummary) -> Result<(), DomainError> {
        let pending = self.store.find_matches_pending_delivery()?;
        if !pending.is_empty() {
            info!(count = pending.len(), "retrying undelivered recommendations");
        }

        for item in pending {
            if self.expire_if_kicked_off(&item.record, MatchStatus::Analyzed, summary)? {
                continue;
            }
            if self
                .deliver(&item.record, &item.recommendation, summary)
                .await?
            {
                summary.delivered += 1;
                summary.redelivered += 1;
            }
        }
        Ok(())
    }

    async fn ingest(&self, summary: &mut CycleSummary) -> Result<(), DomainError> {
        let source = &self.collaborators.odds;
        let fetched = with_timeout(
            self.options.timeouts.odds,
            Stage::Fetch,
            source.fetch(&self.options.leagues),
        )
        .await;

        let observed = match fetched {
            Ok(observed) => observed,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(source = source.name(), stage = %Stage::Fetch, error = %e, "odds fetch failed");
                summary.record_failure(None, Stage::Fetch, e.to_string());
                return Ok(());
            }
        };

        summary.fetched = observed.len();
        for ObservedMatch { record, snapshot } in observed {
            match self.store.upsert_match(&record) {
                Ok(true) => {
                    summary.new_matches += 1;
                    debug!(match_id = %record.id, title = %record.title(), "new match discovered");
                }
                Ok(false) => {}
                Err(e) => {
                    self.absorb(summary, &record.id, Stage::Storage, e)?;
                    continue;
                }
            }

            match self.store.append_snapshot(&snapshot) {
                Ok(()) => summary.snapshots += 1,
                Err(e) => self.absorb(summary, &record.id, Stage::Storage, e)?,
            }
        }

        info!(
            fetched = summary.fetched,
            new_matches = summary.new_matches,
            snapshots = summary.snapshots,
            "odds ingested"
        );
        Ok(())
    }

    async fn analyze_new_matches(&self, summary: &mut CycleSummary) -> Result<(), DomainError> {
        let candidates = self.store.find_matches_needing_analysis()?;
        info!(count = candidates.len(), "matches needing analysis");

        for record in candidates {
            self.process_new_match(&record, summary).await?;
        }
        Ok(())
    }

    async fn process_new_match(&self, record: &Match, summary: &mut CycleSummary) -> Result<(), DomainError> {
        if self.expire_if_kicked_off(record, MatchStatus::New, summary)? {
            return Ok(());
        }
        let report = self.research(record).await;

        let history = match self.store.odds_history(&record.id) {
            Ok(history) => history,
            Err(e) => return self.absorb(summary, &record.id, Stage::Storage, e),
        };

        let analysis = &self.collaborators.analysis;
        let analyzed = with_timeout(
            self.options.timeouts.analysis,
            Stage::Analysis,
            analysis.analyze(record, &history, &report, &self.strategy),
        )
        .await
        .and_then(|content| content.validate().map(|_| content));

        let content = match analyzed {
            Ok(content) => content,
            Err(e) => return self.handle_analysis_failure(record, e, summary),
        };

        let recommendation = Recommendation::new(
            record.id.clone(),
            content,
            report.as_context().to_string(),
        );
        if let Err(e) = self.store.save_recommendation(&recommendation) {
            return self.absorb(summary, &record.id, Stage::Storage, e);
        }
        summary.analyzed += 1;
        let Some(status) = self.advance(
            summary,
            &record.id,
            Stage::Analysis,
            MatchStatus::New,
            LifecycleEvent::AnalysisSucceeded,
        )?
        else {
            return Ok(());
        };
        info!(
            match_id = %record.id,
            status = %status,
            pick = %recommendation.content.pick,
            confidence = %recommendation.content.confidence,
            "recommendation stored"
        );

        if self.deliver(record, &recommendation, summary).await? {
            summary.delivered += 1;
        }
        Ok(())
    }

    /// Research never blocks the pipeline: a timeout degrades to an empty report.
    async fn research(&self, record: &Match) -> QualitativeReport {
        let provider = &self.collaborators.research;
        let report = match tokio::time::timeout(
            self.options.timeouts.research,
            provider.research(record),
        )
        .await
        {
            Ok(report) => report,
            Err(_) => {
                warn!(
                    match_id = %record.id,
                    stage = %Stage::Research,
                    timeout_secs = self.options.timeouts.research.as_secs_f64(),
                    "research timed out, continuing without qualitative data"
                );
                QualitativeReport::Empty
            }
        };

        if report.is_empty() {
            debug!(match_id = %record.id, "no qualitative data available");
        }
        report
    }

    fn handle_analysis_failure(
        &self,
        record: &Match,
        err: DomainError,
        summary: &mut CycleSummary,
    ) -> Result<(), DomainError> {
        let reason = err.to_string();
        self.absorb(summary, &record.id, Stage::Analysis, err)?;

        let attempts = match self.store.record_analysis_failure(&record.id, &reason) {
            Ok(attempts) => attempts,
            Err(e) => return self.absorb(summary, &record.id, Stage::Storage, e),
        };

        let next = self.advance(
            summary,
            &record.id,
            Stage::Analysis,
            MatchStatus::New,
            LifecycleEvent::AnalysisFailed { attempts },
        )?;
        if next == Some(MatchStatus::Abandoned) {
            match self.store.abandon_analysis(&record.id) {
                Ok(()) => {
                    summary.abandoned += 1;
                    warn!(match_id = %record.id, attempts, "analysis retries exhausted, match abandoned");
                }
                Err(e) => self.absorb(summary, &record.id, Stage::Storage, e)?,
            }
        }
        Ok(())
    }

    /// Sends a stored recommendation and records the outcome. Returns whether
    /// delivery was confirmed.
    async fn deliver(
        &self,
        record: &Match,
        recommendation: &Recommendation,
        summary: &mut CycleSummary,
    ) -> Result<bool, DomainError> {
        let notification = Notification::new(record, recommendation);
        let sent = with_timeout(
            self.options.timeouts.delivery,
            Stage::Delivery,
            self.collaborators
                .notifier
                .send(&self.options.destination, &notification),
        )
        .await;

        match sent {
            Ok(()) => {
                let next = self.advance(
                    summary,
                    &record.id,
                    Stage::Delivery,
                    MatchStatus::Analyzed,
                    LifecycleEvent::DeliverySucceeded,
                )?;
                if next != Some(MatchStatus::Delivered) {
                    return Ok(false);
                }
                match self.store.mark_delivered(&record.id) {
                    Ok(()) => {
                        info!(match_id = %record.id, "recommendation delivered");
                        Ok(true)
                    }
                    Err(e) => {
                        self.absorb(summary, &record.id, Stage::Storage, e)?;
                        Ok(false)
                    }
                }
            }
            Err(e) => {
                self.advance(
                    summary,
                    &record.id,
                    Stage::Delivery,
                    MatchStatus::Analyzed,
                    LifecycleEvent::DeliveryFailed,
                )?;
                let reason = e.to_string();
                if let Err(store_err) = self.store.mark_delivery_failed(&record.id, &reason) {
                    self.absorb(summary, &record.id, Stage::Storage, store_err)?;
                }
                self.absorb(summary, &record.id, Stage::Delivery, e)?;
                Ok(false)
            }
        }
    }

    /// Moves a match that has already started to `EXPIRED`. Returns whether the
    /// match is past kickoff and must not be analyzed or sent.
    fn expire_if_kicked_off(
        &self,
        record: &Match,
        status: MatchStatus,
        summary: &mut CycleSummary,
    ) -> Result<bool, DomainError> {
        if !record.has_kicked_off(Utc::now()) {
            return Ok(false);
        }
        let next = self.advance(summary, &record.id, Stage::Storage, status, LifecycleEvent::KickedOff)?;
        if next == Some(MatchStatus::Expired) {
            match self.store.expire_match(&record.id) {
                Ok(()) => {
                    summary.expired += 1;
                    warn!(
                        match_id = %record.id,
                        start_time = %record.start_time,
                        from = %status,
                        "match kicked off before delivery, expired"
                    );
                }
                Err(e) => self.absorb(summary, &record.id, Stage::Storage, e)?,
            }
        }
        Ok(true)
    }

    /// Applies a lifecycle event. An impossible transition is recorded as a
    /// failure of `stage` and yields `None`.
    fn advance(
        &self,
        summary: &mut CycleSummary,
        match_id: &str,
        stage: Stage,
        from: MatchStatus,
        event: LifecycleEvent,
    ) -> Result<Option<MatchStatus>, DomainError> {
        match from.apply(event, &self.options.retry) {
            Ok(next) => {
                debug!(match_id, from = %from, to = %next, ?event, "lifecycle transition");
                Ok(Some(next))
            }
            Err(e) => self.absorb(summary, match_id, stage, e).map(|()| None),
        }
    }

    /// Records a per-match failure, or hands back errors that must end the cycle.
    fn absorb(
        &self,
        summary: &mut CycleSummary,
        match_id: &str,
        stage: Stage,
        err: DomainError,
    ) -> Result<(), DomainError> {
        if err.is_fatal() {
            error!(match_id, stage = %stage, error = %err, "fatal error, aborting cycle");
            return Err(err);
        }
        if err.is_invariant_violation() {
            error!(match_id, stage = %stage, error = %err, "storage invariant violated");
        } else {
            warn!(match_id, stage = %stage, error = %err, "stage failed");
        }
        summary.record_failure(Some(match_id), stage, err.to_string());
        Ok(())
    }
}

async fn with_timeout<T, F>(limit: Duration, stage: Stage, fut: F) -> Result<T, DomainError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(timeout_error(stage, limit)),
    }
}

/// A timeout counts as a provider error of the stage it happened in.
fn timeout_error(stage: Stage, limit: Duration) -> DomainError {
    let msg = format!("{stage} timed out after {}s", limit.as_secs_f64());
    match stage {
        Stage::Fetch => DomainError::SourceUnavailable(msg),
        Stage::Analysis | Stage::Research => DomainError::Analysis(msg),
        Stage::Delivery => DomainError::Delivery(msg),
        Stage::Storage => DomainError::Database(msg),
    }
}
