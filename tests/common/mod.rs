//! Shared test helpers: scripted collaborators with call counters.

#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oddsagent::application::run_cycle::{Collaborators, CycleOptions, StageTimeouts};
use oddsagent::config::strategy::StrategyConfig;
use oddsagent::domain::entities::cycle_summary::CycleSummary;
use oddsagent::domain::entities::match_record::Match;
use oddsagent::domain::entities::odds_snapshot::OddsSnapshot;
use oddsagent::domain::entities::recommendation::{Recommendation, RecommendationContent};
use oddsagent::domain::error::DomainError;
use oddsagent::domain::ports::analysis_engine::AnalysisEngine;
use oddsagent::domain::ports::match_store::{MatchFilter, MatchOverview, MatchStore, PendingDelivery};
use oddsagent::domain::ports::notification_channel::{Notification, NotificationChannel};
use oddsagent::domain::ports::odds_source::{ObservedMatch, OddsSource};
use oddsagent::domain::ports::research_provider::{QualitativeReport, ResearchProvider};
use oddsagent::domain::values::lifecycle::{MatchStatus, RetryPolicy};
use oddsagent::domain::values::pick::{ConfidenceLevel, Pick};
use oddsagent::infrastructure::sqlite::match_store::SqliteMatchStore;
use oddsagent::OddsAgent;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CHAT: &str = "424242";

#[derive(Clone)]
pub struct Fixture {
    pub id: String,
    pub home: String,
    pub away: String,
    pub home_price: f64,
}

pub fn fixture(id: &str, home: &str, away: &str, home_price: f64) -> Fixture {
    Fixture {
        id: id.into(),
        home: home.into(),
        away: away.into(),
        home_price,
    }
}

pub fn make_match(id: &str, home: &str, away: &str) -> Match {
    make_match_starting(id, home, away, Utc::now() + ChronoDuration::days(3))
}

pub fn make_match_starting(id: &str, home: &str, away: &str, start: DateTime<Utc>) -> Match {
    Match::new(id.into(), "soccer_epl".into(), home.into(), away.into(), start)
}

pub fn draw_recommendation(match_id: &str) -> Recommendation {
    Recommendation::new(
        match_id.into(),
        RecommendationContent {
            pick: Pick::Draw,
            pick_text: "Draw".into(),
            confidence: ConfidenceLevel::Low,
            edge_reason: "Both sides rotate before Europe.".into(),
            key_factors: vec!["rotation".into()],
        },
        "No qualitative data available.".into(),
    )
}

/// Returns a fresh snapshot per fixture on every fetch.
#[derive(Default)]
pub struct FakeOdds {
    pub fixtures: Mutex<Vec<Fixture>>,
    pub failing: AtomicBool,
    /// Reject the API key instead of failing transiently.
    pub rejected_key: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeOdds {
    pub fn set_fixtures(&self, fixtures: Vec<Fixture>) {
        *self.fixtures.lock().unwrap() = fixtures;
    }
}

#[async_trait::async_trait]
impl OddsSource for FakeOdds {
    fn name(&self) -> &str {
        "fake-odds"
    }

    async fn fetch(&self, _leagues: &[String]) -> Result<Vec<ObservedMatch>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.rejected_key.load(Ordering::SeqCst) {
            return Err(DomainError::Config("The Odds API rejected the API key (401)".into()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::SourceUnavailable("503 Service Unavailable".into()));
        }
        let fixtures = self.fixtures.lock().unwrap().clone();
        Ok(fixtures
            .into_iter()
            .map(|f| {
                let record = make_match(&f.id, &f.home, &f.away);
                let snapshot = OddsSnapshot::h2h(
                    f.id.clone(),
                    Some("Unibet".into()),
                    Some(f.home_price),
                    Some(3.4),
                    Some(4.2),
                );
                ObservedMatch { record, snapshot }
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeResearch {
    pub empty: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ResearchProvider for FakeResearch {
    fn name(&self) -> &str {
        "fake-research"
    }

    async fn research(&self, record: &Match) -> QualitativeReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.empty.load(Ordering::SeqCst) {
            return QualitativeReport::Empty;
        }
        QualitativeReport::from_text(format!("{} have three players injured.", record.away_team))
    }
}

/// Records what each analysis saw. `failing` makes every call fail;
/// `malformed` returns content that does not validate.
#[derive(Default)]
pub struct FakeAnalysis {
    pub failing: AtomicBool,
    pub malformed: AtomicBool,
    pub calls: AtomicUsize,
    pub seen_contexts: Mutex<Vec<String>>,
    pub seen_history_len: Mutex<Vec<usize>>,
}

#[async_trait::async_trait]
impl AnalysisEngine for FakeAnalysis {
    fn name(&self) -> &str {
        "fake-analysis"
    }

    async fn analyze(
        &self,
        record: &Match,
        history: &[OddsSnapshot],
        report: &QualitativeReport,
        _strategy: &StrategyConfig,
    ) -> Result<RecommendationContent, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_contexts
            .lock()
            .unwrap()
            .push(report.as_context().to_string());
        self.seen_history_len.lock().unwrap().push(history.len());

        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::Analysis("model returned malformed JSON".into()));
        }
        let edge_reason = if self.malformed.load(Ordering::SeqCst) {
            String::new()
        } else {
            format!("{} are undervalued at home.", record.home_team)
        };
        Ok(RecommendationContent {
            pick: Pick::HomeWin,
            pick_text: format!("{} Win", record.home_team),
            confidence: ConfidenceLevel::Medium,
            edge_reason,
            key_factors: vec!["injuries".into(), "home form".into()],
        })
    }
}

#[derive(Default)]
pub struct FakeNotifier {
    pub failing: AtomicBool,
    /// Reject the bot token instead of failing transiently.
    pub rejected_token: AtomicBool,
    pub delay: Mutex<Option<Duration>>,
    pub attempts: AtomicUsize,
    pub sent: Mutex<Vec<(String, Notification)>>,
}

impl FakeNotifier {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl NotificationChannel for FakeNotifier {
    fn name(&self) -> &str {
        "fake-notifier"
    }

    async fn send(&self, destination: &str, notification: &Notification) -> Result<(), DomainError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.rejected_token.load(Ordering::SeqCst) {
            return Err(DomainError::Config("Telegram rejected the bot token (401)".into()));
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::Delivery("Telegram API error (code 502): Bad Gateway".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((destination.to_string(), notification.clone()));
        Ok(())
    }
}

/// SQLite store where another writer always saves a recommendation for the
/// match first, so the engine's own save hits `Conflict`.
pub struct CompetingStore {
    pub inner: SqliteMatchStore,
    pub competing_saves: AtomicUsize,
}

impl CompetingStore {
    pub fn in_memory() -> Self {
        Self {
            inner: SqliteMatchStore::open(":memory:").unwrap(),
            competing_saves: AtomicUsize::new(0),
        }
    }
}

impl MatchStore for CompetingStore {
    fn upsert_match(&self, record: &Match) -> Result<bool, DomainError> {
        self.inner.upsert_match(record)
    }
    fn append_snapshot(&self, snapshot: &OddsSnapshot) -> Result<(), DomainError> {
        self.inner.append_snapshot(snapshot)
    }
    fn odds_history(&self, match_id: &str) -> Result<Vec<OddsSnapshot>, DomainError> {
        self.inner.odds_history(match_id)
    }
    fn find_matches_needing_analysis(&self) -> Result<Vec<Match>, DomainError> {
        self.inner.find_matches_needing_analysis()
    }
    fn find_matches_pending_delivery(&self) -> Result<Vec<PendingDelivery>, DomainError> {
        self.inner.find_matches_pending_delivery()
    }
    fn save_recommendation(&self, recommendation: &Recommendation) -> Result<(), DomainError> {
        self.competing_saves.fetch_add(1, Ordering::SeqCst);
        self.inner
            .save_recommendation(&draw_recommendation(&recommendation.match_id))?;
        self.inner.save_recommendation(recommendation)
    }
    fn mark_delivered(&self, match_id: &str) -> Result<(), DomainError> {
        self.inner.mark_delivered(match_id)
    }
    fn mark_delivery_failed(&self, match_id: &str, reason: &str) -> Result<(), DomainError> {
        self.inner.mark_delivery_failed(match_id, reason)
    }
    fn record_analysis_failure(&self, match_id: &str, reason: &str) -> Result<u32, DomainError> {
        self.inner.record_analysis_failure(match_id, reason)
    }
    fn abandon_analysis(&self, match_id: &str) -> Result<(), DomainError> {
        self.inner.abandon_analysis(match_id)
    }
    fn expire_match(&self, match_id: &str) -> Result<(), DomainError> {
        self.inner.expire_match(match_id)
    }
    fn reset_match(&self, match_id: &str) -> Result<(), DomainError> {
        self.inner.reset_match(match_id)
    }
    fn get_match(&self, match_id: &str) -> Result<Option<Match>, DomainError> {
        self.inner.get_match(match_id)
    }
    fn get_recommendation(&self, match_id: &str) -> Result<Option<Recommendation>, DomainError> {
        self.inner.get_recommendation(match_id)
    }
    fn match_status(&self, match_id: &str) -> Result<MatchStatus, DomainError> {
        self.inner.match_status(match_id)
    }
    fn list_matches(&self, filter: &MatchFilter) -> Result<Vec<MatchOverview>, DomainError> {
        self.inner.list_matches(filter)
    }
    fn record_cycle(&self, summary: &CycleSummary) -> Result<(), DomainError> {
        self.inner.record_cycle(summary)
    }
    fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleSummary>, DomainError> {
        self.inner.recent_cycles(limit)
    }
}

/// The fakes behind one agent, shared so tests can flip them between cycles.
#[derive(Clone, Default)]
pub struct Fakes {
    pub odds: Arc<FakeOdds>,
    pub research: Arc<FakeResearch>,
    pub analysis: Arc<FakeAnalysis>,
    pub notifier: Arc<FakeNotifier>,
}

impl Fakes {
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            odds: self.odds.clone(),
            research: self.research.clone(),
            analysis: self.analysis.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis.calls.load(Ordering::SeqCst)
    }
}

pub fn options(retry: RetryPolicy) -> CycleOptions {
    CycleOptions {
        leagues: vec!["soccer_epl".into()],
        destination: CHAT.into(),
        retry,
        timeouts: StageTimeouts {
            odds: Duration::from_secs(5),
            research: Duration::from_secs(5),
            analysis: Duration::from_secs(5),
            delivery: Duration::from_secs(5),
        },
    }
}

pub fn setup_at(db_path: &str, fakes: &Fakes, opts: CycleOptions) -> OddsAgent {
    OddsAgent::with_providers(db_path, fakes.collaborators(), StrategyConfig::default(), opts).unwrap()
}

pub fn setup(fakes: &Fakes) -> OddsAgent {
    setup_at(":memory:", fakes, options(RetryPolicy::unbounded()))
}
