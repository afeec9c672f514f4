//! Cycle-level behaviour of the workflow engine against in-memory stores.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use oddsagent::config::strategy::StrategyConfig;
use oddsagent::domain::entities::recommendation::{Recommendation, RecommendationContent};
use oddsagent::domain::error::DomainError;
use oddsagent::domain::ports::match_store::MatchStore;
use oddsagent::domain::ports::research_provider::NO_QUALITATIVE_DATA;
use oddsagent::domain::values::delivery_status::DeliveryStatus;
use oddsagent::domain::values::lifecycle::{MatchStatus, RetryPolicy};
use oddsagent::domain::values::pick::{ConfidenceLevel, Pick};
use oddsagent::domain::values::stage::Stage;
use oddsagent::OddsAgent;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_new_matches_are_analyzed_and_delivered() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![
        fixture("m1", "Arsenal", "Chelsea", 1.9),
        fixture("m2", "Everton", "Fulham", 2.4),
    ]);
    let agent = setup(&fakes);

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.fetched, 2);
    assert_eq!(summary.new_matches, 2);
    assert_eq!(summary.snapshots, 2);
    assert_eq!(summary.analyzed, 2);
    assert_eq!(summary.delivered, 2);
    assert_eq!(summary.redelivered, 0);
    assert!(summary.failures.is_empty());

    let sent = fakes.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(dest, _)| dest == CHAT));
    assert_eq!(sent[0].1.pick_text, "Arsenal Win");

    let store = agent.store();
    assert_eq!(store.match_status("m1").unwrap(), MatchStatus::Delivered);
    assert_eq!(store.match_status("m2").unwrap(), MatchStatus::Delivered);
}

#[tokio::test]
async fn test_rerunning_never_reanalyzes_or_resends() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    let agent = setup(&fakes);

    agent.run_cycle().await.unwrap();
    let second = agent.run_cycle().await.unwrap();
    let third = agent.run_cycle().await.unwrap();

    assert_eq!(fakes.analysis_calls(), 1);
    assert_eq!(fakes.notifier.sent_count(), 1);
    assert_eq!(second.new_matches, 0);
    assert_eq!(second.analyzed, 0);
    assert_eq!(third.delivered, 0);

    // Every fetch still appends a snapshot.
    assert_eq!(agent.history("m1").unwrap().len(), 3);
}

/// M1: analysis succeeds, delivery fails, the next cycle only retries delivery.
#[tokio::test]
async fn test_failed_delivery_is_retried_without_reanalysis() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("M1", "Arsenal", "Chelsea", 1.9)]);
    fakes.notifier.failing.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    let first = agent.run_cycle().await.unwrap();
    assert_eq!(first.analyzed, 1);
    assert_eq!(first.delivered, 0);
    assert_eq!(first.failed_at(Stage::Delivery), 1);
    assert_eq!(first.failures[0].match_id.as_deref(), Some("M1"));

    let store = agent.store();
    assert_eq!(store.match_status("M1").unwrap(), MatchStatus::Analyzed);
    let r1 = store.get_recommendation("M1").unwrap().unwrap();
    assert_eq!(r1.delivery_status, DeliveryStatus::Failed);
    assert!(r1.last_delivery_error.as_deref().unwrap().contains("Bad Gateway"));

    fakes.notifier.failing.store(false, Ordering::SeqCst);
    let second = agent.run_cycle().await.unwrap();
    assert_eq!(second.redelivered, 1);
    assert_eq!(second.delivered, 1);
    assert_eq!(second.analyzed, 0);
    assert_eq!(fakes.analysis_calls(), 1);

    assert_eq!(store.match_status("M1").unwrap(), MatchStatus::Delivered);
    let delivered = store.get_recommendation("M1").unwrap().unwrap();
    assert_eq!(delivered.content, r1.content);
    assert!(delivered.delivered_at.is_some());
    assert_eq!(delivered.last_delivery_error, None);

    let sent = fakes.notifier.sent.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].1.pick_text, r1.content.pick_text);
    assert_eq!(sent[0].1.edge_reason, r1.content.edge_reason);
}

#[tokio::test]
async fn test_delivery_keeps_retrying_until_it_succeeds() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    fakes.notifier.failing.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    for _ in 0..3 {
        agent.run_cycle().await.unwrap();
    }
    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 3);

    fakes.notifier.failing.store(false, Ordering::SeqCst);
    agent.run_cycle().await.unwrap();
    agent.run_cycle().await.unwrap();

    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 4);
    assert_eq!(fakes.notifier.sent_count(), 1);
    assert_eq!(fakes.analysis_calls(), 1);
}

/// A recommendation stored right before a crash is delivered exactly once on
/// the next cycle, with no new analysis.
#[tokio::test]
async fn test_stored_but_unsent_recommendation_is_delivered_after_restart() {
    let fakes = Fakes::default();
    let agent = setup(&fakes);
    let store = agent.store();

    store.upsert_match(&make_match("m1", "Arsenal", "Chelsea")).unwrap();
    store
        .save_recommendation(&Recommendation::new(
            "m1".into(),
            RecommendationContent {
                pick: Pick::Draw,
                pick_text: "Draw".into(),
                confidence: ConfidenceLevel::Low,
                edge_reason: "Both sides rotate before Europe.".into(),
                key_factors: vec!["rotation".into()],
            },
            NO_QUALITATIVE_DATA.into(),
        ))
        .unwrap();

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.redelivered, 1);
    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 1);
    assert_eq!(fakes.analysis_calls(), 0);
    assert_eq!(store.match_status("m1").unwrap(), MatchStatus::Delivered);
}

/// M2: no research data still produces a stored recommendation.
#[tokio::test]
async fn test_empty_research_still_produces_recommendation() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("M2", "Everton", "Fulham", 2.4)]);
    fakes.research.empty.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    agent.run_cycle().await.unwrap();

    let seen = fakes.analysis.seen_contexts.lock().unwrap().clone();
    assert_eq!(seen, vec![NO_QUALITATIVE_DATA.to_string()]);

    let rec = agent.store().get_recommendation("M2").unwrap().unwrap();
    assert_eq!(rec.research_context, NO_QUALITATIVE_DATA);
    assert_ne!(agent.store().match_status("M2").unwrap(), MatchStatus::New);
}

#[tokio::test]
async fn test_research_timeout_degrades_to_empty_report() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    *fakes.research.delay.lock().unwrap() = Some(Duration::from_secs(3));
    let mut opts = options(RetryPolicy::unbounded());
    opts.timeouts.research = Duration::from_millis(50);
    let agent = setup_at(":memory:", &fakes, opts);

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.analyzed, 1);
    let seen = fakes.analysis.seen_contexts.lock().unwrap().clone();
    assert_eq!(seen, vec![NO_QUALITATIVE_DATA.to_string()]);
}

#[tokio::test]
async fn test_analysis_failure_leaves_match_new_and_annotated() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    fakes.analysis.failing.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    let first = agent.run_cycle().await.unwrap();
    assert_eq!(first.analyzed, 0);
    assert_eq!(first.failed_at(Stage::Analysis), 1);
    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 0);

    let store = agent.store();
    assert_eq!(store.match_status("m1").unwrap(), MatchStatus::New);
    assert!(store.get_recommendation("m1").unwrap().is_none());

    let report = agent.status(None, None).unwrap();
    assert_eq!(report.counts.new, 1);
    assert_eq!(report.matches[0].analysis_attempts, 1);
    assert!(report.matches[0]
        .last_error
        .as_deref()
        .unwrap()
        .contains("malformed JSON"));

    fakes.analysis.failing.store(false, Ordering::SeqCst);
    let second = agent.run_cycle().await.unwrap();
    assert_eq!(second.analyzed, 1);
    assert_eq!(second.delivered, 1);
    assert_eq!(fakes.analysis_calls(), 2);
}

#[tokio::test]
async fn test_invalid_analysis_content_is_not_persisted() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    fakes.analysis.malformed.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.failed_at(Stage::Analysis), 1);
    assert!(agent.store().get_recommendation("m1").unwrap().is_none());
    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bounded_retry_abandons_match() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    fakes.analysis.failing.store(true, Ordering::SeqCst);
    let agent = setup_at(":memory:", &fakes, options(RetryPolicy::bounded(2)));

    let first = agent.run_cycle().await.unwrap();
    assert_eq!(first.abandoned, 0);
    let second = agent.run_cycle().await.unwrap();
    assert_eq!(second.abandoned, 1);
    agent.run_cycle().await.unwrap();

    assert_eq!(fakes.analysis_calls(), 2);
    assert_eq!(agent.store().match_status("m1").unwrap(), MatchStatus::Abandoned);

    let report = agent.status(Some(MatchStatus::Abandoned), None).unwrap();
    assert_eq!(report.counts.abandoned, 1);
    assert_eq!(report.matches.len(), 1);
    assert_eq!(report.matches[0].analysis_attempts, 2);
}

#[tokio::test]
async fn test_unbounded_retry_never_abandons() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    fakes.analysis.failing.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    for _ in 0..5 {
        agent.run_cycle().await.unwrap();
    }
    assert_eq!(fakes.analysis_calls(), 5);
    assert_eq!(agent.store().match_status("m1").unwrap(), MatchStatus::New);
}

#[tokio::test]
async fn test_odds_outage_is_recorded_and_not_fatal() {
    let fakes = Fakes::default();
    let agent = setup(&fakes);
    agent
        .store()
        .upsert_match(&make_match("m1", "Arsenal", "Chelsea"))
        .unwrap();
    fakes.odds.failing.store(true, Ordering::SeqCst);

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.fetched, 0);
    assert_eq!(summary.failed_at(Stage::Fetch), 1);
    assert_eq!(summary.failures[0].match_id, None);

    // Matches already known are still analyzed, with an empty odds history.
    assert_eq!(summary.analyzed, 1);
    assert_eq!(*fakes.analysis.seen_history_len.lock().unwrap(), vec![0]);
}

#[tokio::test]
async fn test_delivery_timeout_counts_as_delivery_failure() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    *fakes.notifier.delay.lock().unwrap() = Some(Duration::from_secs(3));
    let mut opts = options(RetryPolicy::unbounded());
    opts.timeouts.delivery = Duration::from_millis(50);
    let agent = setup_at(":memory:", &fakes, opts);

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.analyzed, 1);
    assert_eq!(summary.failed_at(Stage::Delivery), 1);
    assert!(summary.failures[0].reason.contains("timed out"));
    assert_eq!(agent.store().match_status("m1").unwrap(), MatchStatus::Analyzed);
}

#[tokio::test]
async fn test_analysis_sees_full_odds_history() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    fakes.analysis.failing.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    agent.run_cycle().await.unwrap();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.75)]);
    fakes.analysis.failing.store(false, Ordering::SeqCst);
    agent.run_cycle().await.unwrap();

    assert_eq!(*fakes.analysis.seen_history_len.lock().unwrap(), vec![1, 2]);
    let history = agent.history("m1").unwrap();
    assert_eq!(history[0].price_for("home"), Some(1.9));
    assert_eq!(history[1].price_for("home"), Some(1.75));
}

#[tokio::test]
async fn test_cycle_runs_are_recorded() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    let agent = setup(&fakes);

    let first = agent.run_cycle().await.unwrap();
    let second = agent.run_cycle().await.unwrap();

    let runs = agent.recent_runs(10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].id, second.id);
    assert_eq!(runs[1].id, first.id);
    assert_eq!(runs[1].analyzed, 1);
    assert!(runs[0].finished_at.is_some());
}

#[tokio::test]
async fn test_disabled_research_analyzes_on_odds_alone() {
    use oddsagent::infrastructure::research::noop::NoopResearch;

    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    let mut collaborators = fakes.collaborators();
    collaborators.research = Arc::new(NoopResearch);
    let agent = OddsAgent::with_providers(
        ":memory:",
        collaborators,
        StrategyConfig::default(),
        options(RetryPolicy::unbounded()),
    )
    .unwrap();

    agent.run_cycle().await.unwrap();
    assert_eq!(fakes.research.calls.load(Ordering::SeqCst), 0);
    let seen = fakes.analysis.seen_contexts.lock().unwrap().clone();
    assert_eq!(seen, vec![NO_QUALITATIVE_DATA.to_string()]);
}

#[tokio::test]
async fn test_match_past_kickoff_is_expired_not_analyzed() {
    let fakes = Fakes::default();
    let agent = setup(&fakes);
    let store = agent.store();
    let kicked_off = Utc::now() - ChronoDuration::days(10);
    store
        .upsert_match(&make_match_starting("old", "Arsenal", "Chelsea", kicked_off))
        .unwrap();

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.expired, 1);
    assert_eq!(summary.analyzed, 0);
    assert_eq!(summary.delivered, 0);
    assert_eq!(fakes.analysis_calls(), 0);
    assert_eq!(fakes.research.calls.load(Ordering::SeqCst), 0);
    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(store.match_status("old").unwrap(), MatchStatus::Expired);

    let report = agent.status(Some(MatchStatus::Expired), None).unwrap();
    assert_eq!(report.counts.expired, 1);
    assert_eq!(report.matches[0].record.id, "old");

    // Expiry is counted once.
    let again = agent.run_cycle().await.unwrap();
    assert_eq!(again.expired, 0);
    assert_eq!(agent.recent_runs(1).unwrap()[0].expired, 0);
    assert_eq!(agent.recent_runs(2).unwrap()[1].expired, 1);
}

#[tokio::test]
async fn test_undelivered_recommendation_expires_at_kickoff() {
    let fakes = Fakes::default();
    let agent = setup(&fakes);
    let store = agent.store();
    let kicked_off = Utc::now() - ChronoDuration::minutes(5);
    store
        .upsert_match(&make_match_starting("m1", "Arsenal", "Chelsea", kicked_off))
        .unwrap();
    store.save_recommendation(&draw_recommendation("m1")).unwrap();
    store.mark_delivery_failed("m1", "Bad Gateway").unwrap();

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.expired, 1);
    assert_eq!(summary.redelivered, 0);
    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 0);
    assert_eq!(store.match_status("m1").unwrap(), MatchStatus::Expired);
    // The stored recommendation is kept for the record.
    assert!(store.get_recommendation("m1").unwrap().is_some());
    assert!(store.find_matches_pending_delivery().unwrap().is_empty());
}

#[tokio::test]
async fn test_conflicting_save_is_recorded_and_nothing_is_sent() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    let store = Arc::new(CompetingStore::in_memory());
    let agent = OddsAgent::with_store(
        store.clone(),
        fakes.collaborators(),
        StrategyConfig::default(),
        options(RetryPolicy::unbounded()),
    );

    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(store.competing_saves.load(Ordering::SeqCst), 1);
    assert_eq!(summary.analyzed, 0);
    assert_eq!(summary.delivered, 0);
    assert_eq!(summary.failed_at(Stage::Storage), 1);
    assert_eq!(summary.failures[0].match_id.as_deref(), Some("m1"));
    assert!(summary.failures[0].reason.contains("already exists"));
    assert_eq!(fakes.notifier.attempts.load(Ordering::SeqCst), 0);

    // The first writer's recommendation is the one kept.
    let kept = store.get_recommendation("m1").unwrap().unwrap();
    assert_eq!(kept.content.pick, Pick::Draw);
    assert_eq!(store.match_status("m1").unwrap(), MatchStatus::Analyzed);
}

#[tokio::test]
async fn test_rejected_bot_token_aborts_cycle_and_keeps_recommendation_pending() {
    let fakes = Fakes::default();
    fakes.odds.set_fixtures(vec![fixture("m1", "Arsenal", "Chelsea", 1.9)]);
    fakes.notifier.rejected_token.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);

    let err = agent.run_cycle().await.unwrap_err();
    assert!(matches!(err, DomainError::Config(ref m) if m.contains("bot token")));

    let store = agent.store();
    assert_eq!(store.match_status("m1").unwrap(), MatchStatus::Analyzed);
    let pending = store.find_matches_pending_delivery().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].recommendation.content.pick_text, "Arsenal Win");

    fakes.notifier.rejected_token.store(false, Ordering::SeqCst);
    let summary = agent.run_cycle().await.unwrap();
    assert_eq!(summary.redelivered, 1);
    assert_eq!(fakes.analysis_calls(), 1);
}

#[tokio::test]
async fn test_rejected_odds_key_aborts_cycle() {
    let fakes = Fakes::default();
    fakes.odds.rejected_key.store(true, Ordering::SeqCst);
    let agent = setup(&fakes);
    agent
        .store()
        .upsert_match(&make_match("m1", "Arsenal", "Chelsea"))
        .unwrap();

    let err = agent.run_cycle().await.unwrap_err();
    assert!(matches!(err, DomainError::Config(_)));
    assert_eq!(fakes.analysis_calls(), 0);
    assert!(agent.recent_runs(10).unwrap().is_empty());
}
