//! End-to-end cycle tests over a realistic MLB slate.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;

use oddswatch::engine::cycle::{run_cycle, CycleRunner};
use oddswatch::engine::normalizer::NormalizerConfig;
use oddswatch::storage::OddsStore;
use oddswatch::strategy::edge::DetectionConfig;
use oddswatch::types::{MarketType, QuoteSide};

use crate::mock_provider::{slate, MockProvider};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 20, 0, 0).unwrap()
}

fn runner() -> CycleRunner {
    CycleRunner::new(NormalizerConfig::default(), DetectionConfig::default())
}

#[tokio::test]
async fn test_full_cycle_flags_soft_moneyline() {
    let provider = MockProvider::new(vec![slate()]);
    let store = OddsStore::in_memory().await.unwrap();

    let report = run_cycle(&provider, &store, &runner(), now()).await.unwrap();

    assert_eq!(report.events_seen, 4);
    assert_eq!(report.stale_events, 1);
    assert_eq!(report.malformed_events, 1);
    assert_eq!(report.quotes, 24);
    assert_eq!(report.skipped_quotes, 0);
    assert_eq!(report.quotes_persisted, 24);
    assert_eq!(report.mispricings, 1);
    assert_eq!(report.exposures, 2);

    let top = store.top_mispricings(5).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].home_team, "New York Yankees");
    assert_eq!(top[0].market_type, "h2h");
    assert_eq!(top[0].price_a, 150);
    assert_eq!(top[0].price_b, 120);
    assert_eq!(top[0].edge, 14.55);
}

#[test]
fn test_totals_detection_when_enabled() {
    let runner = CycleRunner::new(
        NormalizerConfig::default(),
        DetectionConfig {
            market_types: vec![MarketType::H2h, MarketType::Totals, MarketType::Spreads],
            ..DetectionConfig::default()
        },
    );
    let output = runner.process(&slate(), now());

    assert_eq!(output.mispricings.len(), 2);
    assert_eq!(output.mispricings[0].event_id, "nyy-bos");
    assert_eq!(output.mispricings[0].edge, 14.55);

    let totals = &output.mispricings[1];
    assert_eq!(totals.event_id, "lad-sf");
    assert_eq!(totals.market_type, MarketType::Totals);
    assert_eq!(totals.point, Some(dec!(8.5)));
    assert_eq!(totals.best[0].side, QuoteSide::Over);
    assert_eq!(totals.best[0].price, 120);
    assert_eq!(totals.best[0].bookmaker, "DraftKings");
    assert_eq!(totals.best[1].price, 125);
    assert_eq!(totals.best[1].bookmaker, "BetMGM");
    assert_eq!(totals.edge, 10.1);
}

#[test]
fn test_exposure_figures() {
    let output = runner().process(&slate(), now());
    let exposures = output.exposures;

    assert_eq!(exposures.len(), 2);
    let lad = exposures.iter().find(|e| e.event_id == "lad-sf").unwrap();
    assert_eq!(lad.game, "Los Angeles Dodgers vs San Francisco Giants");
    assert_eq!((lad.home_count, lad.away_count, lad.net_count), (2, 2, 0));
    assert_eq!(lad.worst_case_loss, 155);

    let nyy = exposures.iter().find(|e| e.event_id == "nyy-bos").unwrap();
    assert_eq!(nyy.worst_case_loss, 150);
}

#[test]
fn test_processing_is_deterministic() {
    let first = runner().process(&slate(), now());
    let second = runner().process(&slate(), now());
    assert_eq!(first.batch.quotes, second.batch.quotes);
    assert_eq!(first.mispricings, second.mispricings);
    assert_eq!(first.exposures, second.exposures);
}

#[tokio::test]
async fn test_consecutive_cycles_append() {
    let provider = MockProvider::new(vec![slate()]);
    let store = OddsStore::in_memory().await.unwrap();
    let runner = runner();

    run_cycle(&provider, &store, &runner, now()).await.unwrap();
    run_cycle(&provider, &store, &runner, now() + Duration::minutes(5)).await.unwrap();

    assert_eq!(provider.calls(), 2);
    let counts = store.table_counts().await.unwrap();
    assert_eq!(counts.quotes, 48);
    assert_eq!(counts.mispricings, 2);
    assert_eq!(counts.exposures, 4);

    let recent = store.recent_quotes(MarketType::H2h, 1).await.unwrap();
    assert!(recent[0].observed_at.starts_with("2026-04-01T20:05:00"));
}

#[tokio::test]
async fn test_fetch_failure_then_recovery() {
    let provider = MockProvider::new(vec![slate()]);
    let store = OddsStore::in_memory().await.unwrap();
    let runner = runner();

    provider.set_error("Odds API error 429 Too Many Requests");
    let err = run_cycle(&provider, &store, &runner, now()).await.unwrap_err();
    assert!(err.to_string().contains("429"));
    assert_eq!(store.table_counts().await.unwrap().quotes, 0);

    provider.clear_error();
    let report = run_cycle(&provider, &store, &runner, now()).await.unwrap();
    assert_eq!(report.quotes_persisted, 24);
}

#[tokio::test]
async fn test_games_all_finished() {
    let provider = MockProvider::new(vec![slate()]);
    let store = OddsStore::in_memory().await.unwrap();

    // A day later every game on the slate is past the staleness window.
    let report = run_cycle(&provider, &store, &runner(), now() + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(report.stale_events, 3);
    assert_eq!(report.quotes, 0);
    assert_eq!(store.table_counts().await.unwrap().quotes, 0);
}
