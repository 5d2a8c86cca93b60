//! ODDSWATCH: sportsbook odds normalizer and mispricing scanner
//!
//! Entry point. Loads configuration, initialises structured logging and
//! runs one of:
//! - `oddswatch`          the fetch → normalize → detect → persist loop
//! - `oddswatch inspect`  summarise what the database holds
//! - `oddswatch check`    one provider call to verify the API key

use anyhow::Result;
use chrono::Utc;
use std::time::Duration;
use tracing::{error, info, warn};

use oddswatch::config::AppConfig;
use oddswatch::engine::cycle::{run_cycle, CycleReport, CycleRunner};
use oddswatch::platforms::odds_api::OddsApiClient;
use oddswatch::platforms::OddsProvider;
use oddswatch::storage::OddsStore;
use oddswatch::types::{format_american, MarketType};

const BANNER: &str = r#"
  ___  ___  ___  ___ __      __ _  _____  ___  _  _
 / _ \|   \|   \/ __|\ \    / //_\|_   _|/ __|| || |
| (_) | |) | |) \__ \ \ \/\/ // _ \ | | | (__ | __ |
 \___/|___/|___/|___/  \_/\_//_/ \_\|_|  \___||_||_|

  Cross-bookmaker odds tracker
  v0.1.0
"#;

/// Rows shown per table by `inspect`.
const INSPECT_LIMIT: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("ODDSWATCH_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    match std::env::args().nth(1).as_deref() {
        None | Some("run") => run(&cfg).await,
        Some("inspect") => inspect(&cfg).await,
        Some("check") => check(&cfg).await,
        Some(other) => {
            anyhow::bail!("Unknown command: {other} (expected run, inspect or check)")
        }
    }
}

/// Main polling loop. Runs until Ctrl+C.
async fn run(cfg: &AppConfig) -> Result<()> {
    println!("{BANNER}");
    info!(
        name = %cfg.tracker.name,
        sport = %cfg.tracker.sport_key,
        poll_interval_secs = cfg.tracker.poll_interval_secs,
        min_edge = cfg.detection.min_edge,
        "ODDSWATCH starting up"
    );

    let provider = OddsApiClient::new(cfg.api_key()?, cfg.odds_api_settings())?;
    let store = OddsStore::open(&cfg.storage.database_url).await?;
    let runner = CycleRunner::new(cfg.normalizer_config(), cfg.detection_config());

    let poll_interval = Duration::from_secs(cfg.tracker.poll_interval_secs);
    let retry_delay = Duration::from_secs(cfg.tracker.retry_delay_secs);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(provider = provider.name(), "Entering main loop. Press Ctrl+C to stop.");

    loop {
        let delay = match run_cycle(&provider, &store, &runner, Utc::now()).await {
            Ok(report) => {
                log_cycle_report(&report);
                poll_interval
            }
            Err(e) => {
                error!(error = %e, retry_in_secs = retry_delay.as_secs(), "Cycle failed, will retry");
                retry_delay
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("ODDSWATCH shut down cleanly.");
    Ok(())
}

/// Summarise the database: row counts, newest h2h quotes, biggest edges.
async fn inspect(cfg: &AppConfig) -> Result<()> {
    let store = OddsStore::open(&cfg.storage.database_url).await?;

    let counts = store.table_counts().await?;
    info!(
        quotes = counts.quotes,
        mispricings = counts.mispricings,
        exposures = counts.exposures,
        "Database tables"
    );

    for q in store.recent_quotes(MarketType::H2h, INSPECT_LIMIT).await? {
        info!(
            game = %format!("{} vs {}", q.home_team, q.away_team),
            bookmaker = %q.bookmaker,
            side = %q.side,
            odds = %format_american(q.price),
            observed_at = %q.observed_at,
            "Recent quote"
        );
    }

    for m in store.top_mispricings(INSPECT_LIMIT).await? {
        info!(
            game = %format!("{} vs {}", m.home_team, m.away_team),
            market = %m.market_type,
            odds = %format!("{} / {}", format_american(m.price_a), format_american(m.price_b)),
            edge = %format!("{:.2}%", m.edge),
            detected_at = %m.detected_at,
            "Top mispricing"
        );
    }

    Ok(())
}

/// Single provider call to confirm the key works.
async fn check(cfg: &AppConfig) -> Result<()> {
    let provider = OddsApiClient::new(cfg.api_key()?, cfg.odds_api_settings())?;
    let events = provider.fetch_events().await?;

    match events.first() {
        Some(first) => {
            let team = |field: &str| {
                first
                    .get(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or("?")
                    .to_string()
            };
            info!(
                events = events.len(),
                first_game = %format!("{} vs {}", team("home_team"), team("away_team")),
                "API key is valid"
            );
        }
        None => warn!(sport = %cfg.tracker.sport_key, "API key is valid but no events are listed"),
    }

    Ok(())
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle_id = %report.cycle_id,
        events = report.events_seen,
        stale = report.stale_events,
        malformed = report.malformed_events,
        quotes = report.quotes,
        skipped = report.skipped_quotes,
        saved = report.quotes_persisted,
        mispricings = report.mispricings,
        exposures = report.exposures,
        "Cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("oddswatch=info"));

    let json_logging = std::env::var("ODDSWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
