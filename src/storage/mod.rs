//! Persistence layer.
//!
//! Append-only SQLite store for quotes, mispricings and exposure
//! estimates. Rows are never updated; each polling cycle is written in a
//! single transaction, and duplicate identities are ignored rather than
//! overwritten.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::prelude::*;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{CanonicalQuote, ExposureRecord, MarketType, MispricingRecord};

/// Default database location.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://oddswatch.db";

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS odds_quotes (
        cycle_id TEXT NOT NULL,
        event_id TEXT NOT NULL,
        sport TEXT NOT NULL,
        commence_time TEXT NOT NULL,
        home_team TEXT NOT NULL,
        away_team TEXT NOT NULL,
        bookmaker TEXT NOT NULL,
        market_type TEXT NOT NULL,
        side TEXT NOT NULL,
        price INTEGER NOT NULL,
        point REAL,
        observed_at TEXT NOT NULL,
        PRIMARY KEY (event_id, bookmaker, market_type, side, observed_at)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS mispricings (
        cycle_id TEXT NOT NULL,
        detected_at TEXT NOT NULL,
        event_id TEXT NOT NULL,
        market_type TEXT NOT NULL,
        point REAL,
        home_team TEXT NOT NULL,
        away_team TEXT NOT NULL,
        side_a TEXT NOT NULL,
        price_a INTEGER NOT NULL,
        bookmaker_a TEXT NOT NULL,
        side_b TEXT NOT NULL,
        price_b INTEGER NOT NULL,
        bookmaker_b TEXT NOT NULL,
        total_implied REAL NOT NULL,
        edge REAL NOT NULL
    )
    "#,
    // h2h rows have no line; a plain key would treat every NULL as distinct.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS idx_mispricings_identity
    ON mispricings(event_id, market_type, COALESCE(point, ''), detected_at)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS exposures (
        cycle_id TEXT NOT NULL,
        estimated_at TEXT NOT NULL,
        event_id TEXT NOT NULL,
        game TEXT NOT NULL,
        home_count INTEGER NOT NULL,
        away_count INTEGER NOT NULL,
        net_count INTEGER NOT NULL,
        worst_case_loss INTEGER NOT NULL,
        PRIMARY KEY (event_id, estimated_at)
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_odds_quotes_observed_at ON odds_quotes(observed_at)",
    "CREATE INDEX IF NOT EXISTS idx_mispricings_edge ON mispricings(edge)",
];

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// Rows actually inserted by one `append_cycle` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub quotes: u64,
    pub mispricings: u64,
    pub exposures: u64,
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub quotes: i64,
    pub mispricings: i64,
    pub exposures: i64,
}

/// A persisted quote, as read back for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredQuote {
    pub home_team: String,
    pub away_team: String,
    pub bookmaker: String,
    pub side: String,
    pub price: i64,
    pub point: Option<f64>,
    pub observed_at: String,
}

/// A persisted mispricing, as read back for inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMispricing {
    pub home_team: String,
    pub away_team: String,
    pub market_type: String,
    pub price_a: i64,
    pub price_b: i64,
    pub edge: f64,
    pub detected_at: String,
}

fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Append-only SQLite store.
pub struct OddsStore {
    pool: SqlitePool,
}

impl OddsStore {
    /// Open (creating if needed) the database and ensure the schema.
    pub async fn open(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {database_url}"))?
            .create_if_missing(true);

        // One writer per process; also keeps `:memory:` on a single database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {database_url}"))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        info!(database_url, "Odds store ready");
        Ok(store)
    }

    /// Throwaway in-memory store (tests, dry runs).
    pub async fn in_memory() -> Result<Self> {
        Self::open("sqlite::memory:").await
    }

    async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .context("Failed to create schema")?;
        }
        Ok(())
    }

    /// Append one cycle's output atomically.
    pub async fn append_cycle(
        &self,
        cycle_id: Uuid,
        quotes: &[CanonicalQuote],
        mispricings: &[MispricingRecord],
        exposures: &[ExposureRecord],
    ) -> Result<PersistReport> {
        let cycle = cycle_id.to_string();
        let mut report = PersistReport::default();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        for q in quotes {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO odds_quotes (
                    cycle_id, event_id, sport, commence_time, home_team, away_team,
                    bookmaker, market_type, side, price, point, observed_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&cycle)
            .bind(&q.event_id)
            .bind(&q.sport)
            .bind(q.commence_time.to_string())
            .bind(&q.home_team)
            .bind(&q.away_team)
            .bind(&q.bookmaker)
            .bind(q.market_type.as_str())
            .bind(q.side.as_str())
            .bind(q.price)
            .bind(q.point.and_then(|p| p.to_f64()))
            .bind(timestamp(&q.observed_at))
            .execute(&mut *tx)
            .await
            .context("Failed to insert quote")?;
            report.quotes += result.rows_affected();
        }

        for m in mispricings {
            let [a, b] = &m.best;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO mispricings (
                    cycle_id, detected_at, event_id, market_type, point, home_team, away_team,
                    side_a, price_a, bookmaker_a, side_b, price_b, bookmaker_b,
                    total_implied, edge
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&cycle)
            .bind(timestamp(&m.detected_at))
            .bind(&m.event_id)
            .bind(m.market_type.as_str())
            .bind(m.point.and_then(|p| p.to_f64()))
            .bind(&m.home_team)
            .bind(&m.away_team)
            .bind(a.side.as_str())
            .bind(a.price)
            .bind(&a.bookmaker)
            .bind(b.side.as_str())
            .bind(b.price)
            .bind(&b.bookmaker)
            .bind(m.total_implied)
            .bind(m.edge)
            .execute(&mut *tx)
            .await
            .context("Failed to insert mispricing")?;
            report.mispricings += result.rows_affected();
        }

        for e in exposures {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO exposures (
                    cycle_id, estimated_at, event_id, game,
                    home_count, away_count, net_count, worst_case_loss
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&cycle)
            .bind(timestamp(&e.estimated_at))
            .bind(&e.event_id)
            .bind(&e.game)
            .bind(e.home_count as i64)
            .bind(e.away_count as i64)
            .bind(e.net_count)
            .bind(e.worst_case_loss)
            .execute(&mut *tx)
            .await
            .context("Failed to insert exposure")?;
            report.exposures += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit cycle")?;

        debug!(
            cycle_id = %cycle_id,
            quotes = report.quotes,
            mispricings = report.mispricings,
            exposures = report.exposures,
            "Cycle persisted"
        );
        Ok(report)
    }

    /// Newest quotes of one market type.
    pub async fn recent_quotes(&self, market_type: MarketType, limit: u32) -> Result<Vec<StoredQuote>> {
        let rows = sqlx::query(
            r#"
            SELECT home_team, away_team, bookmaker, side, price, point, observed_at
            FROM odds_quotes
            WHERE market_type = ?
            ORDER BY observed_at DESC, event_id, bookmaker, side
            LIMIT ?
            "#,
        )
        .bind(market_type.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query recent quotes")?;

        rows.iter()
            .map(|row| {
                Ok(StoredQuote {
                    home_team: row.try_get("home_team")?,
                    away_team: row.try_get("away_team")?,
                    bookmaker: row.try_get("bookmaker")?,
                    side: row.try_get("side")?,
                    price: row.try_get("price")?,
                    point: row.try_get("point")?,
                    observed_at: row.try_get("observed_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("Failed to decode quote row")
    }

    /// Largest-edge mispricings ever recorded.
    pub async fn top_mispricings(&self, limit: u32) -> Result<Vec<StoredMispricing>> {
        let rows = sqlx::query(
            r#"
            SELECT home_team, away_team, market_type, price_a, price_b, edge, detected_at
            FROM mispricings
            ORDER BY edge DESC, detected_at DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to query mispricings")?;

        rows.iter()
            .map(|row| {
                Ok(StoredMispricing {
                    home_team: row.try_get("home_team")?,
                    away_team: row.try_get("away_team")?,
                    market_type: row.try_get("market_type")?,
                    price_a: row.try_get("price_a")?,
                    price_b: row.try_get("price_b")?,
                    edge: row.try_get("edge")?,
                    detected_at: row.try_get("detected_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("Failed to decode mispricing row")
    }

    pub async fn table_counts(&self) -> Result<TableCounts> {
        Ok(TableCounts {
            quotes: self.count_rows("odds_quotes").await?,
            mispricings: self.count_rows("mispricings").await?,
            exposures: self.count_rows("exposures").await?,
        })
    }

    async fn count_rows(&self, table: &'static str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("Failed to count {table}"))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BestQuote, CommenceTime, QuoteSide};
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 20, 0, 0).unwrap()
    }

    fn quote(book: &str, side: QuoteSide, price: i64, observed_at: DateTime<Utc>) -> CanonicalQuote {
        CanonicalQuote {
            event_id: "evt-1".into(),
            sport: "MLB".into(),
            commence_time: CommenceTime::Scheduled(now() + Duration::hours(3)),
            home_team: "Yankees".into(),
            away_team: "Red Sox".into(),
            bookmaker: book.into(),
            market_type: MarketType::H2h,
            side,
            price,
            point: None,
            observed_at,
        }
    }

    fn mispricing(event_id: &str, edge: f64) -> MispricingRecord {
        MispricingRecord {
            event_id: event_id.into(),
            market_type: MarketType::H2h,
            point: None,
            home_team: "Yankees".into(),
            away_team: "Red Sox".into(),
            best: [
                BestQuote { side: QuoteSide::Home, price: 150, bookmaker: "A".into() },
                BestQuote { side: QuoteSide::Away, price: 120, bookmaker: "B".into() },
            ],
            total_implied: 1.0 - edge / 100.0,
            edge,
            detected_at: now(),
        }
    }

    fn exposure() -> ExposureRecord {
        ExposureRecord {
            event_id: "evt-1".into(),
            game: "Yankees vs Red Sox".into(),
            home_count: 2,
            away_count: 1,
            net_count: 1,
            worst_case_loss: 150,
            estimated_at: now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_count() {
        let store = OddsStore::in_memory().await.unwrap();
        let quotes = vec![
            quote("A", QuoteSide::Home, 150, now()),
            quote("A", QuoteSide::Away, -170, now()),
        ];
        let report = store
            .append_cycle(Uuid::new_v4(), &quotes, &[mispricing("evt-1", 14.55)], &[exposure()])
            .await
            .unwrap();

        assert_eq!(report, PersistReport { quotes: 2, mispricings: 1, exposures: 1 });
        assert_eq!(
            store.table_counts().await.unwrap(),
            TableCounts { quotes: 2, mispricings: 1, exposures: 1 }
        );
    }

    #[tokio::test]
    async fn test_duplicate_identity_is_ignored() {
        let store = OddsStore::in_memory().await.unwrap();
        let quotes = vec![quote("A", QuoteSide::Home, 150, now())];
        store.append_cycle(Uuid::new_v4(), &quotes, &[], &[]).await.unwrap();

        // Same identity, different price: the original row stays.
        let again = vec![quote("A", QuoteSide::Home, 175, now())];
        let report = store.append_cycle(Uuid::new_v4(), &again, &[], &[]).await.unwrap();
        assert_eq!(report.quotes, 0);

        let stored = store.recent_quotes(MarketType::H2h, 10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].price, 150);
    }

    #[tokio::test]
    async fn test_duplicate_mispricing_without_line_is_ignored() {
        let store = OddsStore::in_memory().await.unwrap();
        let record = mispricing("evt-1", 14.55);
        let first = store.append_cycle(Uuid::new_v4(), &[], &[record.clone()], &[]).await.unwrap();
        let second = store.append_cycle(Uuid::new_v4(), &[], &[record.clone()], &[]).await.unwrap();

        assert_eq!(first.mispricings, 1);
        assert_eq!(second.mispricings, 0);

        // Same event and time but a totals line is a different market.
        let mut totals = record;
        totals.market_type = MarketType::Totals;
        totals.point = Some(dec!(8.5));
        let third = store.append_cycle(Uuid::new_v4(), &[], &[totals], &[]).await.unwrap();
        assert_eq!(third.mispricings, 1);
        assert_eq!(store.table_counts().await.unwrap().mispricings, 2);
    }

    #[tokio::test]
    async fn test_recent_quotes_newest_first() {
        let store = OddsStore::in_memory().await.unwrap();
        let earlier = now() - Duration::minutes(5);
        store
            .append_cycle(Uuid::new_v4(), &[quote("Old", QuoteSide::Home, 110, earlier)], &[], &[])
            .await
            .unwrap();
        store
            .append_cycle(Uuid::new_v4(), &[quote("New", QuoteSide::Home, 120, now())], &[], &[])
            .await
            .unwrap();

        let stored = store.recent_quotes(MarketType::H2h, 1).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].bookmaker, "New");
        assert!(stored[0].point.is_none());
        assert!(store.recent_quotes(MarketType::Totals, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_point_round_trips_as_real() {
        let store = OddsStore::in_memory().await.unwrap();
        let mut q = quote("A", QuoteSide::Over, -110, now());
        q.market_type = MarketType::Totals;
        q.point = Some(dec!(8.5));
        store.append_cycle(Uuid::new_v4(), &[q], &[], &[]).await.unwrap();

        let stored = store.recent_quotes(MarketType::Totals, 10).await.unwrap();
        assert_eq!(stored[0].point, Some(8.5));
        assert_eq!(stored[0].side, "over");
    }

    #[tokio::test]
    async fn test_top_mispricings_by_edge() {
        let store = OddsStore::in_memory().await.unwrap();
        let records = vec![mispricing("small", 5.5), mispricing("big", 20.0), mispricing("mid", 9.1)];
        store.append_cycle(Uuid::new_v4(), &[], &records, &[]).await.unwrap();

        let top = store.top_mispricings(2).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].edge, 20.0);
        assert_eq!(top[1].edge, 9.1);
        assert_eq!(top[0].market_type, "h2h");
        assert_eq!(top[0].price_a, 150);
    }

    #[tokio::test]
    async fn test_empty_cycle_is_noop() {
        let store = OddsStore::in_memory().await.unwrap();
        let report = store.append_cycle(Uuid::new_v4(), &[], &[], &[]).await.unwrap();
        assert_eq!(report, PersistReport::default());
        assert_eq!(store.table_counts().await.unwrap(), TableCounts::default());
    }
}
