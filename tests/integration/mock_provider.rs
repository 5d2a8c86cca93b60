//! Mock odds provider for integration testing.
//!
//! Serves scripted payloads in order (repeating the last one once the
//! script runs out) and can be forced to fail, all in-memory.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use oddswatch::platforms::OddsProvider;

pub struct MockProvider {
    payloads: Arc<Mutex<VecDeque<Vec<Value>>>>,
    last: Arc<Mutex<Vec<Value>>>,
    calls: Arc<Mutex<usize>>,
    /// If set, every fetch returns this error.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockProvider {
    pub fn new(payloads: Vec<Vec<Value>>) -> Self {
        Self {
            payloads: Arc::new(Mutex::new(payloads.into())),
            last: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(0)),
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl OddsProvider for MockProvider {
    async fn fetch_events(&self) -> Result<Vec<Value>> {
        *self.calls.lock().unwrap() += 1;
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.payloads.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A bookmaker block quoting h2h, totals and spreads.
pub fn bookmaker(
    title: &str,
    home: &str,
    away: &str,
    h2h: (i64, i64),
    totals: (f64, i64, i64),
    spreads: (f64, i64, i64),
) -> Value {
    json!({
        "key": title.to_lowercase().replace(' ', "_"),
        "title": title,
        "markets": [
            {"key": "h2h", "outcomes": [
                {"name": home, "price": h2h.0},
                {"name": away, "price": h2h.1},
            ]},
            {"key": "totals", "outcomes": [
                {"name": "Over", "price": totals.1, "point": totals.0},
                {"name": "Under", "price": totals.2, "point": totals.0},
            ]},
            {"key": "spreads", "outcomes": [
                {"name": home, "price": spreads.1, "point": spreads.0},
                {"name": away, "price": spreads.2, "point": -spreads.0},
            ]},
        ]
    })
}

pub fn event(id: &str, commence_time: &str, home: &str, away: &str, bookmakers: Vec<Value>) -> Value {
    json!({
        "id": id,
        "sport_key": "baseball_mlb",
        "sport_title": "MLB",
        "commence_time": commence_time,
        "home_team": home,
        "away_team": away,
        "bookmakers": bookmakers,
    })
}

/// Two upcoming games, one finished game and one malformed entry.
///
/// - `nyy-bos`: books disagree enough for a 14.55% h2h edge.
/// - `lad-sf`: ordinary overround everywhere except the 8.5 total.
pub fn slate() -> Vec<Value> {
    vec![
        event(
            "nyy-bos",
            "2026-04-01T23:05:00Z",
            "New York Yankees",
            "Boston Red Sox",
            vec![
                bookmaker("DraftKings", "New York Yankees", "Boston Red Sox", (150, 110), (8.5, -110, -110), (-1.5, 160, -190)),
                bookmaker("FanDuel", "New York Yankees", "Boston Red Sox", (130, 120), (8.5, -105, -115), (-1.5, 155, -185)),
            ],
        ),
        event(
            "lad-sf",
            "2026-04-02T02:10:00Z",
            "Los Angeles Dodgers",
            "San Francisco Giants",
            vec![
                bookmaker("DraftKings", "Los Angeles Dodgers", "San Francisco Giants", (-180, 155), (8.5, 120, -140), (-1.5, 110, -130)),
                bookmaker("BetMGM", "Los Angeles Dodgers", "San Francisco Giants", (-175, 150), (8.5, -140, 125), (-1.5, 105, -125)),
            ],
        ),
        event(
            "chc-stl",
            "2026-04-01T13:20:00Z",
            "Chicago Cubs",
            "St. Louis Cardinals",
            vec![bookmaker("DraftKings", "Chicago Cubs", "St. Louis Cardinals", (300, 300), (8.5, 300, 300), (-1.5, 300, 300))],
        ),
        json!({"id": "no-teams", "commence_time": "2026-04-01T23:05:00Z"}),
    ]
}
