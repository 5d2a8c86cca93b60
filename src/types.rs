//! Shared types for the ODDSWATCH tracker.
//!
//! Two families live here: the loosely-typed provider payload shapes
//! (`RawEvent` and friends, every field optional and leniently typed so
//! one bad field cannot poison a whole event) and the canonical records
//! the engine produces and hands to storage.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// Provider payload (The Odds API v4 shape)
// ---------------------------------------------------------------------------

/// One event as delivered by the odds provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub sport_key: Option<String>,
    /// ISO-8601 start time, e.g. `2026-04-01T23:05:00Z`.
    #[serde(default, deserialize_with = "lenient")]
    pub commence_time: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub home_team: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub away_team: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub bookmakers: Vec<RawBookmaker>,
}

/// A bookmaker block inside an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBookmaker {
    #[serde(default, deserialize_with = "lenient")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub markets: Vec<RawMarket>,
}

impl RawBookmaker {
    /// Display name: `title`, then `key`, then "Unknown".
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.key.as_deref())
            .unwrap_or("Unknown")
    }
}

/// A market block (`h2h`, `totals`, `spreads`, ...) inside a bookmaker.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMarket {
    #[serde(default, deserialize_with = "lenient")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub outcomes: Vec<RawOutcome>,
}

/// A single priced outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOutcome {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<RawPrice>,
    /// Line value for totals/spreads. Numeric strings (`"8.5"`) are accepted.
    #[serde(default, deserialize_with = "lenient_point")]
    pub point: Option<f64>,
}

/// Price as it appears on the wire. American odds normally arrive as
/// integers, but some feeds quote them as strings (`"+150"`) or floats.
/// Anything else is kept as `Other` and rejected when converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Integer(i64),
    Float(f64),
    Text(String),
    Other(Value),
}

// A wrong type on one field must not fail the enclosing event: the field
// decodes as absent and the normalizer reports it against the smallest unit.

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Non-arrays decode as empty; an element of the wrong shape decodes as
/// `T::default()` so it is still seen (and skipped) downstream.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

fn lenient_point<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let point = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(point.filter(|p| p.is_finite()))
}

impl fmt::Display for RawPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawPrice::Integer(v) => write!(f, "{v}"),
            RawPrice::Float(v) => write!(f, "{v}"),
            RawPrice::Text(s) => write!(f, "{s}"),
            RawPrice::Other(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Betting market type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    /// Moneyline.
    H2h,
    /// Over/under on the game total.
    Totals,
    /// Point spread (run line).
    Spreads,
}

impl MarketType {
    pub const ALL: &'static [MarketType] =
        &[MarketType::H2h, MarketType::Totals, MarketType::Spreads];

    /// Provider key, also used as the storage value.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::H2h => "h2h",
            MarketType::Totals => "totals",
            MarketType::Spreads => "spreads",
        }
    }

    /// The two sides a market of this type is priced on.
    pub fn sides(&self) -> [QuoteSide; 2] {
        match self {
            MarketType::H2h | MarketType::Spreads => [QuoteSide::Home, QuoteSide::Away],
            MarketType::Totals => [QuoteSide::Over, QuoteSide::Under],
        }
    }

    /// Whether outcomes of this type carry a line.
    pub fn has_point(&self) -> bool {
        !matches!(self, MarketType::H2h)
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MarketType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "h2h" | "moneyline" => Ok(MarketType::H2h),
            "totals" | "total" => Ok(MarketType::Totals),
            "spreads" | "spread" => Ok(MarketType::Spreads),
            _ => Err(anyhow::anyhow!("Unknown market type: {s}")),
        }
    }
}

/// Which side of a two-way market a quote prices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    Home,
    Away,
    Over,
    Under,
}

impl QuoteSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSide::Home => "home",
            QuoteSide::Away => "away",
            QuoteSide::Over => "over",
            QuoteSide::Under => "under",
        }
    }
}

impl fmt::Display for QuoteSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event start time. Unparseable provider values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommenceTime {
    Scheduled(DateTime<Utc>),
    Unparsed(String),
}

impl CommenceTime {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            CommenceTime::Scheduled(t) => Some(*t),
            CommenceTime::Unparsed(_) => None,
        }
    }
}

impl fmt::Display for CommenceTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommenceTime::Scheduled(t) => {
                f.write_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            CommenceTime::Unparsed(raw) => f.write_str(raw),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical records
// ---------------------------------------------------------------------------

/// One bookmaker's price on one side of one market of one event.
///
/// Immutable once built; every polling cycle produces a fresh batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalQuote {
    pub event_id: String,
    pub sport: String,
    pub commence_time: CommenceTime,
    pub home_team: String,
    pub away_team: String,
    pub bookmaker: String,
    pub market_type: MarketType,
    pub side: QuoteSide,
    /// American odds, never zero.
    pub price: i64,
    /// Line for totals/spreads, absent for h2h.
    pub point: Option<Decimal>,
    /// Ingestion time, not provider time.
    pub observed_at: DateTime<Utc>,
}

impl fmt::Display for CanonicalQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} | {} {} {}",
            self.bookmaker, self.home_team, self.away_team, self.market_type, self.side,
            format_american(self.price),
        )?;
        if let Some(point) = self.point {
            write!(f, " @ {point}")?;
        }
        Ok(())
    }
}

/// Best available price on one side of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestQuote {
    pub side: QuoteSide,
    pub price: i64,
    pub bookmaker: String,
}

/// A market whose best cross-bookmaker prices sum below 100% implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MispricingRecord {
    pub event_id: String,
    pub market_type: MarketType,
    /// Line the group was keyed on (home-side line for spreads).
    pub point: Option<Decimal>,
    pub home_team: String,
    pub away_team: String,
    /// Best quote per side, in `MarketType::sides()` order.
    pub best: [BestQuote; 2],
    /// Sum of the two implied probabilities (unrounded).
    pub total_implied: f64,
    /// `(1 - total_implied) * 100`, rounded to two places.
    pub edge: f64,
    pub detected_at: DateTime<Utc>,
}

impl fmt::Display for MispricingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} [{}] {} {} ({}) / {} {} ({}) edge {:.2}%",
            self.home_team,
            self.away_team,
            self.market_type,
            self.best[0].side,
            format_american(self.best[0].price),
            self.best[0].bookmaker,
            self.best[1].side,
            format_american(self.best[1].price),
            self.best[1].bookmaker,
            self.edge,
        )
    }
}

/// Coarse per-event bookmaker liability figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub event_id: String,
    /// "{home} vs {away}"
    pub game: String,
    pub home_count: usize,
    pub away_count: usize,
    /// `home_count - away_count`
    pub net_count: i64,
    /// Payout per 100 staked on the worse side for the book. Not a real
    /// risk figure: stake sizes are never observed.
    pub worst_case_loss: i64,
    pub estimated_at: DateTime<Utc>,
}

/// Render American odds with an explicit sign for positive prices.
pub fn format_american(price: i64) -> String {
    if price > 0 {
        format!("+{price}")
    } else {
        price.to_string()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Record-level failures. None of these abort a batch; the offending
/// unit is skipped and reported.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OddsError {
    #[error("Invalid odds format: {raw:?}")]
    InvalidOddsFormat { raw: String },

    #[error("Unrecognized side {label:?} for {market_type} in event {event_id}")]
    UnrecognizedSide {
        event_id: String,
        market_type: MarketType,
        label: String,
    },

    #[error("Malformed event ({id}): {reason}", id = .event_id.as_deref().unwrap_or("<no id>"))]
    MalformedEvent {
        event_id: Option<String>,
        reason: String,
    },

    #[error("Could not parse commence time {raw:?}: {reason}")]
    TimeParseFailure { raw: String, reason: String },

    #[error("Missing point on {market_type} outcome {label:?} in event {event_id}")]
    MissingPoint {
        event_id: String,
        market_type: MarketType,
        label: String,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
