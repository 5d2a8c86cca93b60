//! Quote normalizer.
//!
//! Flattens provider events into one `CanonicalQuote` per
//! (bookmaker, market, side). Bad data is skipped at the smallest unit
//! possible: a malformed event drops that event, a bad outcome drops that
//! outcome, and everything else in the batch carries on.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::*;
use serde_json::Value;
use tracing::{debug, warn};

use crate::strategy::probability::AmericanOdds;
use crate::types::{
    CanonicalQuote, CommenceTime, MarketType, OddsError, QuoteSide, RawEvent, RawOutcome,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Placeholder for values the provider omitted entirely.
const MISSING_VALUE: &str = "N/A";

/// Normalizer configuration.
#[derive(Debug, Clone)]
pub struct NormalizerConfig {
    /// Sport tag stamped on every quote (e.g. "MLB").
    pub sport: String,
    /// Events that started longer ago than this are treated as finished.
    pub staleness_window: Duration,
    /// Market types to keep; anything else in the payload is ignored.
    pub market_types: Vec<MarketType>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            sport: "MLB".to_string(),
            staleness_window: Duration::hours(4),
            market_types: MarketType::ALL.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// An outcome that could not be turned into a quote.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedQuote {
    pub event_id: String,
    pub bookmaker: String,
    pub market_type: MarketType,
    pub reason: OddsError,
}

/// Result of normalizing a single event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventQuotes {
    /// Started before the staleness cutoff; nothing emitted.
    Stale { commence_time: DateTime<Utc> },
    Fresh {
        quotes: Vec<CanonicalQuote>,
        skipped: Vec<SkippedQuote>,
    },
}

/// Result of normalizing a whole provider payload.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub events_seen: usize,
    pub stale_events: usize,
    /// `MalformedEvent` errors, one per dropped event.
    pub malformed: Vec<OddsError>,
    pub quotes: Vec<CanonicalQuote>,
    pub skipped: Vec<SkippedQuote>,
}

// ---------------------------------------------------------------------------
// Time parsing
// ---------------------------------------------------------------------------

/// Parse a provider start time (RFC 3339, e.g. `2026-04-01T23:05:00Z`).
pub fn parse_commence_time(raw: &str) -> Result<DateTime<Utc>, OddsError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| OddsError::TimeParseFailure {
            raw: raw.to_string(),
            reason: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Maps raw provider events to canonical quotes. Pure: no I/O, no state
/// carried between calls.
pub struct QuoteNormalizer {
    config: NormalizerConfig,
}

impl QuoteNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize every event in a decoded payload.
    pub fn normalize_batch(&self, payload: &[Value], observed_at: DateTime<Utc>) -> NormalizedBatch {
        let mut batch = NormalizedBatch {
            events_seen: payload.len(),
            ..Default::default()
        };

        for value in payload {
            match self.normalize_value(value, observed_at) {
                Ok(EventQuotes::Stale { .. }) => batch.stale_events += 1,
                Ok(EventQuotes::Fresh { quotes, skipped }) => {
                    batch.quotes.extend(quotes);
                    batch.skipped.extend(skipped);
                }
                Err(e) => {
                    warn!(error = %e, "Skipping malformed event");
                    batch.malformed.push(e);
                }
            }
        }

        batch
    }

    /// Decode one JSON event and normalize it.
    ///
    /// Only a non-object value fails to decode. Mistyped fields inside the
    /// event decode as absent and surface as skips on their own unit.
    pub fn normalize_value(
        &self,
        value: &Value,
        observed_at: DateTime<Utc>,
    ) -> Result<EventQuotes, OddsError> {
        let event: RawEvent =
            serde_json::from_value(value.clone()).map_err(|e| OddsError::MalformedEvent {
                event_id: value.get("id").and_then(Value::as_str).map(String::from),
                reason: e.to_string(),
            })?;
        self.normalize(&event, observed_at)
    }

    /// Normalize one event.
    ///
    /// Fails only with `MalformedEvent` (missing id or team names).
    /// Outcome-level problems are returned in `skipped`.
    pub fn normalize(
        &self,
        event: &RawEvent,
        observed_at: DateTime<Utc>,
    ) -> Result<EventQuotes, OddsError> {
        let event_id = required(&event.id, "id", None)?;
        let home_team = required(&event.home_team, "home_team", Some(event_id))?;
        let away_team = required(&event.away_team, "away_team", Some(event_id))?;

        let commence_time = match event.commence_time.as_deref() {
            Some(raw) => match parse_commence_time(raw) {
                Ok(t) => CommenceTime::Scheduled(t),
                Err(e) => {
                    debug!(event_id, error = %e, "Keeping unparsed commence time");
                    CommenceTime::Unparsed(raw.to_string())
                }
            },
            None => CommenceTime::Unparsed(MISSING_VALUE.to_string()),
        };

        if let Some(start) = commence_time.as_datetime() {
            if start < observed_at - self.config.staleness_window {
                debug!(event_id, commence_time = %start, "Skipping completed game");
                return Ok(EventQuotes::Stale { commence_time: start });
            }
        }

        let mut quotes = Vec::new();
        let mut skipped = Vec::new();

        for bookmaker in &event.bookmakers {
            let bookmaker_name = bookmaker.display_name();

            for market in &bookmaker.markets {
                let Some(market_type) = market
                    .key
                    .as_deref()
                    .and_then(|k| k.parse::<MarketType>().ok())
                    .filter(|mt| self.config.market_types.contains(mt))
                else {
                    debug!(event_id, bookmaker = bookmaker_name, market = ?market.key, "Ignoring market");
                    continue;
                };

                for outcome in &market.outcomes {
                    match parse_outcome(outcome, market_type, event_id, home_team, away_team) {
                        Ok((side, price, point)) => quotes.push(CanonicalQuote {
                            event_id: event_id.to_string(),
                            sport: self.config.sport.clone(),
                            commence_time: commence_time.clone(),
                            home_team: home_team.to_string(),
                            away_team: away_team.to_string(),
                            bookmaker: bookmaker_name.to_string(),
                            market_type,
                            side,
                            price: price.value(),
                            point,
                            observed_at,
                        }),
                        Err(reason) => {
                            warn!(
                                event_id,
                                bookmaker = bookmaker_name,
                                market = %market_type,
                                error = %reason,
                                "Skipping outcome"
                            );
                            skipped.push(SkippedQuote {
                                event_id: event_id.to_string(),
                                bookmaker: bookmaker_name.to_string(),
                                market_type,
                                reason,
                            });
                        }
                    }
                }
            }
        }

        Ok(EventQuotes::Fresh { quotes, skipped })
    }
}

/// A required, non-empty string field of the event.
fn required<'a>(
    field: &'a Option<String>,
    name: &str,
    event_id: Option<&str>,
) -> Result<&'a str, OddsError> {
    match field.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(OddsError::MalformedEvent {
            event_id: event_id.map(String::from),
            reason: format!("missing {name}"),
        }),
    }
}

/// Side, price and line of one outcome, checked in that order.
fn parse_outcome(
    outcome: &RawOutcome,
    market_type: MarketType,
    event_id: &str,
    home_team: &str,
    away_team: &str,
) -> Result<(QuoteSide, AmericanOdds, Option<Decimal>), OddsError> {
    let side = resolve_side(outcome, market_type, event_id, home_team, away_team)?;
    let price = outcome_price(outcome)?;
    let point = outcome_point(outcome, market_type, event_id)?;
    Ok((side, price, point))
}

/// Team-named markets match the label against the event's teams;
/// totals use the lowercased label.
fn resolve_side(
    outcome: &RawOutcome,
    market_type: MarketType,
    event_id: &str,
    home_team: &str,
    away_team: &str,
) -> Result<QuoteSide, OddsError> {
    let label = outcome.name.as_deref().unwrap_or_default().trim();
    let side = match market_type {
        MarketType::H2h | MarketType::Spreads => {
            if label == home_team {
                Some(QuoteSide::Home)
            } else if label == away_team {
                Some(QuoteSide::Away)
            } else {
                None
            }
        }
        MarketType::Totals => match label.to_lowercase().as_str() {
            "over" => Some(QuoteSide::Over),
            "under" => Some(QuoteSide::Under),
            _ => None,
        },
    };

    side.ok_or_else(|| OddsError::UnrecognizedSide {
        event_id: event_id.to_string(),
        market_type,
        label: label.to_string(),
    })
}

fn outcome_price(outcome: &RawOutcome) -> Result<AmericanOdds, OddsError> {
    match &outcome.price {
        Some(raw) => AmericanOdds::try_from(raw),
        None => Err(OddsError::InvalidOddsFormat { raw: MISSING_VALUE.to_string() }),
    }
}

fn outcome_point(
    outcome: &RawOutcome,
    market_type: MarketType,
    event_id: &str,
) -> Result<Option<Decimal>, OddsError> {
    if !market_type.has_point() {
        return Ok(None);
    }
    outcome
        .point
        .and_then(Decimal::from_f64)
        .map(|p| Some(p.normalize()))
        .ok_or_else(|| OddsError::MissingPoint {
            event_id: event_id.to_string(),
            market_type,
            label: outcome.name.clone().unwrap_or_default(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
