//! Mispricing detection.
//!
//! Groups canonical quotes into two-sided markets, takes the best price
//! per side across all bookmakers and flags markets whose combined
//! implied probability falls short of 100% by more than `min_edge`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::probability::AmericanOdds;
use crate::types::{BestQuote, CanonicalQuote, MarketType, MispricingRecord, QuoteSide};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Detection configuration.
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Fractional threshold: flag when `sum < 1 - min_edge`.
    pub min_edge: f64,
    /// Market types to scan.
    pub market_types: Vec<MarketType>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_edge: 0.05,
            market_types: vec![MarketType::H2h],
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Identity of one two-sided market.
///
/// `line` is `None` for h2h, the total for totals, and the home-side
/// handicap for spreads (an away line of +1.5 pairs with a home -1.5).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketKey {
    pub event_id: String,
    pub market_type: MarketType,
    pub line: Option<Decimal>,
}

impl MarketKey {
    /// Key for a quote, or `None` when a line-based quote has no line.
    pub fn for_quote(quote: &CanonicalQuote) -> Option<Self> {
        let line = match quote.market_type {
            MarketType::H2h => None,
            MarketType::Totals => Some(quote.point?),
            MarketType::Spreads => {
                let point = quote.point?;
                Some(if quote.side == QuoteSide::Away { -point } else { point })
            }
        };
        Some(Self {
            event_id: quote.event_id.clone(),
            market_type: quote.market_type,
            line,
        })
    }
}

/// Best quote for a bettor: the arithmetic maximum price.
///
/// Under American odds a larger signed number never pays less: any
/// positive price beats any negative one, and within each sign the
/// numerically larger value pays more. Ties keep the first quote seen.
pub fn select_best<'a, I>(quotes: I) -> Option<&'a CanonicalQuote>
where
    I: IntoIterator<Item = &'a CanonicalQuote>,
{
    quotes.into_iter().fold(None, |best, q| match best {
        Some(b) if b.price >= q.price => Some(b),
        _ => Some(q),
    })
}

/// Round a fraction to a percentage with two decimals.
pub fn to_percent(fraction: f64) -> f64 {
    (fraction * 100.0 * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Cross-bookmaker mispricing detector. Stateless between calls.
pub struct MispricingDetector {
    config: DetectionConfig,
}

impl MispricingDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Scan quotes for soft markets. Results are sorted by edge,
    /// largest first; equal edges keep market key order.
    pub fn detect(
        &self,
        quotes: &[CanonicalQuote],
        detected_at: DateTime<Utc>,
    ) -> Vec<MispricingRecord> {
        let mut groups: BTreeMap<MarketKey, Vec<&CanonicalQuote>> = BTreeMap::new();
        for quote in quotes {
            if !self.config.market_types.contains(&quote.market_type) {
                continue;
            }
            if let Some(key) = MarketKey::for_quote(quote) {
                groups.entry(key).or_default().push(quote);
            }
        }

        let mut records: Vec<MispricingRecord> = groups
            .iter()
            .filter_map(|(key, group)| self.check_market(key, group, detected_at))
            .collect();

        records.sort_by(|a, b| b.edge.total_cmp(&a.edge));
        records
    }

    /// Evaluate one grouped market.
    fn check_market(
        &self,
        key: &MarketKey,
        group: &[&CanonicalQuote],
        detected_at: DateTime<Utc>,
    ) -> Option<MispricingRecord> {
        let [side_a, side_b] = key.market_type.sides();
        let best_a = select_best(group.iter().copied().filter(|q| q.side == side_a));
        let best_b = select_best(group.iter().copied().filter(|q| q.side == side_b));

        let (Some(best_a), Some(best_b)) = (best_a, best_b) else {
            debug!(
                event_id = %key.event_id,
                market = %key.market_type,
                "One side unquoted, skipping market"
            );
            return None;
        };

        let (prob_a, prob_b) = match (AmericanOdds::new(best_a.price), AmericanOdds::new(best_b.price)) {
            (Ok(a), Ok(b)) => (a.implied_probability(), b.implied_probability()),
            (Err(e), _) | (_, Err(e)) => {
                warn!(event_id = %key.event_id, error = %e, "Unusable best price");
                return None;
            }
        };

        let total_implied = prob_a + prob_b;
        if total_implied >= 1.0 - self.config.min_edge {
            return None;
        }

        let edge = to_percent(1.0 - total_implied);
        let first = group[0];

        info!(
            event_id = %key.event_id,
            market = %key.market_type,
            game = %format!("{} vs {}", first.home_team, first.away_team),
            best_a = best_a.price,
            book_a = %best_a.bookmaker,
            best_b = best_b.price,
            book_b = %best_b.bookmaker,
            edge = %format!("{edge:.2}%"),
            "Mispricing detected"
        );

        Some(MispricingRecord {
            event_id: key.event_id.clone(),
            market_type: key.market_type,
            point: key.line,
            home_team: first.home_team.clone(),
            away_team: first.away_team.clone(),
            best: [best_quote(best_a), best_quote(best_b)],
            total_implied,
            edge,
            detected_at,
        })
    }
}

fn best_quote(quote: &CanonicalQuote) -> BestQuote {
    BestQuote {
        side: quote.side,
        price: quote.price,
        bookmaker: quote.bookmaker.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
