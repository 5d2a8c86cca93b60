//! Bookmaker exposure estimate.
//!
//! A coarse per-game liability figure built from h2h quote counts and the
//! longest underdog price on offer. This is an approximation, not a risk
//! model: the tracker never sees stake sizes, so "exposure" here is the
//! number of books quoting each side and "worst case" is the payout per
//! 100 staked on whichever side would cost a book the most.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

use super::edge::select_best;
use crate::types::{CanonicalQuote, ExposureRecord, MarketType, QuoteSide};

/// Payout unit assumed when a side's best price is not positive.
pub const FALLBACK_PAYOUT: i64 = 100;

/// Estimates per-event exposure from h2h quotes. Stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExposureEstimator;

impl ExposureEstimator {
    pub fn new() -> Self {
        Self
    }

    /// One record per event with h2h quotes on both sides, ordered by
    /// event id.
    pub fn estimate(
        &self,
        quotes: &[CanonicalQuote],
        estimated_at: DateTime<Utc>,
    ) -> Vec<ExposureRecord> {
        let mut by_event: BTreeMap<&str, Vec<&CanonicalQuote>> = BTreeMap::new();
        for quote in quotes.iter().filter(|q| q.market_type == MarketType::H2h) {
            by_event.entry(quote.event_id.as_str()).or_default().push(quote);
        }

        by_event
            .into_iter()
            .filter_map(|(event_id, group)| {
                let home: Vec<&CanonicalQuote> =
                    group.iter().copied().filter(|q| q.side == QuoteSide::Home).collect();
                let away: Vec<&CanonicalQuote> =
                    group.iter().copied().filter(|q| q.side == QuoteSide::Away).collect();

                if home.is_empty() || away.is_empty() {
                    debug!(event_id, "One-sided h2h book, no exposure estimate");
                    return None;
                }

                let worst_case_loss = payout(&home).max(payout(&away));
                let first = group[0];

                Some(ExposureRecord {
                    event_id: event_id.to_string(),
                    game: format!("{} vs {}", first.home_team, first.away_team),
                    home_count: home.len(),
                    away_count: away.len(),
                    net_count: home.len() as i64 - away.len() as i64,
                    worst_case_loss,
                    estimated_at,
                })
            })
            .collect()
    }
}

/// Payout per 100 at the side's best price, or the fallback unit.
fn payout(side: &[&CanonicalQuote]) -> i64 {
    match select_best(side.iter().copied()) {
        Some(best) if best.price > 0 => best.price,
        _ => FALLBACK_PAYOUT,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
