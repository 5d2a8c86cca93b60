//! American odds → implied probability.
//!
//! Positive prices quote profit per 100 staked, negative prices quote the
//! stake needed to profit 100. The conversion is exact: rounding happens
//! only when a figure is displayed or stored as a percentage.

use std::fmt;
use std::str::FromStr;

use crate::types::{OddsError, RawPrice};

/// Largest accepted price magnitude. Keeps `|p| + 100` distinct from
/// `|p|` in f64, so probabilities stay strictly below 1.
pub const MAX_PRICE_MAGNITUDE: u64 = 1_000_000;

/// A validated American-odds price: non-zero, magnitude at most
/// [`MAX_PRICE_MAGNITUDE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AmericanOdds(i64);

impl AmericanOdds {
    pub fn new(price: i64) -> Result<Self, OddsError> {
        if price == 0 || price.unsigned_abs() > MAX_PRICE_MAGNITUDE {
            return Err(OddsError::InvalidOddsFormat { raw: price.to_string() });
        }
        Ok(Self(price))
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Implied win probability, always in the open interval (0, 1).
    pub fn implied_probability(&self) -> f64 {
        let price = self.0 as f64;
        if self.0 > 0 {
            100.0 / (price + 100.0)
        } else {
            price.abs() / (price.abs() + 100.0)
        }
    }
}

impl fmt::Display for AmericanOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::types::format_american(self.0))
    }
}

impl FromStr for AmericanOdds {
    type Err = OddsError;

    /// Accepts `"150"`, `"+150"`, `"-110"` (surrounding whitespace ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let price: i64 = digits
            .parse()
            .map_err(|_| OddsError::InvalidOddsFormat { raw: s.to_string() })?;
        AmericanOdds::new(price).map_err(|_| OddsError::InvalidOddsFormat { raw: s.to_string() })
    }
}

impl TryFrom<&RawPrice> for AmericanOdds {
    type Error = OddsError;

    fn try_from(raw: &RawPrice) -> Result<Self, Self::Error> {
        match raw {
            RawPrice::Integer(v) => AmericanOdds::new(*v),
            // Whole-number floats only; 1.91 is decimal odds, not American.
            RawPrice::Float(v)
                if v.is_finite() && v.fract() == 0.0 && v.abs() <= MAX_PRICE_MAGNITUDE as f64 =>
            {
                AmericanOdds::new(*v as i64)
            }
            RawPrice::Float(v) => Err(OddsError::InvalidOddsFormat { raw: v.to_string() }),
            RawPrice::Text(s) => s.parse(),
            RawPrice::Other(v) => Err(OddsError::InvalidOddsFormat { raw: v.to_string() }),
        }
    }
}

/// Implied probability of an American-odds price.
///
/// Fails with `InvalidOddsFormat` for a zero or out-of-range price.
pub fn implied_probability(price: i64) -> Result<f64, OddsError> {
    Ok(AmericanOdds::new(price)?.implied_probability())
}

/// Like [`implied_probability`], but for a price in string form.
pub fn implied_probability_str(price: &str) -> Result<f64, OddsError> {
    Ok(price.parse::<AmericanOdds>()?.implied_probability())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
