//! Odds provider integrations.
//!
//! Defines the `OddsProvider` trait and the client for The Odds API v4.
//! Providers hand back the decoded event list untouched; shaping it into
//! canonical quotes is the normalizer's job.

pub mod odds_api;

use anyhow::Result;
use async_trait::async_trait;

/// Abstraction over sportsbook odds feeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OddsProvider: Send + Sync {
    /// Fetch the current event list, one JSON value per event.
    ///
    /// Events are left undecoded so a single malformed entry cannot
    /// fail the whole payload.
    async fn fetch_events(&self) -> Result<Vec<serde_json::Value>>;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}
