//! The Odds API v4 integration.
//!
//! API docs: https://the-odds-api.com/liveapi/guides/v4/
//! Endpoint: `GET /v4/sports/{sport}/odds`
//! Auth: `apiKey` query parameter.
//! Quota: every response carries `x-requests-remaining` / `x-requests-used`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::OddsProvider;
use crate::types::MarketType;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

pub const DEFAULT_BASE_URL: &str = "https://api.the-odds-api.com/v4";
const PROVIDER_NAME: &str = "the-odds-api";

/// Request settings for the odds endpoint.
#[derive(Debug, Clone)]
pub struct OddsApiSettings {
    pub base_url: String,
    /// Provider sport key, e.g. `baseball_mlb`.
    pub sport_key: String,
    /// Bookmaker regions, e.g. `us`.
    pub regions: String,
    pub markets: Vec<MarketType>,
    /// Must be `american` for the normalizer to read prices correctly.
    pub odds_format: String,
    pub timeout: Duration,
}

impl Default for OddsApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            sport_key: "baseball_mlb".to_string(),
            regions: "us".to_string(),
            markets: MarketType::ALL.to_vec(),
            odds_format: "american".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl OddsApiSettings {
    /// Odds endpoint URL (without query string).
    pub fn odds_url(&self) -> String {
        format!(
            "{}/sports/{}/odds",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.sport_key),
        )
    }

    /// Comma-joined `markets` parameter.
    pub fn markets_param(&self) -> String {
        self.markets
            .iter()
            .map(MarketType::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Request quota reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub remaining: Option<u64>,
    pub used: Option<u64>,
}

impl Quota {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let read = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|v| v as u64)
        };
        Self {
            remaining: read("x-requests-remaining"),
            used: read("x-requests-used"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// The Odds API client.
pub struct OddsApiClient {
    http: Client,
    api_key: SecretString,
    settings: OddsApiSettings,
}

impl OddsApiClient {
    pub fn new(api_key: SecretString, settings: OddsApiSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .user_agent("ODDSWATCH/0.1.0")
            .build()
            .context("Failed to build HTTP client for The Odds API")?;

        Ok(Self { http, api_key, settings })
    }

    pub fn settings(&self) -> &OddsApiSettings {
        &self.settings
    }
}

#[async_trait]
impl OddsProvider for OddsApiClient {
    async fn fetch_events(&self) -> Result<Vec<Value>> {
        let url = self.settings.odds_url();
        let markets = self.settings.markets_param();

        debug!(url = %url, markets = %markets, "Fetching odds");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("apiKey", self.api_key.expose_secret().as_str()),
                ("regions", self.settings.regions.as_str()),
                ("markets", markets.as_str()),
                ("oddsFormat", self.settings.odds_format.as_str()),
            ])
            .send()
            .await
            .context("Odds API request failed")?;

        let quota = Quota::from_headers(resp.headers());
        if let Some(remaining) = quota.remaining {
            if remaining < 50 {
                warn!(remaining, used = ?quota.used, "Odds API quota running low");
            } else {
                debug!(remaining, used = ?quota.used, "Odds API quota");
            }
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Odds API error {status}: {body}");
        }

        let events: Vec<Value> = resp
            .json()
            .await
            .context("Failed to parse Odds API response as an event list")?;

        info!(
            sport = %self.settings.sport_key,
            events = events.len(),
            "Odds fetched"
        );

        Ok(events)
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
