//! One polling cycle: fetch → normalize → detect → estimate → persist.
//!
//! `CycleRunner::process` is the pure part and never touches the network
//! or the database. `run_cycle` wraps it with the provider fetch and the
//! store append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use tracing::info;
use uuid::Uuid;

use super::normalizer::{NormalizedBatch, NormalizerConfig, QuoteNormalizer};
use crate::platforms::OddsProvider;
use crate::storage::OddsStore;
use crate::strategy::edge::{DetectionConfig, MispricingDetector};
use crate::strategy::exposure::ExposureEstimator;
use crate::types::{ExposureRecord, MispricingRecord};

// ---------------------------------------------------------------------------
// Pure pipeline
// ---------------------------------------------------------------------------

/// Everything one cycle produces.
#[derive(Debug, Clone, Default)]
pub struct CycleOutput {
    pub batch: NormalizedBatch,
    pub mispricings: Vec<MispricingRecord>,
    pub exposures: Vec<ExposureRecord>,
}

/// Normalizer, detector and estimator wired together.
pub struct CycleRunner {
    normalizer: QuoteNormalizer,
    detector: MispricingDetector,
    estimator: ExposureEstimator,
}

impl CycleRunner {
    pub fn new(normalizer: NormalizerConfig, detection: DetectionConfig) -> Self {
        Self {
            normalizer: QuoteNormalizer::new(normalizer),
            detector: MispricingDetector::new(detection),
            estimator: ExposureEstimator::new(),
        }
    }

    pub fn normalizer(&self) -> &QuoteNormalizer {
        &self.normalizer
    }

    pub fn detector(&self) -> &MispricingDetector {
        &self.detector
    }

    /// Normalize the whole payload, then run detection and exposure over
    /// the successfully normalized quotes.
    pub fn process(&self, payload: &[Value], now: DateTime<Utc>) -> CycleOutput {
        let batch = self.normalizer.normalize_batch(payload, now);
        let mispricings = self.detector.detect(&batch.quotes, now);
        let exposures = self.estimator.estimate(&batch.quotes, now);
        CycleOutput { batch, mispricings, exposures }
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Summary of a completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub events_seen: usize,
    pub stale_events: usize,
    pub malformed_events: usize,
    pub quotes: usize,
    pub skipped_quotes: usize,
    pub mispricings: usize,
    pub exposures: usize,
    pub quotes_persisted: u64,
}

impl CycleReport {
    fn from_output(cycle_id: Uuid, output: &CycleOutput) -> Self {
        Self {
            cycle_id,
            events_seen: output.batch.events_seen,
            stale_events: output.batch.stale_events,
            malformed_events: output.batch.malformed.len(),
            quotes: output.batch.quotes.len(),
            skipped_quotes: output.batch.skipped.len(),
            mispricings: output.mispricings.len(),
            exposures: output.exposures.len(),
            quotes_persisted: 0,
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle {} | events: {} (stale {}, malformed {}) | quotes: {} (+{} skipped, {} saved) | mispricings: {} | exposures: {}",
            self.cycle_id,
            self.events_seen,
            self.stale_events,
            self.malformed_events,
            self.quotes,
            self.skipped_quotes,
            self.quotes_persisted,
            self.mispricings,
            self.exposures,
        )
    }
}

// ---------------------------------------------------------------------------
// Full cycle
// ---------------------------------------------------------------------------

/// Fetch, process and persist one cycle.
///
/// Fetch and storage failures propagate; the caller decides when to retry.
pub async fn run_cycle(
    provider: &dyn OddsProvider,
    store: &OddsStore,
    runner: &CycleRunner,
    now: DateTime<Utc>,
) -> Result<CycleReport> {
    let cycle_id = Uuid::new_v4();
    let payload = provider.fetch_events().await?;
    let output = runner.process(&payload, now);
    let mut report = CycleReport::from_output(cycle_id, &output);

    if output.batch.quotes.is_empty() {
        info!(cycle_id = %cycle_id, events = payload.len(), "No games with odds currently available");
        return Ok(report);
    }

    let persisted = store
        .append_cycle(
            cycle_id,
            &output.batch.quotes,
            &output.mispricings,
            &output.exposures,
        )
        .await?;
    report.quotes_persisted = persisted.quotes;

    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
