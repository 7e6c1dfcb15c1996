//! Core engine — normalise → select → track → persist.

pub mod normalizer;
pub mod selector;
pub mod tracker;

use anyhow::Result;
use chrono::{Local, NaiveDateTime, SubsecRound};
use tracing::info;

use crate::config::AppConfig;
use crate::source::coinglass::CoinglassSource;
use crate::source::MarketTableSource;
use crate::storage::HistoryStore;
use crate::types::{History, MetricSample};
use selector::CandidateSelector;
use tracker::{EpisodeTracker, TrackSummary};

// ---------------------------------------------------------------------------
// Cycle report
// ---------------------------------------------------------------------------

/// Summary of one scrape→filter→track→persist cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: NaiveDateTime,
    pub rows_fetched: usize,
    /// Rows dropped for having too few cells.
    pub rows_skipped: usize,
    pub samples_parsed: usize,
    /// Candidates that went through the tracker, in rank order.
    pub selected: Vec<MetricSample>,
    pub transitions: TrackSummary,
    /// The history as written back to disk.
    pub history: History,
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cycle @ {}: {} rows ({} skipped), {} selected | opened {} | continued {} | closed {} | tracked {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.rows_fetched,
            self.rows_skipped,
            self.selected.len(),
            self.transitions.opened,
            self.transitions.continued,
            self.transitions.closed,
            self.history.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// One-shot pipeline over a market table source and a history store.
///
/// Any failure aborts the cycle before the history is written, so the
/// file on disk always reflects a complete previous cycle.
pub struct Monitor {
    source: Box<dyn MarketTableSource>,
    selector: CandidateSelector,
    tracker: EpisodeTracker,
    store: HistoryStore,
}

impl Monitor {
    pub fn new(
        source: Box<dyn MarketTableSource>,
        selector: CandidateSelector,
        tracker: EpisodeTracker,
        store: HistoryStore,
    ) -> Self {
        Self {
            source,
            selector,
            tracker,
            store,
        }
    }

    /// Production wiring: HTTP scraper plus file store, both from `cfg`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let source = CoinglassSource::new(&cfg.source)?;
        Ok(Self::with_source(Box::new(source), cfg))
    }

    /// Config-driven wiring around a caller-supplied source.
    pub fn with_source(source: Box<dyn MarketTableSource>, cfg: &AppConfig) -> Self {
        Self::new(
            source,
            CandidateSelector::new(&cfg.selection),
            EpisodeTracker::new(&cfg.selection, &cfg.retention),
            HistoryStore::new(&cfg.storage.path),
        )
    }

    pub fn store(&self) -> &HistoryStore {
        &self.store
    }

    /// Run one cycle stamped with the local wall clock.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_cycle_at(Local::now().naive_local()).await
    }

    /// Run one cycle with an explicit timestamp.
    ///
    /// `now` is truncated to microseconds, the resolution of the history file.
    pub async fn run_cycle_at(&self, now: NaiveDateTime) -> Result<CycleReport> {
        let now = now.trunc_subsecs(6);
        info!(at = %now, "Starting cycle");

        // 1. Scrape
        let rows = self.source.fetch_rows().await?;
        let rows_fetched = rows.len();

        // 2. Normalise
        let batch = normalizer::normalize_rows(&rows)?;
        let samples_parsed = batch.samples.len();

        // 3. Select
        let selected = self.selector.select(batch.samples);

        // 4. Track
        let mut history = self.store.load()?;
        let transitions = self.tracker.track(&mut history, &selected, now);

        // 5. Persist
        self.store.save(&history)?;

        Ok(CycleReport {
            timestamp: now,
            rows_fetched,
            rows_skipped: batch.skipped_rows,
            samples_parsed,
            selected,
            transitions,
            history,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
