//! Shared types for OI-WATCH.
//!
//! These types form the data model used across all modules: the raw
//! scraped row, the normalised per-symbol sample, and the persisted
//! per-symbol episode state.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// One scraped table row: the trimmed text of each `<td>` cell, in order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawRow {
    pub cells: Vec<String>,
}

impl RawRow {
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell text at `idx`, or `""` when the row is too short.
    pub fn cell(&self, idx: usize) -> &str {
        self.cells.get(idx).map(String::as_str).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Metric sample
// ---------------------------------------------------------------------------

/// One normalised observation for one symbol at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub symbol: String,
    /// Open interest in USD.
    pub open_interest: f64,
    /// 1-hour open-interest change, percent.
    pub oi_change_1h: f64,
    /// 24-hour open-interest change, percent.
    pub oi_change_24h: f64,
    /// 24-hour traded volume in USD.
    pub volume_24h: f64,
    /// 24-hour volume change, percent.
    pub volume_change_24h: f64,
}

impl fmt::Display for MetricSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (OI: ${:.0} | 1h: {:+.2}% | 24h: {:+.2}% | vol: ${:.0} ({:+.2}%))",
            self.symbol,
            self.open_interest,
            self.oi_change_1h,
            self.oi_change_24h,
            self.volume_24h,
            self.volume_change_24h,
        )
    }
}

impl MetricSample {
    /// Helper to build a test sample with liquid defaults.
    #[cfg(test)]
    pub fn sample(symbol: &str, oi_change_1h: f64) -> Self {
        MetricSample {
            symbol: symbol.to_string(),
            open_interest: 50_000_000.0,
            oi_change_1h,
            oi_change_24h: 1.0,
            volume_24h: 80_000_000.0,
            volume_change_24h: -4.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted episode state
// ---------------------------------------------------------------------------

/// One logged observation appended to a symbol's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    #[serde(rename = "time")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "oi")]
    pub open_interest: f64,
    #[serde(rename = "oi_1h_change")]
    pub oi_change_1h: f64,
    #[serde(rename = "volume_24h_change")]
    pub volume_change_24h: f64,
}

impl EpisodeRecord {
    pub fn from_sample(sample: &MetricSample, timestamp: NaiveDateTime) -> Self {
        Self {
            timestamp,
            open_interest: sample.open_interest,
            oi_change_1h: sample.oi_change_1h,
            volume_change_24h: sample.volume_change_24h,
        }
    }
}

/// Persistent state for one symbol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolState {
    /// Chronological, append-only audit log.
    pub records: Vec<EpisodeRecord>,
    /// Set while the symbol is inside an elevated-momentum episode.
    #[serde(rename = "start_time", default)]
    pub episode_start: Option<NaiveDateTime>,
    /// Minutes spent in the most recently closed episode.
    #[serde(rename = "duration", default)]
    pub last_duration: Option<f64>,
}

/// Episode phase derived from a [`SymbolState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodePhase {
    Idle,
    Active { since: NaiveDateTime },
}

impl fmt::Display for EpisodePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EpisodePhase::Idle => write!(f, "Idle"),
            EpisodePhase::Active { since } => write!(f, "Active since {since}"),
        }
    }
}

impl SymbolState {
    pub fn phase(&self) -> EpisodePhase {
        match self.episode_start {
            Some(since) => EpisodePhase::Active { since },
            None => EpisodePhase::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.episode_start.is_some()
    }

    pub fn latest_record(&self) -> Option<&EpisodeRecord> {
        self.records.last()
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Full persisted mapping of symbol → state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(BTreeMap<String, SymbolState>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&SymbolState> {
        self.0.get(symbol)
    }

    /// State for `symbol`, inserting an empty Idle state on first sighting.
    pub fn entry(&mut self, symbol: &str) -> &mut SymbolState {
        self.0.entry(symbol.to_string()).or_default()
    }

    pub fn insert(&mut self, symbol: impl Into<String>, state: SymbolState) {
        self.0.insert(symbol.into(), state);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SymbolState)> {
        self.0.iter()
    }

    /// Number of symbols currently inside an open episode.
    pub fn active_count(&self) -> usize {
        self.0.values().filter(|s| s.is_active()).count()
    }
}

impl FromIterator<(String, SymbolState)> for History {
    fn from_iter<T: IntoIterator<Item = (String, SymbolState)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for OI-WATCH.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("Source unavailable ({url}): {message}")]
    SourceUnavailable { url: String, message: String },

    #[error("Cannot parse {value:?} as a number")]
    ParseFailure { value: String },

    #[error("Persistence error ({path}): {message}")]
    Persistence { path: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
