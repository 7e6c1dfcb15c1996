//! Episode tracker — the per-symbol momentum state machine.
//!
//! A symbol is **Idle** while `episode_start` is absent and **Active**
//! while it is set. Every observation appends an audit record; the
//! transition then depends only on whether the 1h OI change is strictly
//! above the momentum threshold:
//!
//! | phase  | elevated | result                                     |
//! |--------|----------|--------------------------------------------|
//! | Idle   | yes      | Active, `episode_start = now`              |
//! | Active | yes      | Active, start unchanged                    |
//! | Active | no       | Idle, `last_duration = now - start` (min)  |
//! | Idle   | no       | Idle                                       |

use chrono::NaiveDateTime;
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::config::{RetentionConfig, SelectionConfig};
use crate::types::{EpisodePhase, EpisodeRecord, History, MetricSample, SymbolState};

// ---------------------------------------------------------------------------
// Transition outcome
// ---------------------------------------------------------------------------

/// What a single observation did to a symbol's episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Idle → Active.
    Opened,
    /// Active → Active; the episode keeps its original start.
    Continued { since: NaiveDateTime },
    /// Active → Idle with the closed episode's length in minutes.
    Closed { duration_minutes: f64 },
    /// Idle → Idle.
    StayedIdle,
}

/// Counts of transitions applied during one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackSummary {
    pub opened: usize,
    pub continued: usize,
    pub closed: usize,
    pub stayed_idle: usize,
    /// Open episodes belonging to symbols that were not observed this cycle.
    pub stale_active: usize,
}

impl TrackSummary {
    fn record(&mut self, t: &Transition) {
        match t {
            Transition::Opened => self.opened += 1,
            Transition::Continued { .. } => self.continued += 1,
            Transition::Closed { .. } => self.closed += 1,
            Transition::StayedIdle => self.stayed_idle += 1,
        }
    }
}

/// Fractional minutes from `start` to `end`, at microsecond resolution.
pub fn minutes_between(start: NaiveDateTime, end: NaiveDateTime) -> f64 {
    let elapsed = end - start;
    let seconds = match elapsed.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => elapsed.num_milliseconds() as f64 / 1_000.0,
    };
    seconds / 60.0
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct EpisodeTracker {
    threshold: f64,
    max_records: Option<usize>,
}

impl Default for EpisodeTracker {
    fn default() -> Self {
        Self::new(&SelectionConfig::default(), &RetentionConfig::default())
    }
}

impl EpisodeTracker {
    pub fn new(selection: &SelectionConfig, retention: &RetentionConfig) -> Self {
        Self {
            threshold: selection.momentum_threshold,
            max_records: retention.max_records_per_symbol,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Strictly above the threshold; equality is not elevated.
    pub fn is_elevated(&self, oi_change_1h: f64) -> bool {
        oi_change_1h > self.threshold
    }

    /// Apply one observation to `state`.
    pub fn observe(
        &self,
        state: &mut SymbolState,
        sample: &MetricSample,
        now: NaiveDateTime,
    ) -> Transition {
        state.records.push(EpisodeRecord::from_sample(sample, now));
        self.enforce_retention(state);

        let elevated = self.is_elevated(sample.oi_change_1h);
        match (state.phase(), elevated) {
            (EpisodePhase::Idle, true) => {
                state.episode_start = Some(now);
                Transition::Opened
            }
            (EpisodePhase::Active { since }, true) => Transition::Continued { since },
            (EpisodePhase::Active { since }, false) => {
                let duration_minutes = minutes_between(since, now);
                if duration_minutes < 0.0 {
                    warn!(
                        symbol = %sample.symbol,
                        start = %since,
                        now = %now,
                        "Episode closed before it started (clock moved backwards)"
                    );
                }
                state.last_duration = Some(duration_minutes);
                state.episode_start = None;
                Transition::Closed { duration_minutes }
            }
            (EpisodePhase::Idle, false) => Transition::StayedIdle,
        }
    }

    fn enforce_retention(&self, state: &mut SymbolState) {
        if let Some(max) = self.max_records {
            if state.records.len() > max {
                let excess = state.records.len() - max;
                state.records.drain(..excess);
            }
        }
    }

    /// Run one transition per selected sample against `history`.
    ///
    /// Symbols absent from `selected` are left untouched, including any
    /// episode they have open.
    pub fn track(
        &self,
        history: &mut History,
        selected: &[MetricSample],
        now: NaiveDateTime,
    ) -> TrackSummary {
        let mut summary = TrackSummary::default();

        for sample in selected {
            let state = history.entry(&sample.symbol);
            let transition = self.observe(state, sample, now);

            match &transition {
                Transition::Opened => info!(
                    symbol = %sample.symbol,
                    oi_change_1h = sample.oi_change_1h,
                    "Momentum episode opened"
                ),
                Transition::Closed { duration_minutes } => info!(
                    symbol = %sample.symbol,
                    oi_change_1h = sample.oi_change_1h,
                    duration_min = format!("{duration_minutes:.1}"),
                    "Momentum episode closed"
                ),
                other => debug!(
                    symbol = %sample.symbol,
                    oi_change_1h = sample.oi_change_1h,
                    transition = ?other,
                    "Symbol observed"
                ),
            }

            summary.record(&transition);
        }

        let observed: HashSet<&str> = selected.iter().map(|s| s.symbol.as_str()).collect();
        summary.stale_active = history
            .iter()
            .filter(|(symbol, state)| state.is_active() && !observed.contains(symbol.as_str()))
            .count();

        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
