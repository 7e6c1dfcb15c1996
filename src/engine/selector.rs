//! Candidate selector — liquidity filter and momentum ranking.

use tracing::debug;

use crate::config::SelectionConfig;
use crate::types::MetricSample;

/// Keeps liquid assets and ranks them by 1h OI change.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    min_open_interest: f64,
    min_volume_24h: f64,
    top_n: usize,
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::new(&SelectionConfig::default())
    }
}

impl CandidateSelector {
    pub fn new(cfg: &SelectionConfig) -> Self {
        Self {
            min_open_interest: cfg.min_open_interest,
            min_volume_24h: cfg.min_volume_24h,
            top_n: cfg.top_n,
        }
    }

    fn is_liquid(&self, s: &MetricSample) -> bool {
        s.open_interest > self.min_open_interest && s.volume_24h > self.min_volume_24h
    }

    /// Filter, sort descending by `oi_change_1h` (stable), truncate to `top_n`.
    pub fn select(&self, samples: Vec<MetricSample>) -> Vec<MetricSample> {
        let total = samples.len();
        let mut liquid: Vec<MetricSample> =
            samples.into_iter().filter(|s| self.is_liquid(s)).collect();
        let liquid_count = liquid.len();

        liquid.sort_by(|a, b| b.oi_change_1h.total_cmp(&a.oi_change_1h));
        liquid.truncate(self.top_n);

        debug!(
            total,
            liquid = liquid_count,
            selected = liquid.len(),
            "Candidates selected"
        );

        liquid
    }
}
