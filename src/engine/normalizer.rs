//! Row normaliser — raw table cells → typed `MetricSample`.
//!
//! Column layout of the overview table (zero-based):
//!
//! | idx | column              |
//! |-----|---------------------|
//! | 2   | symbol              |
//! | 6   | 24h volume          |
//! | 7   | 24h volume change % |
//! | 9   | open interest       |
//! | 10  | 1h OI change %      |
//! | 11  | 24h OI change %     |

use tracing::debug;

use crate::types::{MetricSample, RawRow, WatchError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Rows with fewer cells than this are malformed and skipped.
pub const MIN_CELLS: usize = 12;

const COL_SYMBOL: usize = 2;
const COL_VOLUME_24H: usize = 6;
const COL_VOLUME_CHANGE_24H: usize = 7;
const COL_OPEN_INTEREST: usize = 9;
const COL_OI_CHANGE_1H: usize = 10;
const COL_OI_CHANGE_24H: usize = 11;

/// The "hundred million" (亿) unit suffix.
const HUNDRED_MILLION_SUFFIX: char = '亿';
const HUNDRED_MILLION: f64 = 100_000_000.0;

// ---------------------------------------------------------------------------
// Numeric parsing
// ---------------------------------------------------------------------------

/// Parse a localised table value into a plain number.
///
/// - `"615.80亿"` → `61_580_000_000.0`
/// - `"+3.2%"` → `3.2`, `"-1.5%"` → `-1.5`
/// - `"$42.0"` → `42.0`
/// - `""` → `0.0`
///
/// Non-finite results (`"nan%"`, `"inf亿"`) are parse failures.
pub fn parse_value(raw: &str) -> Result<f64, WatchError> {
    let fail = || WatchError::ParseFailure {
        value: raw.to_string(),
    };

    let value: f64 = if raw.contains(HUNDRED_MILLION_SUFFIX) {
        let digits = raw.replace(HUNDRED_MILLION_SUFFIX, "").replace('$', "");
        let base: f64 = digits.trim().parse().map_err(|_| fail())?;
        base * HUNDRED_MILLION
    } else if raw.contains('%') {
        let digits = raw.replace('%', "").replace('+', "");
        digits.trim().parse().map_err(|_| fail())?
    } else if raw.is_empty() {
        0.0
    } else {
        raw.replace('$', "").trim().parse().map_err(|_| fail())?
    };

    // NaN and infinities cannot be written to the history file as JSON.
    if !value.is_finite() {
        return Err(fail());
    }

    Ok(value)
}

// ---------------------------------------------------------------------------
// Row normalisation
// ---------------------------------------------------------------------------

/// Output of normalising one batch of rows.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub samples: Vec<MetricSample>,
    /// Rows dropped for having fewer than [`MIN_CELLS`] cells.
    pub skipped_rows: usize,
}

/// Convert one row. `Ok(None)` for a short row; `Err` when a numeric
/// cell cannot be parsed.
pub fn normalize_row(row: &RawRow) -> Result<Option<MetricSample>, WatchError> {
    if row.len() < MIN_CELLS {
        return Ok(None);
    }

    let sample = MetricSample {
        symbol: row.cell(COL_SYMBOL).trim().to_string(),
        open_interest: parse_value(row.cell(COL_OPEN_INTEREST))?,
        oi_change_1h: parse_value(row.cell(COL_OI_CHANGE_1H))?,
        oi_change_24h: parse_value(row.cell(COL_OI_CHANGE_24H))?,
        volume_24h: parse_value(row.cell(COL_VOLUME_24H))?,
        volume_change_24h: parse_value(row.cell(COL_VOLUME_CHANGE_24H))?,
    };

    Ok(Some(sample))
}

/// Normalise a whole batch, counting short rows. The first parse failure
/// aborts the batch.
pub fn normalize_rows(rows: &[RawRow]) -> Result<NormalizedBatch, WatchError> {
    let mut batch = NormalizedBatch::default();

    for row in rows {
        match normalize_row(row)? {
            Some(sample) => batch.samples.push(sample),
            None => batch.skipped_rows += 1,
        }
    }

    debug!(
        rows = rows.len(),
        samples = batch.samples.len(),
        skipped = batch.skipped_rows,
        "Rows normalised"
    );

    Ok(batch)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
