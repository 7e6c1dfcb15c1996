//! Market-data table sources.
//!
//! Defines the `MarketTableSource` trait and provides the HTML table
//! scraper used in production.

pub mod coinglass;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::RawRow;

/// Abstraction over the upstream market table.
///
/// Implementors yield the data rows of the table (header excluded) as raw
/// cell text. A page without the expected table yields an empty list, not
/// an error; transport failures are errors.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketTableSource: Send + Sync {
    /// Fetch the current table rows.
    async fn fetch_rows(&self) -> Result<Vec<RawRow>>;
}
