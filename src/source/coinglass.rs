//! CoinGlass market overview scraper.
//!
//! Fetches the public overview page and extracts the first HTML table
//! as raw cell text. No API key; a browser-like User-Agent is required
//! to get past trivial bot blocking.
//!
//! Page: `https://www.coinglass.com/zh`
//! Layout: first `<table>`, first `<tr>` is the header, one `<tr>` per asset.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info};

use super::MarketTableSource;
use crate::config::SourceConfig;
use crate::types::{RawRow, WatchError};

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP scraper for the overview table.
pub struct CoinglassSource {
    http: Client,
    url: String,
}

impl CoinglassSource {
    /// Build a scraper for the endpoint and User-Agent in `cfg`.
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("Failed to build HTTP client for CoinGlass")?;

        Ok(Self {
            http,
            url: cfg.url.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn unavailable(&self, message: impl Into<String>) -> WatchError {
        WatchError::SourceUnavailable {
            url: self.url.clone(),
            message: message.into(),
        }
    }

    async fn fetch_html(&self) -> Result<String> {
        debug!(url = %self.url, "Fetching market table page");

        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(self.unavailable(format!("HTTP {status}")).into());
        }

        let body = resp
            .text()
            .await
            .map_err(|e| self.unavailable(format!("failed to read body: {e}")))?;

        Ok(body)
    }
}

#[async_trait]
impl MarketTableSource for CoinglassSource {
    async fn fetch_rows(&self) -> Result<Vec<RawRow>> {
        let html = self.fetch_html().await?;
        let rows = parse_table(&html)?;
        info!(url = %self.url, rows = rows.len(), "Market table scraped");
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Table extraction
// ---------------------------------------------------------------------------

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid CSS selector {css:?}: {e:?}"))
}

/// Extract the data rows of the first `<table>` in `html`.
///
/// The first `<tr>` is treated as the header and skipped. Each remaining
/// row becomes the trimmed text of its `<td>` cells. A document with no
/// table yields no rows.
pub fn parse_table(html: &str) -> Result<Vec<RawRow>> {
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td")?;

    let document = Html::parse_document(html);
    let Some(table) = document.select(&table_sel).next() else {
        debug!("No <table> element in document");
        return Ok(Vec::new());
    };

    let rows = table
        .select(&row_sel)
        .skip(1)
        .map(|row| {
            RawRow::new(
                row.select(&cell_sel)
                    .map(|cell| cell.text().collect::<String>().trim().to_string()),
            )
        })
        .collect();

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
