//! Persistence layer.
//!
//! Saves and loads the per-symbol episode history to/from a JSON file.
//! Entries are validated one by one on load; entries that do not match
//! the `SymbolState` schema are moved to a sidecar quarantine file so a
//! single bad entry cannot poison later runs.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::types::{History, SymbolState, WatchError};

/// JSON-file backed history store.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file holding entries rejected on load.
    pub fn quarantine_path(&self) -> PathBuf {
        self.path.with_extension("quarantine.json")
    }

    fn persistence_error(&self, message: impl Into<String>) -> WatchError {
        WatchError::Persistence {
            path: self.path.display().to_string(),
            message: message.into(),
        }
    }

    /// Load the history. Returns an empty history if the file doesn't exist.
    pub fn load(&self) -> Result<History> {
        let Some(json) = read_if_present(&self.path)
            .map_err(|e| self.persistence_error(format!("read failed: {e}")))?
        else {
            info!(path = %self.path.display(), "No saved history found, starting fresh");
            return Ok(History::new());
        };

        let raw: Map<String, Value> = serde_json::from_str(&json)
            .map_err(|e| self.persistence_error(format!("not a JSON object: {e}")))?;

        let mut history = History::new();
        let mut rejected = Map::new();

        for (symbol, value) in raw {
            match validate_entry(&symbol, value.clone()) {
                Ok(state) => history.insert(symbol, state),
                Err(reason) => {
                    warn!(symbol = %symbol, reason = %reason, "Quarantining malformed history entry");
                    rejected.insert(symbol, value);
                }
            }
        }

        if !rejected.is_empty() {
            self.quarantine(rejected)?;
        }

        info!(
            path = %self.path.display(),
            symbols = history.len(),
            active = history.active_count(),
            "History loaded from disk"
        );

        Ok(history)
    }

    /// Persist the full history, replacing the previous file.
    ///
    /// Written to a temp file next to the target and renamed over it, so a
    /// crash mid-write leaves the previous history intact.
    pub fn save(&self, history: &History) -> Result<()> {
        let json = serde_json::to_string_pretty(history).context("Failed to serialise history")?;
        write_atomic(&self.path, &json)
            .map_err(|e| self.persistence_error(format!("write failed: {e}")))?;

        debug!(path = %self.path.display(), symbols = history.len(), "History saved");
        Ok(())
    }

    /// Delete the history file (for testing or reset).
    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to delete history file {}", self.path.display()))?;
        }
        Ok(())
    }

    /// Merge rejected entries into the quarantine file.
    fn quarantine(&self, rejected: Map<String, Value>) -> Result<()> {
        let path = self.quarantine_path();

        let existing = read_if_present(&path)
            .with_context(|| format!("Failed to read quarantine file {}", path.display()))?;
        let mut existing: Map<String, Value> = match existing {
            Some(text) => serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse quarantine file {}", path.display()))?,
            None => Map::new(),
        };
        let count = rejected.len();
        existing.extend(rejected);

        let json = serde_json::to_string_pretty(&Value::Object(existing))
            .context("Failed to serialise quarantine entries")?;
        write_atomic(&path, &json)
            .with_context(|| format!("Failed to write quarantine file {}", path.display()))?;

        warn!(path = %path.display(), entries = count, "Malformed entries quarantined");
        Ok(())
    }
}

/// Check one persisted entry against the `SymbolState` schema.
fn validate_entry(symbol: &str, value: Value) -> std::result::Result<SymbolState, String> {
    if symbol.trim().is_empty() {
        return Err("empty symbol key".to_string());
    }
    serde_json::from_value(value).map_err(|e| e.to_string())
}

/// File contents, or `None` only when the file does not exist.
fn read_if_present(path: &Path) -> std::io::Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
