//! OI-WATCH — open-interest momentum episode tracker
//!
//! Entry point. Loads configuration (defaults when `config.toml` is
//! absent), initialises structured logging, and runs exactly one
//! scrape→filter→track→persist cycle. Scheduling is left to cron or a
//! systemd timer.

use anyhow::Result;
use tracing::info;

use oi_watch::config::{self, AppConfig};
use oi_watch::engine::{CycleReport, Monitor};

const CONFIG_FILE: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::load_or_default(CONFIG_FILE)?;

    init_logging(&cfg.logging);

    info!(
        url = %cfg.source.url,
        history = %cfg.storage.path,
        threshold = cfg.selection.momentum_threshold,
        top_n = cfg.selection.top_n,
        "OI-WATCH starting"
    );

    let monitor = Monitor::from_config(&cfg)?;
    let report = monitor.run_cycle().await?;
    log_cycle_report(&report);

    Ok(())
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    let leader = report
        .selected
        .first()
        .map(|s| format!("{} {:+.2}%", s.symbol, s.oi_change_1h))
        .unwrap_or_else(|| "-".to_string());

    info!(
        rows = report.rows_fetched,
        skipped = report.rows_skipped,
        samples = report.samples_parsed,
        selected = report.selected.len(),
        leader = %leader,
        opened = report.transitions.opened,
        continued = report.transitions.continued,
        closed = report.transitions.closed,
        stale_open = report.transitions.stale_active,
        active = report.history.active_count(),
        tracked = report.history.len(),
        "Cycle complete"
    );
}

/// Initialise the `tracing` subscriber.
fn init_logging(cfg: &config::LoggingConfig) {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_new(&cfg.level)
        .unwrap_or_else(|_| EnvFilter::new("oi_watch=info"));

    if cfg.json {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
