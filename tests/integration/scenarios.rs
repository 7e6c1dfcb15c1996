//! End-to-end episode scenarios across several cycles.

use chrono::{NaiveDate, NaiveDateTime};
use oi_watch::config::AppConfig;
use oi_watch::engine::Monitor;
use oi_watch::storage::HistoryStore;
use oi_watch::types::RawRow;
use tempfile::TempDir;

use crate::mock_source::{render_html, row, row_with, HtmlSource, ScriptedSource};

fn ts(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn config_in(dir: &TempDir) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.path = dir.path().join("data.json").to_string_lossy().to_string();
    cfg
}

fn read_json(dir: &TempDir) -> serde_json::Value {
    let text = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

#[tokio::test]
async fn btc_episode_opens_then_closes_after_ten_minutes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let source = ScriptedSource::new();
    source.push_page(vec![row("BTC", "+7.0%")]);
    source.push_page(vec![row("BTC", "+2.0%")]);

    let monitor = Monitor::with_source(Box::new(source.clone()), &cfg);

    monitor.run_cycle_at(ts(0, 0)).await.unwrap();
    let json = read_json(&dir);
    assert_eq!(json["BTC"]["start_time"], "2024-01-01T00:00:00");
    assert!(json["BTC"]["duration"].is_null());
    assert_eq!(json["BTC"]["records"].as_array().unwrap().len(), 1);

    monitor.run_cycle_at(ts(0, 10)).await.unwrap();
    let json = read_json(&dir);
    assert!(json["BTC"]["start_time"].is_null());
    assert_eq!(json["BTC"]["duration"], 10.0);
    let records = json["BTC"]["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["oi_1h_change"], 7.0);
    assert_eq!(records[1]["oi_1h_change"], 2.0);
    assert_eq!(records[1]["time"], "2024-01-01T00:10:00");
    assert_eq!(source.remaining(), 0);
}

#[tokio::test]
async fn episode_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);

    // Each cycle uses a fresh monitor, as separate cron invocations would.
    for (minute, change) in [(0, "+9.1%"), (5, "+8.0%"), (10, "+6.5%"), (45, "+1.0%")] {
        let source = ScriptedSource::new();
        source.push_page(vec![row("ETH", change)]);
        Monitor::with_source(Box::new(source), &cfg)
            .run_cycle_at(ts(1, minute))
            .await
            .unwrap();
    }

    let history = HistoryStore::new(&cfg.storage.path).load().unwrap();
    let eth = history.get("ETH").unwrap();
    assert!(!eth.is_active());
    assert_eq!(eth.last_duration, Some(45.0));
    assert_eq!(eth.records.len(), 4);
}

#[tokio::test]
async fn continuing_episode_keeps_original_start() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let source = ScriptedSource::new();
    source.push_page(vec![row("SOL", "+6.0%")]);
    source.push_page(vec![row("SOL", "+6.0%")]);
    source.push_page(vec![row("SOL", "+6.0%")]);
    let monitor = Monitor::with_source(Box::new(source), &cfg);

    for minute in [0, 10, 20] {
        monitor.run_cycle_at(ts(2, minute)).await.unwrap();
    }

    let report_history = monitor.store().load().unwrap();
    let sol = report_history.get("SOL").unwrap();
    assert_eq!(sol.episode_start, Some(ts(2, 0)));
    assert!(sol.last_duration.is_none());
    assert_eq!(sol.records.len(), 3);
}

#[tokio::test]
async fn symbol_outside_top_n_is_not_reevaluated() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let source = ScriptedSource::new();

    // Cycle 1: LAGGARD is hot and gets tracked.
    source.push_page(vec![row("LAGGARD", "+6.0%")]);
    // Cycle 2: 20 hotter symbols push LAGGARD (now cold) out of the top 20.
    let mut page: Vec<RawRow> = (0..20)
        .map(|i| row(&format!("HOT{i}"), &format!("+{}%", 10 + i)))
        .collect();
    page.push(row("LAGGARD", "-4.0%"));
    source.push_page(page);

    let monitor = Monitor::with_source(Box::new(source), &cfg);
    monitor.run_cycle_at(ts(3, 0)).await.unwrap();
    let report = monitor.run_cycle_at(ts(3, 30)).await.unwrap();

    assert_eq!(report.selected.len(), 20);
    assert!(report.selected.iter().all(|s| s.symbol != "LAGGARD"));
    assert_eq!(report.selected[0].symbol, "HOT19");
    assert_eq!(report.transitions.opened, 20);
    assert_eq!(report.transitions.stale_active, 1);

    let laggard = report.history.get("LAGGARD").unwrap();
    assert_eq!(laggard.episode_start, Some(ts(3, 0)));
    assert_eq!(laggard.records.len(), 1);
    assert_eq!(report.history.len(), 21);
}

#[tokio::test]
async fn illiquid_symbols_are_never_tracked() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let source = ScriptedSource::new();
    source.push_page(vec![
        row_with("THIN_OI", "$9000000", "320.5亿", "+40%"),
        row_with("THIN_VOL", "615.80亿", "0.2亿", "+40%"),
        row("BTC", "+1.0%"),
    ]);

    let report = Monitor::with_source(Box::new(source), &cfg)
        .run_cycle_at(ts(4, 0))
        .await
        .unwrap();

    assert_eq!(report.history.len(), 1);
    assert!(report.history.get("BTC").is_some());
}

#[tokio::test]
async fn html_page_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let html = render_html(&[
        row("BTC", "+7.25%"),
        RawRow::new(["1", "promo"]),
        row("以太坊", "+5.0%"),
    ]);

    let report = Monitor::with_source(Box::new(HtmlSource { html }), &cfg)
        .run_cycle_at(ts(5, 0))
        .await
        .unwrap();

    assert_eq!(report.rows_fetched, 3);
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.selected[0].symbol, "BTC");
    assert_eq!(report.selected[0].oi_change_1h, 7.25);
    assert!(report.history.get("BTC").unwrap().is_active());
    assert!(!report.history.get("以太坊").unwrap().is_active());

    let text = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
    assert!(text.contains("以太坊"));
}

#[tokio::test]
async fn page_without_table_keeps_history() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let source = ScriptedSource::new();
    source.push_page(vec![row("BTC", "+7.0%")]);
    Monitor::with_source(Box::new(source), &cfg)
        .run_cycle_at(ts(6, 0))
        .await
        .unwrap();
    let before = HistoryStore::new(&cfg.storage.path).load().unwrap();

    let html = "<html><body>Checking your browser…</body></html>".to_string();
    let report = Monitor::with_source(Box::new(HtmlSource { html }), &cfg)
        .run_cycle_at(ts(6, 10))
        .await
        .unwrap();

    assert_eq!(report.rows_fetched, 0);
    assert_eq!(report.history, before);
}

#[tokio::test]
async fn failed_fetch_leaves_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let source = ScriptedSource::new();
    source.push_page(vec![row("BTC", "+7.0%")]);
    source.push_error("connection timed out");
    let monitor = Monitor::with_source(Box::new(source), &cfg);

    monitor.run_cycle_at(ts(7, 0)).await.unwrap();
    let before = std::fs::read_to_string(dir.path().join("data.json")).unwrap();

    let err = monitor.run_cycle_at(ts(7, 10)).await.unwrap_err();
    assert!(err.to_string().contains("timed out"));
    let after = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn retention_caps_record_log() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config_in(&dir);
    cfg.retention.max_records_per_symbol = Some(2);
    let source = ScriptedSource::new();
    for change in ["+1%", "+2%", "+3%", "+4%"] {
        source.push_page(vec![row("XRP", change)]);
    }
    let monitor = Monitor::with_source(Box::new(source), &cfg);

    for minute in 0..4 {
        monitor.run_cycle_at(ts(8, minute)).await.unwrap();
    }

    let history = monitor.store().load().unwrap();
    let xrp = history.get("XRP").unwrap();
    let logged: Vec<f64> = xrp.records.iter().map(|r| r.oi_change_1h).collect();
    assert_eq!(logged, vec![3.0, 4.0]);
}

#[test]
fn blocking_caller_gets_history_back() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config_in(&dir);
    let source = ScriptedSource::new();
    source.push_page(vec![row("BTC", "+7.0%"), row("DOGE", "+5.5%")]);
    let monitor = Monitor::with_source(Box::new(source), &cfg);

    let report = tokio_test::block_on(monitor.run_cycle_at(ts(9, 0))).unwrap();

    assert_eq!(report.history.active_count(), 2);
    assert_eq!(report.transitions.opened, 2);
}
