//! Runner end to end: TOML config and JSON feeds on disk through to artifacts.

use std::path::Path;

use replaylab_core::domain::CancelReason;
use replaylab_runner::export::{export_json, import_json};
use replaylab_runner::{
    load_artifacts, run_batch, run_replay, save_artifacts, LoadError, RunConfig, RunError,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ── Fixtures ─────────────────────────────────────────────────────────

const BARS: &str = r#"[
  {"timestamp": "2024-03-06T21:00:00Z", "symbol": "abc", "open": "52", "high": "53", "low": "51", "close": "52", "volume": "100000"},
  {"timestamp": "2024-03-04T21:00:00Z", "symbol": "abc", "open": "100", "high": "101", "low": "99", "close": "100", "volume": "100000"},
  {"timestamp": "2024-03-05T21:00:00Z", "symbol": "abc", "open": "100", "high": "106", "low": "99", "close": "104", "volume": "100000"},
  {"timestamp": "2024-03-07T21:00:00Z", "symbol": "abc", "open": "52", "high": "54", "low": "51", "close": "53", "volume": "100000"}
]"#;

const INTENTS: &str = r#"[
  {"timestamp": "2024-03-04T21:00:00Z", "symbol": "abc", "side": "buy", "quantity": "10", "order_id": "entry"},
  {"timestamp": "2024-03-04T21:00:00Z", "symbol": "abc", "side": "sell", "quantity": "10", "order_type": "limit", "limit_price": "120", "time_in_force": "day", "parent_order_id": "entry"},
  {"timestamp": "2024-03-07T21:00:00Z", "symbol": "abc", "side": "sell", "quantity": "20"},
  {"timestamp": "2024-03-07T21:00:00Z", "symbol": "abc", "side": "sell", "quantity": "5"}
]"#;

const SPLITS: &str = r#"[
  {"effective_at": "2024-03-06T00:00:00Z", "symbol": "abc", "kind": "split", "split_ratio": "2"}
]"#;

const BORROW: &str = r#"[
  {"effective_at": "2024-03-07T00:00:00Z", "symbol": "abc", "locate_available": false}
]"#;

fn write(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), body).unwrap();
}

fn fixture(dir: &Path, extra: &str) -> RunConfig {
    write(dir, "bars.json", BARS);
    write(dir, "intents.json", INTENTS);
    write(dir, "splits.json", SPLITS);
    write(dir, "borrow.json", BORROW);
    let toml = format!(
        r#"
symbol = "abc"

[data]
bars = "bars.json"
intents = "intents.json"
corporate_actions = "splits.json"
borrow_locate = "borrow.json"

[simulator]
initial_cash = "10000"
commission_per_unit = "0"
{extra}
"#
    );
    write(dir, "run.toml", &toml);
    RunConfig::from_file(&dir.join("run.toml")).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn replays_feeds_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path(), "");
    let report = run_replay(&config).unwrap();

    assert_eq!(report.summary.slices, 4);
    assert_eq!(report.intent_source, "scheduled");

    // Entry fills on day one; its DAY child activates, then expires on day two.
    assert_eq!(report.fills[0].price, dec!(100));
    assert_eq!(report.activations.len(), 1);
    assert_eq!(report.cancellations.len(), 1);
    assert_eq!(report.cancellations[0].reason, CancelReason::Expired);

    // Split doubles the position before day three.
    assert_eq!(report.corporate_actions.len(), 1);
    assert_eq!(report.portfolio[2].position_quantity, dec!(20));
    assert_eq!(report.portfolio[2].average_price, dec!(50));

    // Day four: the sell of 20 closes the long; the extra 5 would open a
    // short and the locate profile has none.
    assert_eq!(report.fills.len(), 2);
    assert_eq!(report.fills[1].realized_pnl_delta, dec!(60));
    assert_eq!(report.summary.locate_rejections, 1);
    let last = report.final_portfolio.as_ref().unwrap();
    assert_eq!(last.position_quantity, Decimal::ZERO);
    assert_eq!(last.cash, dec!(10060));
}

#[test]
fn same_inputs_produce_same_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path(), "");
    let a = run_replay(&config).unwrap();
    let b = run_replay(&config).unwrap();
    assert_eq!(a, b);
    assert_eq!(export_json(&a).unwrap(), export_json(&b).unwrap());
}

#[test]
fn batch_preserves_input_order() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let a = fixture(dir_a.path(), "");
    let b = fixture(dir_b.path(), "slippage_bps = \"5\"");
    let mut missing = a.clone();
    missing.data.bars = dir_a.path().join("absent.json");

    let results = run_batch(&[a.clone(), missing, b]);
    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].as_ref().unwrap().run_id,
        run_replay(&a).unwrap().run_id
    );
    assert!(matches!(
        results[1],
        Err(RunError::Data(LoadError::Missing { feed: "bars", .. }))
    ));
    assert!(results[2].is_ok());
}

#[test]
fn artifacts_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let config = fixture(dir.path(), "");
    let report = run_replay(&config).unwrap();

    let paths = save_artifacts(&report, out.path()).unwrap();
    assert!(paths.report.exists());
    assert!(paths.fills.exists());
    assert!(paths.portfolio.exists());
    assert!(paths.rejections.exists());

    let fills = std::fs::read_to_string(&paths.fills).unwrap();
    assert_eq!(fills.lines().count(), 1 + report.fills.len());
    assert!(fills.starts_with("timestamp,order_id,symbol,side"));
    let portfolio = std::fs::read_to_string(&paths.portfolio).unwrap();
    assert_eq!(portfolio.lines().count(), 5);
    let rejections = std::fs::read_to_string(&paths.rejections).unwrap();
    assert!(rejections.contains("LOCATE_UNAVAILABLE"));

    let loaded = load_artifacts(&paths.dir).unwrap();
    assert_eq!(loaded, report);
}

#[test]
fn newer_schema_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = fixture(dir.path(), "");
    let report = run_replay(&config).unwrap();
    let json = export_json(&report)
        .unwrap()
        .replacen("\"schema_version\": 1", "\"schema_version\": 99", 1);
    assert!(import_json(&json).is_err());
}

#[test]
fn missing_intents_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fixture(dir.path(), "");
    config.data.intents = Some(dir.path().join("gone.json"));
    let err = run_replay(&config).unwrap_err();
    assert!(matches!(
        err,
        RunError::Data(LoadError::Missing { feed: "intents", .. })
    ));
}
