//! Artifact export: JSON report plus CSV tables.
//!
//! A run directory holds:
//! - `report.json`: the full `ReplayReport`, with `schema_version`
//! - `fills.csv`: one row per fill
//! - `portfolio.csv`: one snapshot per slice
//! - `rejections.csv`: locate, settled-cash and margin rejections in time order
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use replaylab_core::domain::{Fill, OrderId, OrderSide, PortfolioSnapshot};
use rust_decimal::Decimal;

use crate::runner::{ReplayReport, SCHEMA_VERSION};

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &ReplayReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize ReplayReport to JSON")
}

/// Deserialize a `ReplayReport`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<ReplayReport> {
    let report: ReplayReport =
        serde_json::from_str(json).context("failed to deserialize ReplayReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

pub fn export_fills_csv(fills: &[Fill]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "order_id",
        "symbol",
        "side",
        "order_type",
        "quantity",
        "requested_quantity",
        "remaining_quantity",
        "is_partial",
        "price",
        "commission",
        "realized_pnl_delta",
        "submitted_at",
        "source",
    ])?;
    for f in fills {
        wtr.write_record([
            ts(f.timestamp),
            f.order_id.to_string(),
            f.symbol.clone(),
            f.side.to_string(),
            f.order_type.to_string(),
            f.quantity.to_string(),
            f.requested_quantity.to_string(),
            f.remaining_quantity.to_string(),
            f.is_partial.to_string(),
            f.price.to_string(),
            f.commission.to_string(),
            f.realized_pnl_delta.to_string(),
            ts(f.submitted_at),
            f.source.clone(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_portfolio_csv(snapshots: &[PortfolioSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "symbol",
        "position_quantity",
        "average_price",
        "market_price",
        "cash",
        "settled_cash",
        "unsettled_cash",
        "realized_pnl",
        "unrealized_pnl",
        "equity",
    ])?;
    for p in snapshots {
        wtr.write_record([
            ts(p.timestamp),
            p.symbol.clone(),
            p.position_quantity.to_string(),
            p.average_price.to_string(),
            p.market_price.to_string(),
            p.cash.to_string(),
            p.settled_cash.to_string(),
            p.unsettled_cash.to_string(),
            p.realized_pnl.to_string(),
            p.unrealized_pnl.to_string(),
            p.equity.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One rejection of any kind, flattened for the CSV table.
struct RejectionRow<'a> {
    timestamp: DateTime<Utc>,
    reason: &'static str,
    order_id: &'a OrderId,
    symbol: &'a str,
    side: OrderSide,
    quantity: Decimal,
    detail: String,
    source: &'a str,
}

/// All rejections merged into one table, stably ordered by timestamp
/// (locate, then settled cash, then margin within a timestamp).
pub fn export_rejections_csv(report: &ReplayReport) -> Result<String> {
    let mut rows: Vec<RejectionRow<'_>> = Vec::new();
    rows.extend(report.locate_rejections.iter().map(|r| RejectionRow {
        timestamp: r.timestamp,
        reason: r.reason.as_str(),
        order_id: &r.order_id,
        symbol: &r.symbol,
        side: r.side,
        quantity: r.quantity,
        detail: format!(
            "locate_available={} locate_fee_per_share={}",
            r.locate_available, r.locate_fee_per_share
        ),
        source: &r.source,
    }));
    rows.extend(report.cash_rejections.iter().map(|r| RejectionRow {
        timestamp: r.timestamp,
        reason: r.reason.as_str(),
        order_id: &r.order_id,
        symbol: &r.symbol,
        side: r.side,
        quantity: r.quantity,
        detail: format!(
            "required={} available={}",
            r.required_settled_cash, r.available_settled_cash
        ),
        source: &r.source,
    }));
    rows.extend(report.margin_rejections.iter().map(|r| RejectionRow {
        timestamp: r.timestamp,
        reason: r.reason.as_str(),
        order_id: &r.order_id,
        symbol: &r.symbol,
        side: r.side,
        quantity: r.quantity,
        detail: format!(
            "fill_price={} projected_equity={} projected_initial_margin={}",
            r.fill_price, r.projected_equity, r.projected_initial_margin
        ),
        source: &r.source,
    }));
    rows.sort_by_key(|r| r.timestamp);

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp", "reason", "order_id", "symbol", "side", "quantity", "detail", "source",
    ])?;
    for r in &rows {
        wtr.write_record([
            ts(r.timestamp),
            r.reason.to_string(),
            r.order_id.to_string(),
            r.symbol.to_string(),
            r.side.to_string(),
            r.quantity.to_string(),
            r.detail.clone(),
            r.source.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Paths of a saved run's artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub report: PathBuf,
    pub fills: PathBuf,
    pub portfolio: PathBuf,
    pub rejections: PathBuf,
}

/// Save the full artifact set under `output_dir/{symbol}_{run_id prefix}/`.
///
/// The directory name depends only on the report, so rerunning the same
/// config on the same data overwrites the same artifacts.
pub fn save_artifacts(report: &ReplayReport, output_dir: &Path) -> Result<ArtifactPaths> {
    let prefix: String = report.run_id.chars().take(12).collect();
    let dir = output_dir.join(format!("{}_{}", report.symbol, prefix));
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create artifact dir: {}", dir.display()))?;

    let paths = ArtifactPaths {
        report: dir.join("report.json"),
        fills: dir.join("fills.csv"),
        portfolio: dir.join("portfolio.csv"),
        rejections: dir.join("rejections.csv"),
        dir,
    };
    write(&paths.report, &export_json(report)?)?;
    write(&paths.fills, &export_fills_csv(&report.fills)?)?;
    write(&paths.portfolio, &export_portfolio_csv(&report.portfolio)?)?;
    write(&paths.rejections, &export_rejections_csv(report)?)?;
    Ok(paths)
}

/// Load a `ReplayReport` from an artifact directory's report.json.
pub fn load_artifacts(dir: &Path) -> Result<ReplayReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))
}
