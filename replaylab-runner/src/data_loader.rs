//! Feed loading for the runner.
//!
//! Every feed is a JSON array on disk. Loaders apply the same hygiene before
//! anything reaches the engine:
//! 1. rows with a missing (epoch) timestamp or blank symbol are dropped
//! 2. symbols are uppercased, blank sources become `external`
//! 3. negative borrow rates and locate fees are clamped to zero
//! 4. rows are stably sorted by timestamp and capped at `max_rows`
//!
//! A configured path that does not exist is an error; an unconfigured
//! optional feed is simply empty.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use replaylab_core::domain::{
    Bar, BorrowLocateProfile, CorporateAction, DelistEvent, MarketSlice, OrderIntent,
    SymbolMapping,
};
use replaylab_core::engine::{normalize_bars, NormalizationMode, ReferenceFeeds};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RunConfig;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{feed} input not found: {}", path.display())]
    Missing { feed: &'static str, path: PathBuf },

    #[error("failed to read {feed} input {}: {source}", path.display())]
    Io {
        feed: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {feed} input {}: {source}", path.display())]
    Malformed {
        feed: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

const EXTERNAL_SOURCE: &str = "external";

/// All inputs of one replay, cleaned and ready for a session.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// One slice per bar, after price normalization.
    pub slices: Vec<MarketSlice>,
    pub intents: Vec<OrderIntent>,
    pub feeds: ReferenceFeeds,
    /// BLAKE3 over every loaded row, for run fingerprinting.
    pub dataset_hash: String,
}

/// Load every feed a run config names.
pub fn load_run_data(config: &RunConfig) -> Result<LoadedData, LoadError> {
    let max_rows = config.max_rows;
    let paths = &config.data;

    let bars = load_bars(&paths.bars, max_rows)?;
    let intents = load_intents(paths.intents.as_deref(), max_rows)?;
    let feeds = ReferenceFeeds {
        corporate_actions: load_corporate_actions(paths.corporate_actions.as_deref(), max_rows)?,
        borrow_profiles: load_borrow_profiles(paths.borrow_locate.as_deref(), max_rows)?,
        symbol_mappings: load_symbol_mappings(paths.symbol_mappings.as_deref(), max_rows)?,
        delists: load_delists(paths.delists.as_deref(), max_rows)?,
    };

    let dataset_hash = compute_dataset_hash(&bars, &intents, &feeds);
    let bars = match config.simulator.normalization {
        NormalizationMode::Raw => bars,
        mode => normalize_bars(&bars, &feeds.corporate_actions, mode),
    };
    debug!(
        bars = bars.len(),
        intents = intents.len(),
        corporate_actions = feeds.corporate_actions.len(),
        borrow_profiles = feeds.borrow_profiles.len(),
        symbol_mappings = feeds.symbol_mappings.len(),
        delists = feeds.delists.len(),
        "replay inputs loaded"
    );

    Ok(LoadedData {
        slices: bars.into_iter().map(MarketSlice::from_bar).collect(),
        intents,
        feeds,
        dataset_hash,
    })
}

// ── Per-feed loaders ─────────────────────────────────────────────────

pub fn load_bars(path: &Path, max_rows: usize) -> Result<Vec<Bar>, LoadError> {
    let rows: Vec<Bar> = read_json_array("bars", path)?;
    let total = rows.len();
    let bars: Vec<Bar> = rows
        .into_iter()
        .filter(|b| !is_unset(b.timestamp) && !b.symbol.trim().is_empty())
        .filter(|b| {
            let sane = b.is_sane();
            if !sane {
                warn!(symbol = %b.symbol, timestamp = %b.timestamp, "dropping malformed bar");
            }
            sane
        })
        .map(|mut b| {
            b.symbol = normalize_symbol(&b.symbol);
            b
        })
        .collect();
    if bars.len() < total {
        debug!(dropped = total - bars.len(), "bars filtered");
    }
    Ok(sort_and_cap(bars, max_rows, |b| b.timestamp))
}

/// Intents without a timestamp cannot be scheduled and are dropped.
pub fn load_intents(path: Option<&Path>, max_rows: usize) -> Result<Vec<OrderIntent>, LoadError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let rows: Vec<OrderIntent> = read_json_array("intents", path)?;
    let intents: Vec<OrderIntent> = rows
        .into_iter()
        .filter(|i| {
            let keep = i.timestamp.is_some_and(|t| !is_unset(t)) && !i.symbol.trim().is_empty();
            if !keep {
                warn!(symbol = %i.symbol, "dropping intent without timestamp or symbol");
            }
            keep
        })
        .map(|mut i| {
            i.symbol = normalize_symbol(&i.symbol);
            i
        })
        .collect();
    Ok(sort_and_cap(intents, max_rows, |i| {
        i.timestamp.unwrap_or(DateTime::<Utc>::MIN_UTC)
    }))
}

pub fn load_corporate_actions(
    path: Option<&Path>,
    max_rows: usize,
) -> Result<Vec<CorporateAction>, LoadError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let rows: Vec<CorporateAction> = read_json_array("corporate actions", path)?;
    let rows = rows
        .into_iter()
        .filter(|a| !is_unset(a.effective_at) && !a.symbol.trim().is_empty())
        .map(|mut a| {
            a.symbol = normalize_symbol(&a.symbol);
            a.source = default_source(a.source);
            a
        })
        .collect();
    Ok(sort_and_cap(rows, max_rows, |a| a.effective_at))
}

pub fn load_borrow_profiles(
    path: Option<&Path>,
    max_rows: usize,
) -> Result<Vec<BorrowLocateProfile>, LoadError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let rows: Vec<BorrowLocateProfile> = read_json_array("borrow/locate", path)?;
    let rows = rows
        .into_iter()
        .filter(|p| !is_unset(p.effective_at) && !p.symbol.trim().is_empty())
        .map(|mut p| {
            p.symbol = normalize_symbol(&p.symbol);
            p.borrow_rate_bps = p.borrow_rate_bps.max(Decimal::ZERO);
            p.locate_fee_per_share = p.locate_fee_per_share.max(Decimal::ZERO);
            p.source = default_source(p.source);
            p
        })
        .collect();
    Ok(sort_and_cap(rows, max_rows, |p| p.effective_at))
}

pub fn load_symbol_mappings(
    path: Option<&Path>,
    max_rows: usize,
) -> Result<Vec<SymbolMapping>, LoadError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let rows: Vec<SymbolMapping> = read_json_array("symbol mappings", path)?;
    let rows = rows
        .into_iter()
        .filter(|m| {
            !is_unset(m.effective_at)
                && !m.from_symbol.trim().is_empty()
                && !m.to_symbol.trim().is_empty()
        })
        .map(|mut m| {
            m.from_symbol = normalize_symbol(&m.from_symbol);
            m.to_symbol = normalize_symbol(&m.to_symbol);
            m.source = default_source(m.source);
            m
        })
        .collect();
    Ok(sort_and_cap(rows, max_rows, |m| m.effective_at))
}

pub fn load_delists(path: Option<&Path>, max_rows: usize) -> Result<Vec<DelistEvent>, LoadError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let rows: Vec<DelistEvent> = read_json_array("delists", path)?;
    let rows = rows
        .into_iter()
        .filter(|d| !is_unset(d.effective_at) && !d.symbol.trim().is_empty())
        .map(|mut d| {
            d.symbol = normalize_symbol(&d.symbol);
            d.source = default_source(d.source);
            d
        })
        .collect();
    Ok(sort_and_cap(rows, max_rows, |d| d.effective_at))
}

// ── Helpers ──────────────────────────────────────────────────────────

fn read_json_array<T: DeserializeOwned>(feed: &'static str, path: &Path) -> Result<Vec<T>, LoadError> {
    if !path.exists() {
        return Err(LoadError::Missing {
            feed,
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        feed,
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&content).map_err(|source| LoadError::Malformed {
        feed,
        path: path.to_path_buf(),
        source,
    })
}

/// Missing timestamps deserialize to the epoch default.
fn is_unset(ts: DateTime<Utc>) -> bool {
    ts == DateTime::<Utc>::default() || ts == DateTime::<Utc>::MIN_UTC
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

fn default_source(source: String) -> String {
    if source.trim().is_empty() {
        EXTERNAL_SOURCE.to_string()
    } else {
        source
    }
}

fn sort_and_cap<T>(mut rows: Vec<T>, max_rows: usize, key: impl Fn(&T) -> DateTime<Utc>) -> Vec<T> {
    rows.sort_by_key(|r| key(r));
    rows.truncate(max_rows.max(1));
    rows
}

/// Compute a deterministic BLAKE3 hash over every loaded row, feed by feed.
fn compute_dataset_hash(bars: &[Bar], intents: &[OrderIntent], feeds: &ReferenceFeeds) -> String {
    let mut hasher = blake3::Hasher::new();
    let mut feed = |name: &str, json: serde_json::Result<Vec<u8>>| {
        hasher.update(name.as_bytes());
        match json {
            Ok(bytes) => hasher.update(&bytes),
            Err(e) => {
                warn!(feed = name, error = %e, "feed could not be hashed");
                hasher.update(b"unhashable")
            }
        };
    };
    feed("bars", serde_json::to_vec(bars));
    feed("intents", serde_json::to_vec(intents));
    feed("feeds", serde_json::to_vec(feeds));
    hasher.finalize().to_hex().to_string()
}
