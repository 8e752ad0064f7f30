//! Serializable replay run configuration, loaded from TOML.
//!
//! ```toml
//! symbol = "ABC"
//! max_rows = 100000
//!
//! [data]
//! bars = "bars.json"
//! intents = "intents.json"
//! corporate_actions = "corporate_actions.json"
//!
//! [simulator]
//! initial_cash = "100000"
//! commission_per_unit = "0.005"
//! normalization = "split-adjusted"
//! ```

use std::path::{Path, PathBuf};

use replaylab_core::engine::SimulatorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier for a replay run (content-addressable hash).
pub type RunId = String;

/// Default cap on rows read from any single feed file.
pub const DEFAULT_MAX_ROWS: usize = 1_000_000;

/// Errors from loading or validating a run config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config has no symbol")]
    MissingSymbol,

    #[error("config has no bars path")]
    MissingBars,

    #[error("max_rows must be at least 1")]
    ZeroMaxRows,

    #[error("invalid simulator settings: {0}")]
    Simulator(#[from] replaylab_core::ConfigError),

    #[error("config could not be fingerprinted: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// Feed file locations. Relative paths resolve against the config file's directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPaths {
    pub bars: PathBuf,
    #[serde(default)]
    pub intents: Option<PathBuf>,
    #[serde(default)]
    pub corporate_actions: Option<PathBuf>,
    #[serde(default)]
    pub borrow_locate: Option<PathBuf>,
    #[serde(default)]
    pub symbol_mappings: Option<PathBuf>,
    #[serde(default)]
    pub delists: Option<PathBuf>,
}

impl DataPaths {
    fn resolve_against(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.bars);
        for p in [
            &mut self.intents,
            &mut self.corporate_actions,
            &mut self.borrow_locate,
            &mut self.symbol_mappings,
            &mut self.delists,
        ]
        .into_iter()
        .flatten()
        {
            join(p);
        }
    }
}

/// Everything needed to reproduce one replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Symbol the replay starts on. Renames in the mapping feed move it.
    pub symbol: String,
    pub data: DataPaths,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

impl RunConfig {
    pub fn new(symbol: &str, bars: impl Into<PathBuf>) -> Self {
        Self {
            symbol: symbol.to_string(),
            data: DataPaths {
                bars: bars.into(),
                ..DataPaths::default()
            },
            simulator: SimulatorConfig::default(),
            max_rows: DEFAULT_MAX_ROWS,
        }
    }

    /// Load from a TOML file, resolving data paths against its directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.data.resolve_against(base);
        }
        Ok(config)
    }

    /// Parse and validate. Paths are left as written.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(content)?;
        config.symbol = config.symbol.trim().to_ascii_uppercase();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::MissingSymbol);
        }
        if self.data.bars.as_os_str().is_empty() {
            return Err(ConfigError::MissingBars);
        }
        if self.max_rows == 0 {
            return Err(ConfigError::ZeroMaxRows);
        }
        self.simulator.validate()?;
        Ok(())
    }

    /// Deterministic run fingerprint: BLAKE3 over the config's JSON form
    /// followed by the dataset hash. Same config on the same data always
    /// produces the same ID.
    pub fn run_id(&self, dataset_hash: &str) -> Result<RunId, ConfigError> {
        let json = serde_json::to_vec(self)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(&json);
        hasher.update(dataset_hash.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }
}
