//! ReplayLab Runner: replay orchestration on top of `replaylab-core`.
//!
//! This crate provides:
//! - TOML run configs with deterministic run fingerprints
//! - JSON feed loaders with row hygiene (casing, sources, sorting, caps)
//! - Scheduled intent replay
//! - Single and batch replay with full row reports
//! - JSON and CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod intents;
pub mod runner;

pub use config::{ConfigError, DataPaths, RunConfig, RunId, DEFAULT_MAX_ROWS};
pub use data_loader::{load_run_data, LoadError, LoadedData};
pub use export::{load_artifacts, save_artifacts, ArtifactPaths};
pub use intents::ScheduledIntents;
pub use runner::{
    run_batch, run_replay, run_replay_from_data, ReplayReport, ReplaySummary, RunError,
    SCHEMA_VERSION,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn replay_report_is_send_sync() {
        assert_send::<ReplayReport>();
        assert_sync::<ReplayReport>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<RunConfig>();
        assert_sync::<RunConfig>();
        assert_send::<LoadedData>();
        assert_sync::<LoadedData>();
    }

    #[test]
    fn errors_are_send() {
        assert_send::<RunError>();
        assert_send::<LoadError>();
    }
}
