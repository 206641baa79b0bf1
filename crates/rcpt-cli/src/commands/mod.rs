//! CLI subcommands and the helpers they share.

pub mod batch;
pub mod battery;
pub mod config;
pub mod output;
pub mod parse;
pub mod process;
pub mod records;

use std::path::{Path, PathBuf};

use tracing::debug;

use rcpt_core::models::config::RcptConfig;
use rcpt_core::SqliteStore;

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcpt")
        .join("config.json")
}

/// Config file in effect: the `--config` argument, else the default location.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path.map(PathBuf::from).unwrap_or_else(default_config_path)
}

/// Load the configuration.
///
/// An explicit `--config` file must exist; the default file is optional.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<RcptConfig> {
    if let Some(path) = config_path {
        return RcptConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e));
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(RcptConfig::from_file(&path)?)
    } else {
        Ok(RcptConfig::default())
    }
}

/// Open the receipt store with its CSV export.
pub fn open_store(config: &RcptConfig) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::open(&config.storage.database_path)?
        .with_export(config.storage.export_path.clone());
    Ok(store)
}
