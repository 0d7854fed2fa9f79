mod file_config;

pub use file_config::FileConfig;

use crate::media_store::{StoreOptions, DEFAULT_DB_FILE_NAME};
use anyhow::{bail, Result};
use std::path::PathBuf;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            db_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_dir: PathBuf,
    pub db_file_name: String,
    pub busy_timeout_ms: u64,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let db_file_name = file
            .db_file_name
            .unwrap_or_else(|| DEFAULT_DB_FILE_NAME.to_string());
        if db_file_name.is_empty() || db_file_name.contains(['/', '\\']) {
            bail!("db_file_name must be a bare file name, got {:?}", db_file_name);
        }

        let busy_timeout_ms = file.busy_timeout_ms.unwrap_or(cli.busy_timeout_ms);

        Ok(Self {
            db_dir,
            db_file_name,
            busy_timeout_ms,
        })
    }

    pub fn catalog_db_path(&self) -> PathBuf {
        self.db_dir.join(&self.db_file_name)
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout_ms: self.busy_timeout_ms,
        }
    }
}
