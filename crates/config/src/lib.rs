//! Configuration loading and validation.
//!
//! Values are layered, later sources winning:
//!
//! 1. Built-in defaults (paths under the platform data directory)
//! 2. A TOML file: the one given explicitly, else `<config_dir>/config.toml`
//!    if it exists
//! 3. Environment variables prefixed with `IMGBATCH_` (e.g. `IMGBATCH_BATCH_SIZE=20`)

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "IMGBATCH_";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Paths resolved concurrently per intake chunk.
    pub batch_size: usize,
    /// Upper bound on a single stat or dimension lookup.
    pub metadata_timeout_ms: u64,
    /// Transforms in flight during a batch run.
    pub max_concurrency: usize,
    /// SQLite file holding the run history.
    pub database: PathBuf,
    /// Root directory for backups of overwritten originals.
    pub backup_dir: PathBuf,
}

impl Config {
    /// Defaults with every file location placed under `data_dir`.
    pub fn defaults_in(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            batch_size: 10,
            metadata_timeout_ms: 10_000,
            max_concurrency: 4,
            database: data_dir.join("history.sqlite"),
            backup_dir: data_dir.join("backups"),
        }
    }

    /// Load the layered configuration using the platform's directories.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let dirs = ProjectDirs::from("", "", "imgbatch").ok_or_raise(|| ErrorKind::NoProjectDirs)?;
        let default_file = dirs.config_dir().join(CONFIG_FILE);
        let file = match file {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::MissingFile(path.to_path_buf())),
            Some(path) => path,
            None => default_file.as_path(),
        };
        tracing::debug!(file = %file.display(), "Loading configuration");
        Self::from_figment(Self::figment(dirs.data_dir(), file))
    }

    /// The layered sources, without extracting them.
    ///
    /// A missing `file` is skipped silently.
    pub fn figment(data_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> Figment {
        Figment::from(Serialized::defaults(Self::defaults_in(data_dir)))
            .merge(Toml::file(file.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate a configuration.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract().or_raise(|| ErrorKind::Extract)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            exn::bail!(ErrorKind::Invalid("batch_size"));
        }
        if self.metadata_timeout_ms == 0 {
            exn::bail!(ErrorKind::Invalid("metadata_timeout_ms"));
        }
        if self.max_concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("max_concurrency"));
        }
        Ok(())
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }
}
