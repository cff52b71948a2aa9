use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
    /// Maximum nesting level of any group, counting a root group as level 1.
    /// `None` leaves nesting unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_group_depth: Option<usize>,
}

impl StoreConfig {
    /// Loads a TOML config file. Missing keys fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_group_depth == Some(0) {
            return Err(Error::Config(
                "max_group_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("canopy.db")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            max_group_depth: None,
        }
    }
}
