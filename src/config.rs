//! Plant configuration loaded from `factory-flow.toml`.
//!
//! Missing keys fall back to defaults, as does a missing file.
use crate::batch::DEFAULT_PREFIX;
use anyhow::Context;
use chrono::FixedOffset;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_FILE: &str = "factory-flow.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FlowConfig {
    /// sled database directory.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_batch_prefix")]
    pub batch_prefix: String,

    /// Appended to the external reference of a remainder order.
    #[serde(default = "default_remainder_suffix")]
    pub remainder_suffix: String,

    /// Offset of the plant clock, batch numbers are stamped in local time.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("factory-flow.db")
}

fn default_batch_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_remainder_suffix() -> String {
    "-REM".to_string()
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            batch_prefix: default_batch_prefix(),
            remainder_suffix: default_remainder_suffix(),
            utc_offset_minutes: 0,
        }
    }
}

impl FlowConfig {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config = toml::from_str::<FlowConfig>(&contents)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.plant_offset()?;
        Ok(config)
    }

    pub fn plant_offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!("utc_offset_minutes out of range: {}", self.utc_offset_minutes)
        })
    }

    pub fn open_db(&self) -> anyhow::Result<Arc<sled::Db>> {
        let db = sled::open(&self.db_path)
            .with_context(|| format!("opening database at {}", self.db_path.display()))?;
        Ok(Arc::new(db))
    }
}
