use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Path that selects a private in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// How to open the backing store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub create_if_missing: bool,
    #[serde(default)]
    pub read_only: bool,
    /// How long the engine waits on a locked store before reporting busy.
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    /// Let SQLite enforce `REFERENCES` clauses. Off by default, so deleting a
    /// referenced row leaves dangling references instead of failing.
    #[serde(default)]
    pub foreign_keys: bool,
}

fn default_true() -> bool {
    true
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DatabaseConfig {
            path: path.into(),
            create_if_missing: true,
            read_only: false,
            busy_timeout_ms: None,
            foreign_keys: false,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY)
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(IN_MEMORY)
    }

    pub fn busy_timeout(&self) -> Option<Duration> {
        self.busy_timeout_ms.map(Duration::from_millis)
    }

    /// Parse a YAML configuration document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Read a YAML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}
