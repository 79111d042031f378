//! `lorekeep.toml` loading and knowledge-base path resolution.
//!
//! Every key is optional; a missing config file yields the defaults. When no
//! `data_dir` is configured the nearest `.claude` directory above the working
//! directory is used.

use std::path::{Path, PathBuf};

use lorekeep_core::{KnowledgeError, KnowledgeResult};
use lorekeep_retrieval::RetrieveOptions;
use serde::Deserialize;
use tracing::debug;

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "lorekeep.toml";
/// Directory name that marks a knowledge-base root.
pub const DATA_DIR_NAME: &str = ".claude";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LorekeepConfig {
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub shared_dir: Option<PathBuf>,
    #[serde(default)]
    pub personal_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_include_personal")]
    pub include_personal: bool,
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            include_personal: default_include_personal(),
            dedup_threshold: default_dedup_threshold(),
        }
    }
}

impl RetrievalConfig {
    pub fn retrieve_options(&self) -> RetrieveOptions {
        RetrieveOptions {
            top_k: self.top_k,
            min_score: self.min_score,
            include_personal: self.include_personal,
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_score() -> f64 {
    0.15
}
fn default_include_personal() -> bool {
    true
}
fn default_dedup_threshold() -> f64 {
    0.5
}

/// Base directories of the two scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub shared_dir: PathBuf,
    pub personal_dir: PathBuf,
}

impl LorekeepConfig {
    /// Parse a config document.
    pub fn parse(text: &str) -> KnowledgeResult<Self> {
        toml::from_str(text).map_err(|e| KnowledgeError::Config(e.to_string()))
    }

    /// Read `path`, falling back to the defaults when it does not exist.
    pub async fn load(path: &Path) -> KnowledgeResult<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Self::parse(&text).map_err(|e| {
                KnowledgeError::Config(format!("{}: {e}", path.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(KnowledgeError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    /// Resolve the scope directories. `data_dir_override` wins over the
    /// configured `data_dir`; discovery starts at `cwd`.
    pub fn store_paths(&self, data_dir_override: Option<PathBuf>, cwd: &Path) -> StorePaths {
        let data_dir = data_dir_override
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(|| discover_data_dir(cwd));
        let memory = data_dir.join("memory");
        StorePaths {
            shared_dir: self
                .store
                .shared_dir
                .clone()
                .unwrap_or_else(|| memory.join("knowledge")),
            personal_dir: self
                .store
                .personal_dir
                .clone()
                .unwrap_or_else(|| memory.join("local")),
        }
    }
}

/// Nearest `.claude` directory at or above `start`, else `start/.claude`.
pub fn discover_data_dir(start: &Path) -> PathBuf {
    start
        .ancestors()
        .map(|dir| dir.join(DATA_DIR_NAME))
        .find(|candidate| candidate.is_dir())
        .unwrap_or_else(|| start.join(DATA_DIR_NAME))
}
