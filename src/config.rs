use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub index: IndexConfig,
    pub db: DbConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    /// Shared, version-controlled corpus root.
    pub root: PathBuf,
    /// Private, local-only corpus root. Absent means no personal index.
    #[serde(default)]
    pub personal_root: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_team_index")]
    pub team_path: PathBuf,
    #[serde(default = "default_personal_index")]
    pub personal_path: PathBuf,
    /// When true every query rebuilds the index first; when false callers
    /// rebuild explicitly. Trades latency for staleness-avoidance.
    #[serde(default = "default_auto_rebuild")]
    pub auto_rebuild: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            team_path: default_team_index(),
            personal_path: default_personal_index(),
            auto_rebuild: default_auto_rebuild(),
        }
    }
}

fn default_team_index() -> PathBuf {
    PathBuf::from("./.devlore/team-index.json")
}
fn default_personal_index() -> PathBuf {
    PathBuf::from("./.devlore/personal-index.json")
}
fn default_auto_rebuild() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_project")]
    pub project: String,
}

fn default_project() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

fn default_backend() -> String {
    "index".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    match config.storage.backend.as_str() {
        "index" | "sqlite" => {}
        other => anyhow::bail!(
            "Unknown storage backend: '{}'. Must be index or sqlite.",
            other
        ),
    }

    if config.db.project.trim().is_empty() {
        anyhow::bail!("db.project must be non-empty");
    }

    if config.knowledge.root.as_os_str().is_empty() {
        anyhow::bail!("knowledge.root must be set");
    }

    Ok(config)
}
