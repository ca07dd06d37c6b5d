use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::calendar::DEFAULT_API_BASE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub input: InputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    pub default_calendar: String,
    /// Upper bound on events fetched for the active calendar
    pub max_results: u32,
    pub api_base: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            default_calendar: "primary".to_string(),
            max_results: 2500,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HistoryConfig {
    /// Defaults to `history.json` in the data directory
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    /// Defaults to `token.json` in the config directory
    pub token_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Quiet period before edited text is re-parsed
    pub debounce_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { debounce_ms: 500 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    /// Read the config at `path`, writing the defaults there if it is missing
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_config = Config::default();
            default_config.save_to(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn history_path(&self) -> Result<PathBuf> {
        match &self.history.path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join("history.json")),
        }
    }

    pub fn token_path(&self) -> Result<PathBuf> {
        match &self.auth.token_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.config_dir().join("token.json")),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.input.debounce_ms)
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("com", "bulk-reminders", "bulk-reminders")
        .context("Failed to determine config directory")
}

fn get_config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}
