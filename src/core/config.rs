use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::core::providers::Provider;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Visibility toggles for each provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderToggles {
    #[serde(default = "default_true")]
    pub claude: bool,
    #[serde(default = "default_true")]
    pub codex: bool,
    #[serde(default = "default_true")]
    pub kimi: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ProviderToggles {
    fn default() -> Self {
        Self {
            claude: true,
            codex: true,
            kimi: true,
        }
    }
}

/// User preferences persisted as JSON; written only on explicit toggle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub providers: ProviderToggles,
}

impl Config {
    /// Configuration directory, respecting `XDG_CONFIG_HOME`. `None` when
    /// no home directory could be determined.
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("XDG_CONFIG_HOME") {
            if !dir.is_empty() {
                return Some(PathBuf::from(dir).join("llm-usage"));
            }
        }
        dirs::home_dir().map(|home| home.join(".config").join("llm-usage"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Load from disk; a missing file means defaults (all providers on).
    pub fn load() -> Result<Self, ConfigError> {
        let Some(path) = Self::config_path() else {
            return Ok(Self::default());
        };
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let Some(dir) = Self::config_dir() else {
            return Ok(());
        };
        std::fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join("config.json"), content)?;
        Ok(())
    }

    pub fn is_enabled(&self, provider: Provider) -> bool {
        match provider {
            Provider::Claude => self.providers.claude,
            Provider::Codex => self.providers.codex,
            Provider::Kimi => self.providers.kimi,
        }
    }

    /// Flip one provider's visibility; returns the new state.
    pub fn toggle(&mut self, provider: Provider) -> bool {
        let flag = match provider {
            Provider::Claude => &mut self.providers.claude,
            Provider::Codex => &mut self.providers.codex,
            Provider::Kimi => &mut self.providers.kimi,
        };
        *flag = !*flag;
        *flag
    }

    pub fn any_enabled(&self) -> bool {
        self.providers.claude || self.providers.codex || self.providers.kimi
    }
}
