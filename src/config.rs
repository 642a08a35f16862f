use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "minitask.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub log_level: String,
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            log_level: "info".to_string(),
            log_file: "minitask.log".to_string(),
        }
    }
}

impl Config {
    /// Reads the JSON file if it exists, then applies `MINITASK_*`
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            serde_json::from_str(&fs::read_to_string(path)?)?
        } else {
            Config::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("MINITASK_SUPABASE_URL") {
            self.supabase_url = url;
        }
        if let Some(key) = lookup("MINITASK_SUPABASE_ANON_KEY") {
            self.supabase_anon_key = key;
        }
        if let Some(level) = lookup("MINITASK_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.supabase_url.trim().is_empty() {
            return Err(ConfigError::Missing("supabase_url"));
        }
        if self.supabase_anon_key.trim().is_empty() {
            return Err(ConfigError::Missing("supabase_anon_key"));
        }
        Ok(())
    }

    /// Writes a default config file unless one is already there. Returns
    /// whether a file was written.
    pub fn init(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(&Config::default())?)?;
        Ok(true)
    }
}
