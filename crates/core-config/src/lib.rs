//! Configuration loading and parsing.
//!
//! An optional `whittle.toml` supplies defaults for the knobs people set once
//! per machine (worker count, give-up budget, temp retention). Command-line
//! flags always win over file values; merging happens in the binary. Unknown
//! fields are ignored so the file format can grow without breaking older
//! configs.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReduceConfig {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub give_up_after: Option<u64>,
    #[serde(default)]
    pub save_temps: Option<bool>,
    #[serde(default)]
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub reduce: ReduceConfig,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub raw: Option<String>, // original file string (optional)
    pub file: ConfigFile,    // parsed (or default) data
}

/// Best-effort config path: working directory first, then the platform
/// config dir (XDG / AppData Roaming).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("whittle.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("whittle").join("whittle.toml");
    }
    // Final fallback relative filename.
    PathBuf::from("whittle.toml")
}

pub fn load_from(path: Option<PathBuf>) -> Result<Config> {
    let path = path.unwrap_or_else(discover);
    if let Ok(content) = fs::read_to_string(&path) {
        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                info!(target: "config", path = %path.display(), "config_loaded");
                Ok(Config {
                    raw: Some(content),
                    file,
                })
            }
            Err(err) => {
                warn!(target: "config", path = %path.display(), %err, "config_parse_failed");
                Ok(Config::default())
            }
        }
    } else {
        Ok(Config::default())
    }
}
