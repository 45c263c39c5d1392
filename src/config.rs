use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

use crate::cli::Args;

/// Persistent defaults. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Same as always passing `-w`
    pub warn: bool,
    /// Same as always passing `-m`
    pub markers: bool,
    /// Same as always passing `-t`
    pub tables: bool,
    /// Base log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warn: false,
            markers: false,
            tables: false,
            log_level: "error".to_string(),
        }
    }
}

impl Config {
    /// Command line switches override the file; they can only turn things on.
    pub fn merge_args(mut self, args: &Args) -> Self {
        self.warn |= args.warn;
        self.markers |= args.markers;
        self.tables |= args.tables;
        self
    }

    /// Log level implied by the configured level and the `-w`/`-m` switches.
    pub fn log_filter(&self) -> LevelFilter {
        let mut level = self.log_level.parse().unwrap_or(LevelFilter::ERROR);
        if self.warn {
            level = level.max(LevelFilter::WARN);
        }
        if self.markers {
            level = level.max(LevelFilter::INFO);
        }
        level
    }
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let txt = fs::read_to_string(path).context("Failed to read config")?;
    let cfg: Config = toml::from_str(&txt).context("Failed to parse config TOML")?;
    Ok(cfg)
}

pub fn config_path() -> Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "jcheck", "jcheck")
        .ok_or_else(|| anyhow!("Could not determine config directory"))?;
    Ok(proj.config_dir().join("config.toml"))
}

/// Print the config file location and its content, or the defaults when absent.
pub fn show_config() -> Result<()> {
    let path = config_path()?;
    println!("Config path: {}", path.display());
    if path.exists() {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        println!("\nConfig content:\n{}", content);
    } else {
        let defaults =
            toml::to_string_pretty(&Config::default()).context("Failed to serialize config TOML")?;
        println!("Config file does not exist. Defaults:\n\n{}", defaults);
    }
    Ok(())
}
