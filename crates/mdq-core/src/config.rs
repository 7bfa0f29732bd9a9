use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variables that override the config file.
pub const ENV_DOWNLOAD_DIR: &str = "DOWNLOAD_DIR";
pub const ENV_MAX_ACTIVE: &str = "MAX_ACTIVE_DOWNLOADS";
pub const ENV_STALL_TIMEOUT: &str = "PEER_TIMEOUT_SECONDS";

/// aria2 JSON-RPC endpoint (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aria2Config {
    /// JSON-RPC URL of a running `aria2c --enable-rpc`.
    pub rpc_url: String,
    /// Value of `--rpc-secret`, if aria2 was started with one.
    #[serde(default)]
    pub rpc_secret: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Aria2Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:6800/jsonrpc".to_string(),
            rpc_secret: None,
            timeout_secs: 10,
        }
    }
}

/// Global configuration loaded from `~/.config/mdq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MdqConfig {
    /// Where engines write files and where `fetch` serves from. Created if absent.
    /// Defaults to `~/.local/share/mdq/downloads`.
    #[serde(default)]
    pub destination_dir: Option<PathBuf>,
    /// Maximum number of jobs transferring at once.
    pub max_active: usize,
    /// Auto-cancel a job after this many seconds with zero peers.
    pub stall_timeout_secs: u64,
    /// Pause between dispatch passes, in milliseconds.
    pub dispatch_interval_ms: u64,
    /// Pause between engine status polls per job, in milliseconds.
    pub poll_interval_ms: u64,
    /// Background save interval in seconds.
    pub autosave_interval_secs: u64,
    /// State file path. Defaults to `~/.local/state/mdq/state.json`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
    #[serde(default)]
    pub aria2: Aria2Config,
}

impl Default for MdqConfig {
    fn default() -> Self {
        Self {
            destination_dir: None,
            max_active: 2,
            stall_timeout_secs: 120,
            dispatch_interval_ms: 1000,
            poll_interval_ms: 1000,
            autosave_interval_secs: 10,
            state_file: None,
            aria2: Aria2Config::default(),
        }
    }
}

/// Invalid configuration value (from the file or from an environment override).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer")]
    NotPositive { key: &'static str },
    #[error("{key}={value:?} is not a valid integer")]
    BadEnv { key: &'static str, value: String },
}

impl MdqConfig {
    /// Apply `DOWNLOAD_DIR`, `MAX_ACTIVE_DOWNLOADS` and `PEER_TIMEOUT_SECONDS`.
    /// `lookup` is `std::env::var(..).ok()` in production and a map in tests.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(ENV_DOWNLOAD_DIR).filter(|v| !v.trim().is_empty()) {
            self.destination_dir = Some(PathBuf::from(dir.trim()));
        }
        if let Some(v) = lookup(ENV_MAX_ACTIVE) {
            self.max_active = parse_env(ENV_MAX_ACTIVE, &v)?;
        }
        if let Some(v) = lookup(ENV_STALL_TIMEOUT) {
            self.stall_timeout_secs = parse_env(ENV_STALL_TIMEOUT, &v)?;
        }
        Ok(())
    }

    /// Reject zero counts and intervals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, u64); 5] = [
            ("max_active", self.max_active as u64),
            ("stall_timeout_secs", self.stall_timeout_secs),
            ("dispatch_interval_ms", self.dispatch_interval_ms),
            ("poll_interval_ms", self.poll_interval_ms),
            ("autosave_interval_secs", self.autosave_interval_secs),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(ConfigError::NotPositive { key });
            }
        }
        Ok(())
    }

    /// Configured destination directory, or the XDG data default.
    pub fn resolve_destination_dir(&self) -> Result<PathBuf> {
        match &self.destination_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
                Ok(xdg_dirs.get_data_home().join("downloads"))
            }
        }
    }

    /// Configured state file, or `~/.local/state/mdq/state.json`.
    pub fn resolve_state_file(&self) -> Result<PathBuf> {
        match &self.state_file {
            Some(path) => Ok(path.clone()),
            None => {
                let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
                Ok(xdg_dirs.get_state_home().join("state.json"))
            }
        }
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::BadEnv {
        key,
        value: value.to_string(),
    })
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mdq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from `path`, creating a default file if none exists.
pub fn load_or_init_at(path: &Path) -> Result<MdqConfig> {
    if !path.exists() {
        let default_cfg = MdqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)?;
    let cfg: MdqConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    Ok(cfg)
}

/// Load the default config file, layer environment overrides on top, and validate.
pub fn load_or_init() -> Result<MdqConfig> {
    let mut cfg = load_or_init_at(&config_path()?)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}
