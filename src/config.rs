use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api;
use crate::tabs::Tab;

const DEFAULT_ENV_PREFIX: &str = "REELS_AGENT";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ui: UIConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Unset means no timeout.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: None,
        }
    }
}

fn default_base_url() -> String {
    api::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("reels-agent/{}", crate::VERSION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UIConfig {
    #[serde(default)]
    pub initial_tab: Option<Tab>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("reels-agent").join("reels-agent.log"))
}

fn default_log_filter() -> String {
    "info".into()
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

/// Defaults, then the YAML file, then `REELS_AGENT_*` variables.
pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    cfg = merge_config(cfg, load_env(prefix));

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file at {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.server.base_url.is_empty() {
        base.server.base_url = other.server.base_url;
    }
    if !other.server.user_agent.is_empty() {
        base.server.user_agent = other.server.user_agent;
    }
    if other.server.timeout.is_some() {
        base.server.timeout = other.server.timeout;
    }

    if other.ui.initial_tab.is_some() {
        base.ui.initial_tab = other.ui.initial_tab;
    }

    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }
    if !other.log.filter.is_empty() {
        base.log.filter = other.log.filter;
    }

    base
}

fn load_env(prefix: &str) -> Config {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    // Start from an all-empty config so unset keys never override the file.
    let mut cfg = Config {
        server: ServerConfig {
            base_url: String::new(),
            user_agent: String::new(),
            timeout: None,
        },
        ui: UIConfig::default(),
        log: LogConfig {
            file: None,
            filter: String::new(),
        },
    };

    for (key, value) in map {
        apply_env_value(&mut cfg, &key, value);
    }

    cfg
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "server.base_url" => cfg.server.base_url = value,
        "server.user_agent" => cfg.server.user_agent = value,
        "server.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.server.timeout = Some(duration);
            }
        }
        "ui.initial_tab" => cfg.ui.initial_tab = Tab::parse(&value),
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "log.filter" => cfg.log.filter = value,
        _ => {}
    }
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("reels-agent").join("config.yaml"))
}
