use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// 默认配置文件路径，可以用 YUE_CONFIG 覆盖
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub command_prefix: String,
    pub commands_path: PathBuf,
    pub events_path: PathBuf,
    pub state_path: PathBuf,
    pub bot_name: String,
    pub max_retry_attempts: u32,
    pub log_level: String,
}

impl Settings {
    /// 读取配置文件（路径来自 YUE_CONFIG），再用环境变量覆盖
    pub fn new() -> Result<Self> {
        let config_path =
            env::var("YUE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut settings = Self::from_file(Path::new(&config_path))?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// 配置文件不存在时使用默认值
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(
                "Config file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;

        debug!("Loaded config from {}", path.display());
        Ok(settings)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(prefix) = env::var("COMMAND_PREFIX") {
            self.command_prefix = prefix;
        }

        if let Ok(path) = env::var("COMMANDS_PATH") {
            self.commands_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("EVENTS_PATH") {
            self.events_path = PathBuf::from(path);
        }

        if let Ok(path) = env::var("STATE_PATH") {
            self.state_path = PathBuf::from(path);
        }

        if let Ok(name) = env::var("BOT_NAME") {
            self.bot_name = name;
        }

        if let Some(attempts) = env::var("MAX_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
        {
            self.max_retry_attempts = attempts;
        }

        if let Ok(level) = env::var("RUST_LOG") {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.command_prefix.is_empty() {
            return Err(anyhow!("Command prefix cannot be empty"));
        }

        if self.command_prefix.chars().any(char::is_whitespace) {
            return Err(anyhow!("Command prefix cannot contain whitespace"));
        }

        if self.max_retry_attempts == 0 {
            return Err(anyhow!("Max retry attempts must be greater than 0"));
        }

        if self.commands_path.as_os_str().is_empty() || self.events_path.as_os_str().is_empty() {
            return Err(anyhow!("Handler directories cannot be empty"));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            command_prefix: "!".to_string(),
            commands_path: PathBuf::from("bot").join("commands"),
            events_path: PathBuf::from("bot").join("events"),
            state_path: PathBuf::from("appstate.json"),
            bot_name: "YueBot".to_string(),
            max_retry_attempts: 3,
            log_level: "info".to_string(),
        }
    }
}
