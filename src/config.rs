use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "bj.toml";
pub const CONFIG_DIR_ENV: &str = "BJ_CONFIG_DIR";

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_VIEWER: &str = "less";
pub const DEFAULT_AUTO_PRUNE_HOURS: u64 = 24;

const MAX_AUTO_PRUNE_HOURS: u64 = 24 * 365 * 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_dir: String,
    pub viewer: String,
    pub auto_prune_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: DEFAULT_LOG_DIR.to_string(),
            viewer: DEFAULT_VIEWER.to_string(),
            auto_prune_hours: DEFAULT_AUTO_PRUNE_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    pub issues: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.issues.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.issues.first() {
            write!(
                f,
                "configuration validation failed: {}: {}",
                first.field, first.message
            )
        } else {
            write!(f, "configuration validation failed")
        }
    }
}

impl std::error::Error for ValidationErrors {}

pub fn config_dir() -> Result<PathBuf, String> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir().ok_or_else(|| "cannot determine home directory".to_string())?;
    Ok(home.join(".config").join("bj"))
}

pub fn load(dir: &Path) -> Result<Config, String> {
    let path = dir.join(CONFIG_FILE);

    if !path.exists() {
        let cfg = Config::default();
        save(dir, &cfg)?;
        return Ok(cfg);
    }

    let mut cfg = parse(&path)?;
    cfg.apply_defaults();
    validate(&cfg).map_err(|e| e.to_string())?;
    Ok(cfg)
}

pub fn parse(path: &Path) -> Result<Config, String> {
    let text = fs::read_to_string(path).map_err(|e| format!("read config: {e}"))?;
    toml::from_str(&text).map_err(|e| format!("parse config toml: {e}"))
}

pub fn save(dir: &Path, cfg: &Config) -> Result<(), String> {
    fs::create_dir_all(dir).map_err(|e| format!("create config directory: {e}"))?;
    let text = toml::to_string(cfg).map_err(|e| format!("encode config toml: {e}"))?;
    fs::write(dir.join(CONFIG_FILE), text).map_err(|e| format!("write config: {e}"))
}

pub fn validate(cfg: &Config) -> Result<(), ValidationErrors> {
    let mut issues = ValidationErrors::new();

    if cfg.log_dir.trim().is_empty() {
        issues.add("log_dir", "must not be blank");
    }

    if cfg.viewer.trim().is_empty() {
        issues.add("viewer", "must not be blank");
    }

    if cfg.auto_prune_hours > MAX_AUTO_PRUNE_HOURS {
        issues.add(
            "auto_prune_hours",
            format!("must be at most {MAX_AUTO_PRUNE_HOURS}"),
        );
    }

    if issues.has_issues() {
        Err(issues)
    } else {
        Ok(())
    }
}

impl Config {
    fn apply_defaults(&mut self) {
        if self.log_dir.is_empty() {
            self.log_dir = DEFAULT_LOG_DIR.to_string();
        }
        if self.viewer.is_empty() {
            self.viewer = DEFAULT_VIEWER.to_string();
        }
    }

    pub fn log_dir_path(&self, config_dir: &Path) -> PathBuf {
        let log_dir = Path::new(&self.log_dir);
        if log_dir.is_absolute() {
            log_dir.to_path_buf()
        } else {
            config_dir.join(log_dir)
        }
    }

    pub fn auto_prune_age(&self) -> Option<Duration> {
        (self.auto_prune_hours > 0).then(|| Duration::from_secs(self.auto_prune_hours * 3600))
    }
}
