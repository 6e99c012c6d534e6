use crate::rules::RULES;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_cpu_sample_interval", with = "duration_str")]
    pub cpu_sample_interval: Duration,
    #[serde(default = "default_command_timeout", with = "duration_str")]
    pub command_timeout: Duration,
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Thresholds and lists consumed by the problem rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RulesConfig {
    #[serde(default = "default_distro_denylist")]
    pub distro_denylist: Vec<String>,
    #[serde(default = "default_overheat_alert_ratio")]
    pub overheat_alert_ratio: f64,
    #[serde(default = "default_overheat_warning_ratio")]
    pub overheat_warning_ratio: f64,
    #[serde(default = "default_cpu_overload_threshold")]
    pub cpu_overload_threshold: f64,
    #[serde(default)]
    pub disabled: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: default_output(),
            cpu_sample_interval: default_cpu_sample_interval(),
            command_timeout: default_command_timeout(),
            rules: RulesConfig::default(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            distro_denylist: default_distro_denylist(),
            overheat_alert_ratio: default_overheat_alert_ratio(),
            overheat_warning_ratio: default_overheat_warning_ratio(),
            cpu_overload_threshold: default_cpu_overload_threshold(),
            disabled: Vec::new(),
        }
    }
}

impl RulesConfig {
    pub fn is_enabled(&self, rule: &str) -> bool {
        !self.disabled.iter().any(|d| d == rule)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("не удалось прочитать файл конфигурации {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("не удалось разобрать YAML в {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("ошибка валидации конфигурации: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads `path` when it exists; a missing file yields the built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output.trim().is_empty() {
            return Err(ConfigError::Validation(
                "поле output не должно быть пустым".to_string(),
            ));
        }
        if self.cpu_sample_interval < Duration::from_millis(100)
            || self.cpu_sample_interval > Duration::from_secs(10)
        {
            return Err(ConfigError::Validation(
                "cpu_sample_interval должно быть в диапазоне 100ms..10s".to_string(),
            ));
        }
        if self.command_timeout < Duration::from_secs(1) {
            return Err(ConfigError::Validation(
                "command_timeout должно быть >= 1s".to_string(),
            ));
        }

        validate_rules(&self.rules)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_rules(cfg: &RulesConfig) -> Result<(), ConfigError> {
    if cfg.distro_denylist.iter().any(|d| d.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "rules.distro_denylist[*] не должен быть пустым".to_string(),
        ));
    }
    if !(cfg.overheat_warning_ratio > 0.0
        && cfg.overheat_warning_ratio <= cfg.overheat_alert_ratio)
    {
        return Err(ConfigError::Validation(
            "rules.overheat_warning_ratio должно быть > 0 и <= rules.overheat_alert_ratio"
                .to_string(),
        ));
    }
    if cfg.cpu_overload_threshold < 0.0 {
        return Err(ConfigError::Validation(
            "rules.cpu_overload_threshold должно быть >= 0".to_string(),
        ));
    }

    let known: HashSet<&str> = RULES.iter().map(|r| r.name).collect();
    for name in &cfg.disabled {
        if !known.contains(name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "rules.disabled: неизвестное правило '{}'",
                name
            )));
        }
    }

    Ok(())
}

fn default_output() -> String {
    "report.json".to_string()
}

const fn default_cpu_sample_interval() -> Duration {
    Duration::from_secs(1)
}

const fn default_command_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_distro_denylist() -> Vec<String> {
    [
        "manjaro",
        "zorin",
        "endeavour",
        "garuda",
        "mx linux",
        "nobara",
        "antix",
        "solus",
        "pop!_os",
        "artix",
        "void",
        "arcolinux",
        "cachyos",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

const fn default_overheat_alert_ratio() -> f64 {
    0.9
}

const fn default_overheat_warning_ratio() -> f64 {
    0.8
}

const fn default_cpu_overload_threshold() -> f64 {
    0.95
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}
