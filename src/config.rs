//! Tracker configuration
//!
//! Loaded from a YAML or JSON file, then overridden by `SCREEN_ANALYTICS_*`
//! environment variables (a `.env` file is honored by the binary).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

use crate::event_bus::DEFAULT_BUS_CAPACITY;
use crate::labels::LabelSet;

pub const ENV_PREFIX: &str = "SCREEN_ANALYTICS_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("{0} must not be empty")]
    Missing(&'static str),
}

/// Business unit the measurements are made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessUnit {
    Rsi,
    Rtr,
    Rts,
    Srf,
    Srg,
    Swi,
}

impl BusinessUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessUnit::Rsi => "rsi",
            BusinessUnit::Rtr => "rtr",
            BusinessUnit::Rts => "rts",
            BusinessUnit::Srf => "srf",
            BusinessUnit::Srg => "srg",
            BusinessUnit::Swi => "swi",
        }
    }
}

impl fmt::Display for BusinessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BusinessUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rsi" => Ok(BusinessUnit::Rsi),
            "rtr" => Ok(BusinessUnit::Rtr),
            "rts" => Ok(BusinessUnit::Rts),
            "srf" => Ok(BusinessUnit::Srf),
            "srg" => Ok(BusinessUnit::Srg),
            "swi" => Ok(BusinessUnit::Swi),
            _ => Err(ConfigError::InvalidValue {
                key: "business_unit".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub business_unit: BusinessUnit,
    pub source_key: String,
    /// Defaults to `{business_unit}-app-test-v`.
    #[serde(default)]
    pub site_name: Option<String>,
    /// Measurements are studied centrally rather than by the business unit.
    #[serde(default = "default_true")]
    pub centralized: bool,
    /// Publish every dispatched event on the tracker event bus.
    #[serde(default)]
    pub unit_testing: bool,
    /// Add business unit and site name to every page view's labels.
    #[serde(default)]
    pub context_labels: bool,
    #[serde(default = "default_bus_capacity")]
    pub event_bus_capacity: usize,
}

fn default_true() -> bool {
    true
}

fn default_bus_capacity() -> usize {
    DEFAULT_BUS_CAPACITY
}

impl TrackerConfig {
    pub fn new(business_unit: BusinessUnit, source_key: impl Into<String>) -> Self {
        Self {
            business_unit,
            source_key: source_key.into(),
            site_name: None,
            centralized: true,
            unit_testing: false,
            context_labels: false,
            event_bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }

    pub fn with_site_name(mut self, site_name: impl Into<String>) -> Self {
        self.site_name = Some(site_name.into());
        self
    }

    pub fn with_unit_testing(mut self, enabled: bool) -> Self {
        self.unit_testing = enabled;
        self
    }

    pub fn site_name(&self) -> String {
        match &self.site_name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => format!("{}-app-test-v", self.business_unit),
        }
    }

    /// Business unit studying the measurements: the group level direction
    /// when centralized, the publishing unit otherwise.
    pub fn measuring_unit(&self) -> BusinessUnit {
        if self.centralized {
            BusinessUnit::Srg
        } else {
            self.business_unit
        }
    }

    /// Labels describing the measured application.
    pub fn context_label_set(&self) -> LabelSet {
        LabelSet::from_pairs([
            ("business_unit", self.business_unit.to_string()),
            ("measuring_unit", self.measuring_unit().to_string()),
            ("site_name", self.site_name()),
        ])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_key.trim().is_empty() {
            return Err(ConfigError::Missing("source_key"));
        }
        if self.event_bus_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "event_bus_capacity".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Parse a config file; the format follows the extension (`.json`,
    /// otherwise YAML).
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let parsed: Result<Self, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        let config = parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SCREEN_ANALYTICS_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by full variable name.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = var("BUSINESS_UNIT") {
            self.business_unit = value.parse()?;
        }
        if let Some(value) = var("SOURCE_KEY") {
            self.source_key = value;
        }
        if let Some(value) = var("SITE_NAME") {
            self.site_name = Some(value);
        }
        if let Some(value) = var("CENTRALIZED") {
            self.centralized = parse_bool("CENTRALIZED", &value)?;
        }
        if let Some(value) = var("UNIT_TESTING") {
            self.unit_testing = parse_bool("UNIT_TESTING", &value)?;
        }
        if let Some(value) = var("CONTEXT_LABELS") {
            self.context_labels = parse_bool("CONTEXT_LABELS", &value)?;
        }
        if let Some(value) = var("EVENT_BUS_CAPACITY") {
            self.event_bus_capacity = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "EVENT_BUS_CAPACITY".to_string(),
                value: value.clone(),
            })?;
        }
        self.validate()?;
        Ok(self)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_load_yaml_with_defaults() {
        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "business_unit: rts\nsource_key: 39ae8f94-595c-4ca4-81f7-fb7748bd3f04").unwrap();

        let config = TrackerConfig::load(file.path()).await.unwrap();
        assert_eq!(config.business_unit, BusinessUnit::Rts);
        assert!(config.centralized);
        assert!(!config.unit_testing);
        assert_eq!(config.site_name(), "rts-app-test-v");
        assert_eq!(config.event_bus_capacity, DEFAULT_BUS_CAPACITY);
    }

    #[tokio::test]
    async fn test_load_json() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(
            file,
            r#"{{"business_unit":"srf","source_key":"k","site_name":"srf-app","unit_testing":true}}"#
        )
        .unwrap();

        let config = TrackerConfig::load(file.path()).await.unwrap();
        assert_eq!(config.site_name(), "srf-app");
        assert!(config.unit_testing);
    }

    #[tokio::test]
    async fn test_load_rejects_bad_files() {
        let missing = TrackerConfig::load("/nonexistent/analytics.yaml").await;
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "business_unit: bbc\nsource_key: k").unwrap();
        assert!(matches!(
            TrackerConfig::load(file.path()).await,
            Err(ConfigError::Parse { .. })
        ));

        let mut empty_key = NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(empty_key, "business_unit: rsi\nsource_key: ''").unwrap();
        assert!(matches!(
            TrackerConfig::load(empty_key.path()).await,
            Err(ConfigError::Missing("source_key"))
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<String, String> = [
            ("SCREEN_ANALYTICS_BUSINESS_UNIT", "SWI"),
            ("SCREEN_ANALYTICS_UNIT_TESTING", "yes"),
            ("SCREEN_ANALYTICS_EVENT_BUS_CAPACITY", "16"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = TrackerConfig::new(BusinessUnit::Rts, "key")
            .apply_overrides(|k| env.get(k).cloned())
            .unwrap();
        assert_eq!(config.business_unit, BusinessUnit::Swi);
        assert!(config.unit_testing);
        assert_eq!(config.event_bus_capacity, 16);
    }

    #[test]
    fn test_invalid_override() {
        let result = TrackerConfig::new(BusinessUnit::Rts, "key").apply_overrides(|k| {
            (k == "SCREEN_ANALYTICS_CENTRALIZED").then(|| "maybe".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_context_labels() {
        let config = TrackerConfig::new(BusinessUnit::Srg, "key").with_site_name("srg-player");
        let labels = config.context_label_set();
        assert_eq!(labels.get("business_unit"), Some("srg"));
        assert_eq!(labels.get("site_name"), Some("srg-player"));
    }

    #[test]
    fn test_measuring_unit_follows_centralized_flag() {
        let mut config = TrackerConfig::new(BusinessUnit::Rtr, "key");
        assert_eq!(config.measuring_unit(), BusinessUnit::Srg);
        assert_eq!(config.context_label_set().get("measuring_unit"), Some("srg"));

        config = config
            .apply_overrides(|k| (k == "SCREEN_ANALYTICS_CENTRALIZED").then(|| "false".to_string()))
            .unwrap();
        assert_eq!(config.measuring_unit(), BusinessUnit::Rtr);
        assert_eq!(config.context_label_set().get("measuring_unit"), Some("rtr"));
    }
}
