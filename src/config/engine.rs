//! Engine Configuration
//!
//! Classifier choice, calibration, and the catalog / state locations.
//! Read from TOML, then overridden from the environment.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::emotion::{Calibration, ClassifierStrategy, Thresholds};
use crate::error::ConfigError;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "mood-relay.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub calibration: Calibration,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// "peak", "max_abs" or "mean"
    #[serde(default)]
    pub strategy: ClassifierStrategy,

    /// Overrides the strategy's lower neutral bound
    #[serde(default)]
    pub negative_below: Option<f64>,

    /// Overrides the strategy's upper neutral bound
    #[serde(default)]
    pub positive_above: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// CSV sheet with Category / Message columns
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("message.csv")
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// sled directory holding the rotation state
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("rotation_state")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// JSON export of the measurement store
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

fn default_source_path() -> PathBuf {
    PathBuf::from("measurements.json")
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: default_source_path(),
        }
    }
}

/// Fallback identifiers for single-room deployments whose webhook body does
/// not name the room or the person.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub location_id: Option<String>,

    #[serde(default)]
    pub subject_id: Option<String>,
}

impl EngineConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Resolve the config file (`path`, else `MOOD_RELAY_CONFIG`, else
    /// [`DEFAULT_CONFIG_FILE`]), load it, and apply environment overrides.
    /// A missing file means defaults; an unreadable or invalid one is
    /// logged and also falls back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| env::var("MOOD_RELAY_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            match Self::load(&path) {
                Ok(config) => {
                    info!("[CONFIG] Loaded {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("[CONFIG] {}; using defaults", e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };

        config.apply_env();
        config
    }

    /// Apply `MOOD_RELAY_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // MOOD_RELAY_CATALOG
        if let Some(val) = lookup("MOOD_RELAY_CATALOG").filter(|v| !v.trim().is_empty()) {
            self.catalog.path = PathBuf::from(val.trim());
        }

        // MOOD_RELAY_STATE_DIR
        if let Some(val) = lookup("MOOD_RELAY_STATE_DIR").filter(|v| !v.trim().is_empty()) {
            self.store.path = PathBuf::from(val.trim());
        }

        // MOOD_RELAY_RECORDS
        if let Some(val) = lookup("MOOD_RELAY_RECORDS").filter(|v| !v.trim().is_empty()) {
            self.source.path = PathBuf::from(val.trim());
        }

        // MOOD_RELAY_STRATEGY
        if let Some(val) = lookup("MOOD_RELAY_STRATEGY") {
            match val.parse::<ClassifierStrategy>() {
                Ok(strategy) => self.classifier.strategy = strategy,
                Err(e) => warn!("[CONFIG] Ignoring MOOD_RELAY_STRATEGY: {}", e),
            }
        }

        // MOOD_RELAY_LOCATION_ID / MOOD_RELAY_SUBJECT_ID
        if let Some(val) = lookup("MOOD_RELAY_LOCATION_ID").filter(|v| !v.trim().is_empty()) {
            self.routing.location_id = Some(val.trim().to_string());
        }
        if let Some(val) = lookup("MOOD_RELAY_SUBJECT_ID").filter(|v| !v.trim().is_empty()) {
            self.routing.subject_id = Some(val.trim().to_string());
        }
    }

    /// Neutral band: the strategy default with any explicit override applied.
    pub fn thresholds(&self) -> Thresholds {
        let defaults = self.classifier.strategy.default_thresholds();
        Thresholds {
            negative_below: self
                .classifier
                .negative_below
                .unwrap_or(defaults.negative_below),
            positive_above: self
                .classifier
                .positive_above
                .unwrap_or(defaults.positive_above),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.calibration.is_valid() {
            return Err(ConfigError::Calibration {
                min: self.calibration.min,
                max: self.calibration.max,
            });
        }
        let t = self.thresholds();
        if !(t.negative_below <= t.positive_above) {
            return Err(ConfigError::Thresholds {
                negative_below: t.negative_below,
                positive_above: t.positive_above,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::normalizer::{VALENCE_MAX, VALENCE_MIN};
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.classifier.strategy, ClassifierStrategy::Peak);
        assert_eq!(config.thresholds(), Thresholds::PEAK);
        assert_eq!(config.calibration, Calibration::new(VALENCE_MIN, VALENCE_MAX));
        assert_eq!(config.catalog.path, PathBuf::from("message.csv"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_and_strategy_thresholds() {
        let config = EngineConfig::from_toml(
            r#"
            [classifier]
            strategy = "max_abs"

            [store]
            path = "/var/lib/mood-relay"
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds(), Thresholds::LEGACY);
        assert_eq!(config.store.path, PathBuf::from("/var/lib/mood-relay"));
        assert_eq!(config.catalog.path, PathBuf::from("message.csv"));

        let config = EngineConfig::from_toml(
            r#"
            [classifier]
            strategy = "mean"
            positive_above = 0.5
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds().negative_below, -0.3);
        assert_eq!(config.thresholds().positive_above, 0.5);
    }

    #[test]
    fn test_partial_calibration_keeps_the_other_bound() {
        let config = EngineConfig::from_toml("[calibration]\nmin = 1.0\n").unwrap();
        assert_eq!(config.calibration, Calibration::new(1.0, VALENCE_MAX));

        let config = EngineConfig::from_toml("[calibration]\nmax = 9.0\n").unwrap();
        assert_eq!(config.calibration, Calibration::new(VALENCE_MIN, 9.0));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml("[calibration]\nmin = 5.0\nmax = 5.0\n"),
            Err(ConfigError::Calibration { .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml("[classifier]\nnegative_below = 0.5\npositive_above = 0.1\n"),
            Err(ConfigError::Thresholds { .. })
        ));
        assert!(matches!(
            EngineConfig::from_toml("[classifier]\nstrategy = \"median\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.routing.location_id = Some("room-1".to_string());
        let parsed = EngineConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MOOD_RELAY_CATALOG", "/etc/mood-relay/message.csv"),
            ("MOOD_RELAY_STRATEGY", "mean"),
            ("MOOD_RELAY_SUBJECT_ID", " test00 "),
        ]);
        let mut config = EngineConfig::default();
        config.apply_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.catalog.path, PathBuf::from("/etc/mood-relay/message.csv"));
        assert_eq!(config.classifier.strategy, ClassifierStrategy::Mean);
        assert_eq!(config.routing.subject_id.as_deref(), Some("test00"));
        assert_eq!(config.store.path, PathBuf::from("rotation_state"));

        let mut config = EngineConfig::default();
        config.apply_overrides(|k| (k == "MOOD_RELAY_STRATEGY").then(|| "bogus".to_string()));
        assert_eq!(config.classifier.strategy, ClassifierStrategy::Peak);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let td = tempdir().unwrap();
        let path = td.path().join("mood-relay.toml");
        fs::write(&path, "[calibration]\nmin = \"low\"\n").unwrap();
        let config = EngineConfig::load_or_default(Some(&path));
        assert_eq!(config.calibration, Calibration::default());
    }
}
