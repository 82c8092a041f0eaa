//! Plant Configuration - monitored equipment and engine tuning as TOML
//!
//! Each struct implements `Default` so a missing file or section still
//! yields a runnable configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults::{
    DEFAULT_DATA_DIR, DEFAULT_DWELL_THRESHOLD_SECS, DEFAULT_EVENT_CHANNEL_CAPACITY,
    DEFAULT_SHUTDOWN_TIMEOUT_MS, DEFAULT_TICK_INTERVAL_MS, SHIFT_DB_NAME,
};
use crate::classifier::{ClassifierConfig, DwellRule};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "SHIFTWATCH_CONFIG";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "shiftwatch.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a plant deployment.
///
/// Load with `PlantConfig::load()` which searches:
/// 1. `$SHIFTWATCH_CONFIG` env var
/// 2. `./shiftwatch.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantConfig {
    #[serde(default)]
    pub plant: PlantInfo,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Monitored equipment
    #[serde(default = "default_equipment")]
    pub equipment: Vec<EquipmentConfig>,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            plant: PlantInfo::default(),
            monitor: MonitorConfig::default(),
            storage: StorageConfig::default(),
            equipment: default_equipment(),
        }
    }
}

impl PlantConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), plant = %config.plant.name, "Loaded plant config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(plant = %config.plant.name, "Loaded plant config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate a TOML document. Unknown keys are logged.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Look up one equipment entry
    pub fn equipment(&self, id: &str) -> Option<&EquipmentConfig> {
        self.equipment.iter().find(|e| e.id == id)
    }

    /// Path of the sled database
    pub fn db_path(&self) -> PathBuf {
        self.storage.data_dir.join(SHIFT_DB_NAME)
    }

    /// Check the configuration for internal consistency.
    ///
    /// All problems are collected before returning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.monitor.tick_interval_ms == 0 {
            errors.push("monitor.tick_interval_ms must be > 0".to_string());
        }
        if self.monitor.event_channel_capacity == 0 {
            errors.push("monitor.event_channel_capacity must be > 0".to_string());
        }

        let mut seen = HashSet::new();
        for (i, eq) in self.equipment.iter().enumerate() {
            let id = eq.id.trim();
            if id.is_empty() {
                errors.push(format!("equipment[{i}].id must not be empty"));
                continue;
            }
            if !seen.insert(id) {
                errors.push(format!("equipment id '{id}' is configured more than once"));
            }
            if let Some(dwell) = &eq.dwell {
                if dwell.m_code == 0 {
                    errors.push(format!("equipment '{id}': dwell.m_code must be > 0"));
                }
                if dwell.threshold_secs == 0 {
                    errors.push(format!("equipment '{id}': dwell.threshold_secs must be > 0"));
                }
                if eq.loading_m_code > 0 && dwell.m_code == eq.loading_m_code {
                    errors.push(format!(
                        "equipment '{id}': dwell.m_code ({}) must differ from loading_m_code",
                        dwell.m_code
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Sections
// ============================================================================

/// Identification metadata, used in logs only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlantInfo {
    #[serde(default = "default_plant_name")]
    pub name: String,
}

fn default_plant_name() -> String {
    "DEFAULT".to_string()
}

impl Default for PlantInfo {
    fn default() -> Self {
        Self {
            name: default_plant_name(),
        }
    }
}

/// Monitor loop tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}
fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}

/// Storage location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIR)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// One monitored machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EquipmentConfig {
    /// Network address or other stable identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: Option<String>,

    /// M-code for "awaiting loader"; 0 disables Loading detection
    #[serde(default)]
    pub loading_m_code: u16,

    /// Optional-stop dwell rule
    #[serde(default)]
    pub dwell: Option<DwellConfig>,
}

impl EquipmentConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            loading_m_code: 0,
            dwell: None,
        }
    }

    /// Name for logs, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Classifier settings for this equipment
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            loading_m_code: self.loading_m_code,
            dwell: self.dwell.map(|d| DwellRule {
                m_code: d.m_code,
                threshold_secs: d.threshold_secs,
            }),
        }
    }
}

/// `[equipment.dwell]`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DwellConfig {
    pub m_code: u16,
    #[serde(default = "default_dwell_threshold_secs")]
    pub threshold_secs: u32,
}

fn default_dwell_threshold_secs() -> u32 {
    DEFAULT_DWELL_THRESHOLD_SECS
}

fn default_equipment() -> Vec<EquipmentConfig> {
    vec![EquipmentConfig {
        id: "sim-01".to_string(),
        name: Some("Simulated lathe".to_string()),
        loading_m_code: 100,
        dwell: None,
    }]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = PlantConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.monitor.tick_interval_ms, 1000);
    }

    #[test]
    fn test_default_matches_empty_file() {
        let config = PlantConfig::from_toml_str("").unwrap();
        assert_eq!(config.equipment.len(), 1);
        assert_eq!(config.equipment[0].id, "sim-01");
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = PlantConfig::default();
        let text = config.to_toml().unwrap();
        let parsed = PlantConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed.equipment, config.equipment);
    }

    #[test]
    fn test_classifier_config_mapping() {
        let eq = EquipmentConfig {
            id: "10.0.0.1".to_string(),
            name: None,
            loading_m_code: 100,
            dwell: Some(DwellConfig {
                m_code: 1,
                threshold_secs: 5,
            }),
        };
        let cc = eq.classifier_config();
        assert_eq!(cc.loading_m_code, 100);
        assert_eq!(cc.dwell.unwrap().threshold_secs, 5);
        assert_eq!(eq.display_name(), "10.0.0.1");
    }
}
