pub mod dispatcher_config;
pub mod radio_config;
pub mod simulation_config;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::dispatcher_config::DispatcherConfig;
use crate::config::radio_config::RadioConfig;
use crate::config::simulation_config::SimulationConfig;
use crate::utils::ensure_directory_exists;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dispatcher: DispatcherConfig,
    pub radio: RadioConfig,
    pub simulation: SimulationConfig,
}

impl AppConfig {
    /// Loads the config from a JSON file. A missing file yields the defaults.
    pub fn load_config(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Self = serde_json::from_str(&config_json)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;

        info!("Config loaded from {:?}", path);
        Ok(config)
    }

    /// Saves the current config as pretty JSON, creating parent directories.
    pub fn save_config(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_directory_exists(parent)?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(path, config_json)?;

        info!("Config saved to {:?}.", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.dispatcher.default_scan_ms, 5000);
        assert_eq!(config.simulation.devices.len(), 2);
        assert!(!config.dispatcher.force_simulation);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "dispatcher": { "force_simulation": true }, "simulation": { "rssi": -40 } }"#,
        )
        .unwrap();

        let config = AppConfig::load_config(&path).unwrap();
        assert!(config.dispatcher.force_simulation);
        assert_eq!(config.dispatcher.max_scan_results, 100);
        assert_eq!(config.simulation.rssi, -40);
        assert_eq!(config.simulation.connect_delay_ms, 200);
        assert_eq!(config.radio.max_connect_retries, 5);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.radio.min_rssi = Some(-80);
        config.simulation.devices.truncate(1);
        config.save_config(&path).unwrap();

        let loaded = AppConfig::load_config(&path).unwrap();
        assert_eq!(loaded.radio.min_rssi, Some(-80));
        assert_eq!(loaded.simulation.devices, config.simulation.devices);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load_config(&path).is_err());
    }
}
