// src/config.rs
//! Configuration management with file-based storage

use crate::{
    error::{Result, TrackerError},
    gps::{gpsd, nmea},
    tracking::accumulator::DEFAULT_WEIGHT_KG,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Berlin Tiergarten, used as the simulated start when nothing better is known
pub const DEFAULT_SIMULATION_ORIGIN: (f64, f64) = (52.5145, 13.3501);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub source_type: String, // "gpsd", "serial", "simulated"
    pub serial_port: Option<String>,
    pub serial_baudrate: Option<u32>,
    pub gpsd_host: Option<String>,
    pub gpsd_port: Option<u16>,
    pub assumed_weight_kg: f64,
    pub enable_auto_pause: bool,
    pub buffer_dir: Option<String>,
    pub simulation_origin: (f64, f64),
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::platform_default()
    }
}

impl TrackerConfig {
    /// Get default configuration
    pub fn platform_default() -> Self {
        Self {
            source_type: "gpsd".to_string(),
            serial_port: None,
            serial_baudrate: Some(nmea::DEFAULT_BAUDRATE),
            gpsd_host: Some(gpsd::DEFAULT_GPSD_HOST.to_string()),
            gpsd_port: Some(gpsd::DEFAULT_GPSD_PORT),
            assumed_weight_kg: DEFAULT_WEIGHT_KG,
            enable_auto_pause: true,
            buffer_dir: None,
            simulation_origin: DEFAULT_SIMULATION_ORIGIN,
        }
    }

    /// Load configuration from the config file, falling back to defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::platform_default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .map_err(|e| TrackerError::Other(format!("Failed to read config file: {}", e)))?;

        Self::from_json(&contents)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| TrackerError::Other(format!("Failed to parse config file: {}", e)))?;

        config.validated()
    }

    /// Save configuration to the config file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TrackerError::Other(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| TrackerError::Other(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&config_path, contents)
            .map_err(|e| TrackerError::Other(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Get config file path
    fn get_config_path() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| TrackerError::Other("HOME environment variable not set".to_string()))?;

        Ok(PathBuf::from(home).join(".config").join("run-tracker").join("config.json"))
    }

    fn validated(self) -> Result<Self> {
        if !(self.assumed_weight_kg.is_finite() && self.assumed_weight_kg > 0.0) {
            return Err(TrackerError::Other(format!(
                "assumed_weight_kg must be positive, got {}",
                self.assumed_weight_kg
            )));
        }
        match self.source_type.as_str() {
            "gpsd" | "serial" | "simulated" => Ok(self),
            other => Err(TrackerError::Other(format!("Unknown source type: {}", other))),
        }
    }

    /// Update configuration with new source settings
    pub fn update_source(&mut self, source_type: &str) {
        self.source_type = source_type.to_string();
    }

    /// Update serial port settings
    pub fn update_serial(&mut self, port: String, baudrate: u32) {
        self.source_type = "serial".to_string();
        self.serial_port = Some(port);
        self.serial_baudrate = Some(baudrate);
    }

    /// Update gpsd settings
    pub fn update_gpsd(&mut self, host: String, port: u16) {
        self.source_type = "gpsd".to_string();
        self.gpsd_host = Some(host);
        self.gpsd_port = Some(port);
    }

    pub fn update_weight(&mut self, weight_kg: f64) {
        if weight_kg.is_finite() && weight_kg > 0.0 {
            self.assumed_weight_kg = weight_kg;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.source_type, "gpsd");
        assert_eq!(config.assumed_weight_kg, 70.0);
        assert!(config.enable_auto_pause);
        assert_eq!(config.gpsd_port, Some(2947));
    }

    #[test]
    fn test_update_source() {
        let mut config = TrackerConfig::default();
        config.update_source("simulated");
        assert_eq!(config.source_type, "simulated");
    }

    #[test]
    fn test_update_serial() {
        let mut config = TrackerConfig::default();
        config.update_serial("/dev/ttyUSB0".to_string(), 115200);
        assert_eq!(config.source_type, "serial");
        assert_eq!(config.serial_port, Some("/dev/ttyUSB0".to_string()));
        assert_eq!(config.serial_baudrate, Some(115200));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = TrackerConfig::from_json(r#"{"assumed_weight_kg": 62.5}"#).unwrap();
        assert_eq!(config.assumed_weight_kg, 62.5);
        assert_eq!(config.source_type, "gpsd");
        assert!(config.enable_auto_pause);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(TrackerConfig::from_json(r#"{"assumed_weight_kg": 0}"#).is_err());
        assert!(TrackerConfig::from_json(r#"{"source_type": "windows"}"#).is_err());

        let mut config = TrackerConfig::default();
        config.update_weight(-3.0);
        assert_eq!(config.assumed_weight_kg, 70.0);
    }
}
