//! # Host Configuration
//!
//! Settings for the motion loop, the device adapter, the long-run
//! confirmation gate, and the built-in simulator.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [controller]
//! axis = "z"
//! poll_interval_ms = 100
//! quit_join_timeout_ms = 2000
//!
//! [device]
//! position_tolerance_um = 0.005
//!
//! [confirmation]
//! max_step_secs = 20.0
//! max_total_secs = 600.0
//!
//! [simulator]
//! start_position = [0.0, 0.0, 0.0]
//! settle_jitter_um = 0.002
//! min_step_um = 0.05
//! ```
//!
//! Every section and field is optional; missing values fall back to the
//! defaults above.

// src/config.rs - Single configuration file
use crate::device::Axis;
use crate::estimate::ConfirmationPolicy;
use crate::motion::controller::ControllerSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Duration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

/// Motion loop timing and axis selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub axis: Axis,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_quit_join_timeout_ms")]
    pub quit_join_timeout_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            axis: Axis::default(),
            poll_interval_ms: default_poll_interval_ms(),
            quit_join_timeout_ms: default_quit_join_timeout_ms(),
        }
    }
}

/// Device adapter settings applied once before each run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    #[serde(default = "default_position_tolerance_um")]
    pub position_tolerance_um: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            position_tolerance_um: default_position_tolerance_um(),
        }
    }
}

/// Thresholds above which a run needs explicit user confirmation.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConfirmationConfig {
    #[serde(default = "default_max_step_secs")]
    pub max_step_secs: f64,
    #[serde(default = "default_max_total_secs")]
    pub max_total_secs: f64,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            max_step_secs: default_max_step_secs(),
            max_total_secs: default_max_total_secs(),
        }
    }
}

/// Simulated actuator used when no hardware transport is attached.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulatorConfig {
    #[serde(default)]
    pub start_position: [f64; 3],
    #[serde(default = "default_settle_jitter_um")]
    pub settle_jitter_um: f64,
    #[serde(default = "default_min_step_um")]
    pub min_step_um: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            start_position: [0.0, 0.0, 0.0],
            settle_jitter_um: default_settle_jitter_um(),
            min_step_um: default_min_step_um(),
        }
    }
}

impl Config {
    /// Reject values the motion loop cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.controller.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("controller.poll_interval_ms must be > 0".to_string()));
        }
        if self.controller.quit_join_timeout_ms == 0 {
            return Err(ConfigError::Invalid("controller.quit_join_timeout_ms must be > 0".to_string()));
        }
        let tolerance = self.device.position_tolerance_um;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(ConfigError::Invalid("device.position_tolerance_um must be > 0".to_string()));
        }
        if !(self.confirmation.max_step_secs > 0.0) || !(self.confirmation.max_total_secs > 0.0) {
            return Err(ConfigError::Invalid("confirmation thresholds must be > 0".to_string()));
        }
        if self.simulator.start_position.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::Invalid("simulator.start_position must be finite".to_string()));
        }
        let (jitter, min_step) = (self.simulator.settle_jitter_um, self.simulator.min_step_um);
        if !jitter.is_finite() || jitter < 0.0 || !min_step.is_finite() || min_step < 0.0 {
            return Err(ConfigError::Invalid("simulator distances must be finite and >= 0".to_string()));
        }
        Ok(())
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            axis: self.controller.axis,
            poll_interval: Duration::from_millis(self.controller.poll_interval_ms),
            position_tolerance: self.device.position_tolerance_um,
        }
    }

    pub fn quit_join_timeout(&self) -> Duration {
        Duration::from_millis(self.controller.quit_join_timeout_ms)
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            max_step_secs: self.confirmation.max_step_secs,
            max_total_secs: self.confirmation.max_total_secs,
        }
    }
}

// Default value functions
fn default_poll_interval_ms() -> u64 { 100 }
fn default_quit_join_timeout_ms() -> u64 { 2000 }
fn default_position_tolerance_um() -> f64 { 0.005 }
fn default_max_step_secs() -> f64 { 20.0 }
fn default_max_total_secs() -> f64 { 600.0 }
fn default_settle_jitter_um() -> f64 { 0.002 }
fn default_min_step_um() -> f64 { 0.05 }

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.controller.axis, Axis::Z);
        assert_eq!(config.controller.poll_interval_ms, 100);
        assert_eq!(config.controller.quit_join_timeout_ms, 2000);
        assert_eq!(config.device.position_tolerance_um, 0.005);
        assert_eq!(config.confirmation.max_step_secs, 20.0);
        assert_eq!(config.confirmation.max_total_secs, 600.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "[controller]\naxis = 'x'\npoll_interval_ms = 50").unwrap();
        file.flush().unwrap();
        let config = load_config(file_path.to_str().unwrap()).unwrap();
        assert_eq!(config.controller.axis, Axis::X);
        assert_eq!(config.controller_settings().poll_interval, Duration::from_millis(50));
        // Defaults for missing fields
        assert_eq!(config.controller.quit_join_timeout_ms, 2000);
        assert_eq!(config.device.position_tolerance_um, 0.005);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_file.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_load_config_rejects_zero_poll_interval() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("zero.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "[controller]\npoll_interval_ms = 0").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_non_finite_simulator_values() {
        for toml in [
            "[simulator]\nsettle_jitter_um = inf",
            "[simulator]\nsettle_jitter_um = nan",
            "[simulator]\nmin_step_um = inf",
            "[simulator]\nstart_position = [0.0, 0.0, nan]",
            "[simulator]\nstart_position = [-inf, 0.0, 0.0]",
        ] {
            let config: Config = toml::from_str(toml).unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "accepted {toml:?}"
            );
        }
    }

    #[test]
    fn test_load_config_rejects_infinite_jitter() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("jitter.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "[simulator]\nsettle_jitter_um = inf").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_full_config_parsing() {
        let toml = r#"
        [device]
        position_tolerance_um = 0.05

        [confirmation]
        max_step_secs = 5.0

        [simulator]
        start_position = [1.0, 2.0, 3.0]
        settle_jitter_um = 0.0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.device.position_tolerance_um, 0.05);
        assert_eq!(config.confirmation_policy().max_step_secs, 5.0);
        assert_eq!(config.confirmation_policy().max_total_secs, 600.0);
        assert_eq!(config.simulator.start_position, [1.0, 2.0, 3.0]);
        assert_eq!(config.simulator.min_step_um, 0.05);
        assert!(config.validate().is_ok());
    }
}
