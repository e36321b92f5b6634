//! Configuration file handling

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Event pump settings
    #[serde(default)]
    pub pump: PumpConfig,
}

/// Timeout settings in seconds
///
/// These bound every wait except test-module completion and the legacy
/// diagnostic path, which are unbounded on purpose (test runs may take
/// arbitrarily long).
#[derive(Debug, Deserialize)]
pub struct Timeouts {
    /// Timeout for the application to report a configuration as opened
    #[serde(default = "default_open")]
    pub open_secs: u64,

    /// Timeout for the application to confirm shutdown
    #[serde(default = "default_quit")]
    pub quit_secs: u64,

    /// Timeout for measurement start and stop confirmations
    #[serde(default = "default_measurement")]
    pub measurement_secs: u64,

    /// Timeout for a test module to report Started/Paused/Stopped
    #[serde(default = "default_module_control")]
    pub module_control_secs: u64,

    /// Default bound for a diagnostic request to leave the pending state
    #[serde(default = "default_diag_response")]
    pub diag_response_secs: u64,

    /// Timeout for a variable write to be confirmed by its change event
    #[serde(default = "default_variable_update")]
    pub variable_update_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            open_secs: default_open(),
            quit_secs: default_quit(),
            measurement_secs: default_measurement(),
            module_control_secs: default_module_control(),
            diag_response_secs: default_diag_response(),
            variable_update_secs: default_variable_update(),
        }
    }
}

fn default_open() -> u64 {
    60
}
fn default_quit() -> u64 {
    60
}
fn default_measurement() -> u64 {
    60
}
fn default_module_control() -> u64 {
    5
}
fn default_diag_response() -> u64 {
    300
}
fn default_variable_update() -> u64 {
    5
}

impl Timeouts {
    pub fn open(&self) -> Duration {
        Duration::from_secs(self.open_secs)
    }

    pub fn quit(&self) -> Duration {
        Duration::from_secs(self.quit_secs)
    }

    pub fn measurement(&self) -> Duration {
        Duration::from_secs(self.measurement_secs)
    }

    pub fn module_control(&self) -> Duration {
        Duration::from_secs(self.module_control_secs)
    }

    pub fn diag_response(&self) -> Duration {
        Duration::from_secs(self.diag_response_secs)
    }

    pub fn variable_update(&self) -> Duration {
        Duration::from_secs(self.variable_update_secs)
    }
}

/// Event pump configuration
#[derive(Debug, Deserialize)]
pub struct PumpConfig {
    /// Sleep quantum between pump rounds, in milliseconds
    #[serde(default = "default_quantum")]
    pub quantum_ms: u64,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            quantum_ms: default_quantum(),
        }
    }
}

fn default_quantum() -> u64 {
    50
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// The pump sleep quantum as a duration
    pub fn pump_quantum(&self) -> Duration {
        Duration::from_millis(self.pump.quantum_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_file_missing() {
        let config = Config::load_from(Path::new("/nonexistent/bridge.toml")).unwrap();
        assert_eq!(config.timeouts.measurement_secs, 60);
        assert_eq!(config.timeouts.module_control_secs, 5);
        assert_eq!(config.timeouts.diag_response_secs, 300);
        assert_eq!(config.pump.quantum_ms, 50);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeouts]\nmeasurement_secs = 10\n\n[pump]\nquantum_ms = 10").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.timeouts.measurement_secs, 10);
        assert_eq!(config.timeouts.open_secs, 60);
        assert_eq!(config.pump_quantum(), Duration::from_millis(10));
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeouts = \"not a table\"").unwrap();

        let err = Config::load_from(file.path()).unwrap_err();
        assert!(matches!(err, crate::common::Error::ConfigParse(_)));
    }
}
