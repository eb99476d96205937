//! Daemon configuration
//!
//! Read once at start-up from a JSON file. Every field has a default, so an
//! empty object (or no file at all) is a valid configuration.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mc_error::{MicError, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{actions, daemon, paths};
use crate::controller::DeviceProfile;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// HTTP listen address
    pub bind: String,
    pub settings_path: PathBuf,
    pub firmware_version: String,
    /// Hardware variant exposes the I2S shift setting
    pub has_shift_bits: bool,
    pub reboot_delay_ms: u64,
    /// sysfs thermal zone read by the sampling task
    pub sensor_path: PathBuf,
    pub sensor_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind: daemon::DEFAULT_BIND.to_string(),
            settings_path: paths::settings_file(),
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            has_shift_bits: true,
            reboot_delay_ms: actions::REBOOT_DELAY_MS,
            sensor_path: PathBuf::from(daemon::DEFAULT_SENSOR_PATH),
            sensor_interval_ms: daemon::DEFAULT_SENSOR_INTERVAL_MS,
        }
    }
}

impl DaemonConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| MicError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| MicError::config(format!("{}: {}", path.display(), e)))?;
        if !value.is_object() {
            return Err(MicError::config(format!(
                "{}: expected a JSON object",
                path.display()
            )));
        }
        let config: Self = serde_json::from_value(value)
            .map_err(|e| MicError::config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        if self.sensor_interval_ms == 0 {
            return Err(MicError::invalid_config(
                "sensor_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.settings_path.as_os_str().is_empty() {
            return Err(MicError::invalid_config("settings_path", "must not be empty"));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| MicError::invalid_config("bind", format!("{:?}: {}", self.bind, e)))
    }

    pub fn reboot_delay(&self) -> Duration {
        Duration::from_millis(self.reboot_delay_ms)
    }

    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_interval_ms)
    }

    pub fn device_profile(&self) -> DeviceProfile {
        DeviceProfile {
            firmware_version: self.firmware_version.clone(),
            has_shift_bits: self.has_shift_bits,
        }
    }
}
