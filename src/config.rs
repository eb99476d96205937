/*
 * This file is part of micctl.
 *
 * Copyright (C) 2025 micctl contributors
 *
 * micctl is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * micctl is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with micctl. If not, see <https://www.gnu.org/licenses/>.
 */

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_DEVICE_URL: &str = "http://localhost";

/// Matches the refresh cadence of the device's own web page
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;

/// Lower bound applied to a configured poll interval
pub const MIN_POLL_INTERVAL_MS: u64 = 250;

fn default_device_url() -> String {
    DEFAULT_DEVICE_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// Base URL of the device, without a trailing `/api`
    #[serde(default = "default_device_url")]
    pub device_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            device_url: default_device_url(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ConsoleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(MIN_POLL_INTERVAL_MS))
    }
}

pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("micctl");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home).join(".config").join("micctl");
    }
    PathBuf::from("/etc/micctl")
}

pub fn config_path() -> PathBuf {
    config_dir().join("console.json")
}

/// Missing or unreadable files fall back to defaults
pub fn load_console_config() -> ConsoleConfig {
    load_console_config_from(&config_path())
}

pub fn load_console_config_from(path: &Path) -> ConsoleConfig {
    fs::read_to_string(path)
        .ok()
        .and_then(|data| serde_json::from_str(&data).ok())
        .unwrap_or_default()
}

pub fn save_console_config(config: &ConsoleConfig) -> anyhow::Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_config_path_uses_xdg() {
        let dir = TempDir::new().unwrap();
        env::set_var("XDG_CONFIG_HOME", dir.path());
        assert_eq!(config_path(), dir.path().join("micctl").join("console.json"));
        env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    #[serial]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        env::set_var("XDG_CONFIG_HOME", dir.path());

        assert_eq!(load_console_config(), ConsoleConfig::default());

        let config = ConsoleConfig {
            device_url: "http://10.0.0.7".to_string(),
            poll_interval_ms: 1500,
        };
        save_console_config(&config).unwrap();
        assert_eq!(load_console_config(), config);

        env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("console.json");
        fs::write(&path, r#"{"device_url":"http://mic.local"}"#).unwrap();

        let config = load_console_config_from(&path);
        assert_eq!(config.device_url, "http://mic.local");
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_garbage_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("console.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(load_console_config_from(&path), ConsoleConfig::default());
    }

    #[test]
    fn test_poll_interval_floor() {
        let config = ConsoleConfig {
            poll_interval_ms: 10,
            ..ConsoleConfig::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(MIN_POLL_INTERVAL_MS));
    }
}
