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

//! HTTP access to the device API

use std::time::Duration;

use mc_protocol::{
    endpoints, ActionResponse, AudioStatusPayload, PerfStatusPayload, SettingKey, StatusPayload,
    ThermalPayload,
};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Requests must finish well inside the poll interval
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(2500);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("device answered {status} for {path}")]
    Status { status: u16, path: String },
}

/// Device-side operations triggered from the console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAction {
    ServerStart,
    ServerStop,
    ResetAudio,
    ClearThermalLatch,
    Reboot,
    FactoryReset,
}

impl DeviceAction {
    pub fn path(&self) -> &'static str {
        match self {
            DeviceAction::ServerStart => endpoints::SERVER_START,
            DeviceAction::ServerStop => endpoints::SERVER_STOP,
            DeviceAction::ResetAudio => endpoints::RESET_AUDIO,
            DeviceAction::ClearThermalLatch => endpoints::THERMAL_CLEAR,
            DeviceAction::Reboot => endpoints::REBOOT,
            DeviceAction::FactoryReset => endpoints::FACTORY_RESET,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceAction::ServerStart => "Server start",
            DeviceAction::ServerStop => "Server stop",
            DeviceAction::ResetAudio => "Audio restart",
            DeviceAction::ClearThermalLatch => "Thermal latch clear",
            DeviceAction::Reboot => "Reboot",
            DeviceAction::FactoryReset => "Factory reset",
        }
    }

    /// Clearing the latch is the only state change sent as POST
    pub fn is_post(&self) -> bool {
        matches!(self, DeviceAction::ClearThermalLatch)
    }

    /// The device goes away shortly after acknowledging these
    pub fn restarts_device(&self) -> bool {
        matches!(self, DeviceAction::Reboot | DeviceAction::FactoryReset)
    }

    pub fn needs_confirmation(&self) -> bool {
        self.restarts_device()
    }
}

/// Everything the console asks of a device
pub trait DeviceApi {
    fn status(&self) -> Result<StatusPayload, ClientError>;
    fn audio_status(&self) -> Result<AudioStatusPayload, ClientError>;
    fn perf_status(&self) -> Result<PerfStatusPayload, ClientError>;
    fn thermal(&self) -> Result<ThermalPayload, ClientError>;
    fn logs(&self) -> Result<String, ClientError>;
    fn set(&self, key: SettingKey, value: &str) -> Result<ActionResponse, ClientError>;
    fn action(&self, action: DeviceAction) -> Result<ActionResponse, ClientError>;
}

pub struct HttpDevice {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpDevice {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn check(
        response: reqwest::blocking::Response,
        path: &str,
    ) -> Result<reqwest::blocking::Response, ClientError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(ClientError::Status {
                status: response.status().as_u16(),
                path: path.to_string(),
            })
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.http.get(self.url(path)).send()?;
        Ok(Self::check(response, path)?.json()?)
    }
}

impl DeviceApi for HttpDevice {
    fn status(&self) -> Result<StatusPayload, ClientError> {
        self.get_json(endpoints::STATUS)
    }

    fn audio_status(&self) -> Result<AudioStatusPayload, ClientError> {
        self.get_json(endpoints::AUDIO_STATUS)
    }

    fn perf_status(&self) -> Result<PerfStatusPayload, ClientError> {
        self.get_json(endpoints::PERF_STATUS)
    }

    fn thermal(&self) -> Result<ThermalPayload, ClientError> {
        self.get_json(endpoints::THERMAL)
    }

    fn logs(&self) -> Result<String, ClientError> {
        let response = self.http.get(self.url(endpoints::LOGS)).send()?;
        Ok(Self::check(response, endpoints::LOGS)?.text()?)
    }

    fn set(&self, key: SettingKey, value: &str) -> Result<ActionResponse, ClientError> {
        let response = self
            .http
            .get(self.url(endpoints::SET))
            .query(&[("key", key.as_str()), ("value", value)])
            .send()?;
        Ok(Self::check(response, endpoints::SET)?.json()?)
    }

    fn action(&self, action: DeviceAction) -> Result<ActionResponse, ClientError> {
        let url = self.url(action.path());
        let request = if action.is_post() {
            self.http.post(url)
        } else {
            self.http.get(url)
        };
        let response = request.send()?;
        Ok(Self::check(response, action.path())?.json()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let device = HttpDevice::new("http://10.0.0.7/").unwrap();
        assert_eq!(device.base_url(), "http://10.0.0.7");
        assert_eq!(device.url(endpoints::STATUS), "http://10.0.0.7/api/status");
    }

    #[test]
    fn test_only_restarts_need_confirmation() {
        let confirmed: Vec<_> = [
            DeviceAction::ServerStart,
            DeviceAction::ServerStop,
            DeviceAction::ResetAudio,
            DeviceAction::ClearThermalLatch,
            DeviceAction::Reboot,
            DeviceAction::FactoryReset,
        ]
        .into_iter()
        .filter(|a| a.needs_confirmation())
        .collect();
        assert_eq!(confirmed, vec![DeviceAction::Reboot, DeviceAction::FactoryReset]);
    }

    #[test]
    fn test_latch_clear_is_post() {
        assert!(DeviceAction::ClearThermalLatch.is_post());
        assert_eq!(DeviceAction::ClearThermalLatch.path(), "/api/thermal/clear");
        assert!(!DeviceAction::Reboot.is_post());
    }

    #[test]
    fn test_unreachable_device_is_http_error() {
        // Nothing listens on the loopback discard port
        let device = HttpDevice::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(device.status(), Err(ClientError::Http(_))));
    }
}
