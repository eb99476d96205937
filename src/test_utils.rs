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

//! Scripted in-memory device for console unit tests

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use mc_protocol::{
    endpoints, ActionResponse, AudioStatusPayload, PerfStatusPayload, SettingKey, StatusPayload,
    ThermalPayload,
};

use crate::app::App;
use crate::client::{ClientError, DeviceAction, DeviceApi};

pub struct DeviceScript {
    pub online: bool,
    pub status: StatusPayload,
    pub audio: AudioStatusPayload,
    pub perf: PerfStatusPayload,
    pub thermal: ThermalPayload,
    pub logs: String,
    pub action_response: ActionResponse,
    pub sets: Vec<(SettingKey, String)>,
    pub actions: Vec<DeviceAction>,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            online: true,
            status: StatusPayload {
                fw_version: "1.4.0".into(),
                ip: "192.168.1.50".into(),
                wifi_rssi: -58,
                wifi_tx_dbm: 19.5,
                free_heap_kb: 180,
                min_free_heap_kb: 150,
                uptime: "0d 01:02:03".into(),
                rtsp_server_enabled: true,
                client: String::new(),
                streaming: false,
                current_rate_pkt_s: 0,
                last_rtsp_connect: "never".into(),
                last_stream_start: "never".into(),
            },
            audio: AudioStatusPayload {
                sample_rate: 48000,
                gain: 1.0,
                buffer_size: 1024,
                i2s_shift: Some(12),
                latency_ms: 21.3,
                profile: "stable".into(),
                hp_enable: true,
                hp_cutoff_hz: 500,
                peak_pct: 0.0,
                peak_dbfs: -90.0,
                clip: false,
                clip_count: 0,
            },
            perf: PerfStatusPayload {
                restart_threshold_pkt_s: 32,
                check_interval_min: 15,
                auto_recovery: true,
                auto_threshold: true,
                recommended_min_rate: 32,
                scheduled_reset: false,
                reset_hours: 24,
            },
            thermal: ThermalPayload {
                current_c: Some(45.0),
                current_valid: true,
                max_c: 47.5,
                cpu_mhz: 160,
                protection_enabled: true,
                shutdown_c: 80,
                latched: false,
                latched_persist: false,
                sensor_fault: false,
                last_trip_c: 0.0,
                last_reason: String::new(),
                last_trip_ts: String::new(),
                last_trip_since: String::new(),
                manual_restart: false,
            },
            logs: "Boot: firmware 1.4.0\n".into(),
            action_response: ActionResponse::ok(),
            sets: Vec::new(),
            actions: Vec::new(),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeDevice(pub Rc<RefCell<DeviceScript>>);

impl FakeDevice {
    fn online<T>(&self, path: &str, f: impl FnOnce(&DeviceScript) -> T) -> Result<T, ClientError> {
        let script = self.0.borrow();
        if script.online {
            Ok(f(&script))
        } else {
            Err(ClientError::Status {
                status: 503,
                path: path.to_string(),
            })
        }
    }
}

impl DeviceApi for FakeDevice {
    fn status(&self) -> Result<StatusPayload, ClientError> {
        self.online(endpoints::STATUS, |s| s.status.clone())
    }

    fn audio_status(&self) -> Result<AudioStatusPayload, ClientError> {
        self.online(endpoints::AUDIO_STATUS, |s| s.audio.clone())
    }

    fn perf_status(&self) -> Result<PerfStatusPayload, ClientError> {
        self.online(endpoints::PERF_STATUS, |s| s.perf.clone())
    }

    fn thermal(&self) -> Result<ThermalPayload, ClientError> {
        self.online(endpoints::THERMAL, |s| s.thermal.clone())
    }

    fn logs(&self) -> Result<String, ClientError> {
        self.online(endpoints::LOGS, |s| s.logs.clone())
    }

    fn set(&self, key: SettingKey, value: &str) -> Result<ActionResponse, ClientError> {
        self.online(endpoints::SET, |_| ())?;
        self.0.borrow_mut().sets.push((key, value.to_string()));
        Ok(ActionResponse::ok())
    }

    fn action(&self, action: DeviceAction) -> Result<ActionResponse, ClientError> {
        let response = self.online(action.path(), |s| s.action_response.clone())?;
        self.0.borrow_mut().actions.push(action);
        Ok(response)
    }
}

/// App wired to a fresh scripted device, already refreshed once
pub fn test_app() -> (App, FakeDevice) {
    let device = FakeDevice::default();
    let mut app = App::new(Box::new(device.clone()), Duration::from_millis(3000));
    app.refresh();
    (app, device)
}
