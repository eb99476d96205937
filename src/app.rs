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

use std::time::{Duration, Instant};

use mc_core::settings::EnumDomain;
use mc_core::{normalize_input, ConcurrencyGuard, ValidationRule};
use mc_protocol::{
    AudioStatusPayload, PerfStatusPayload, SettingKey, StatusPayload, ThermalPayload,
    ERROR_THERMAL_LATCHED,
};
use serde_json::json;

use crate::client::{DeviceAction, DeviceApi};
use crate::logger::log_event;

/// First probe after a reboot request; the device needs a moment to go down
pub const RESTART_FIRST_PROBE: Duration = Duration::from_millis(4000);
pub const RESTART_RETRY: Duration = Duration::from_millis(2000);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Number,
    Toggle(EnumDomain),
}

#[derive(Clone, Debug)]
pub struct Field {
    pub key: SettingKey,
    pub label: &'static str,
    pub kind: FieldKind,
    /// Text shown (and edited) in the console
    pub value: String,
}

impl Field {
    fn new(key: SettingKey) -> Self {
        let kind = match ValidationRule::for_key(key) {
            ValidationRule::Toggle(domain) => FieldKind::Toggle(domain),
            _ => FieldKind::Number,
        };
        Self {
            key,
            label: field_label(key),
            kind,
            value: String::new(),
        }
    }
}

pub fn field_label(key: SettingKey) -> &'static str {
    match key {
        SettingKey::Rate => "Sample Rate (Hz)",
        SettingKey::Gain => "Gain",
        SettingKey::Buffer => "Buffer Size",
        SettingKey::Shift => "I2S Shift",
        SettingKey::WifiTx => "WiFi TX Power (dBm)",
        SettingKey::AutoRecovery => "Auto Recovery",
        SettingKey::ThrMode => "Threshold Mode",
        SettingKey::MinRate => "Restart Threshold (pkt/s)",
        SettingKey::CheckInterval => "Check Interval (min)",
        SettingKey::SchedReset => "Scheduled Reset",
        SettingKey::ResetHours => "Reset After (h)",
        SettingKey::CpuFreq => "CPU Frequency (MHz)",
        SettingKey::HpEnable => "High-pass",
        SettingKey::HpCutoff => "HPF Cutoff (Hz)",
        SettingKey::OhEnable => "Overheat Protection",
        SettingKey::OhLimit => "Shutdown Limit (C)",
    }
}

fn flag_text(domain: EnumDomain, value: bool) -> String {
    let (on, off) = domain.labels();
    let label = if value { on } else { off };
    label.to_string()
}

/// Device value of `key` as field text, if the payload carrying it was polled
fn polled_value(
    key: SettingKey,
    status: Option<&StatusPayload>,
    audio: Option<&AudioStatusPayload>,
    perf: Option<&PerfStatusPayload>,
    thermal: Option<&ThermalPayload>,
) -> Option<String> {
    let on_off = |v: bool| flag_text(EnumDomain::OnOff, v);
    match key {
        SettingKey::Rate => audio.map(|a| a.sample_rate.to_string()),
        SettingKey::Gain => audio.map(|a| format!("{:.2}", a.gain)),
        SettingKey::Buffer => audio.map(|a| a.buffer_size.to_string()),
        SettingKey::Shift => audio.and_then(|a| a.i2s_shift).map(|s| s.to_string()),
        SettingKey::WifiTx => status.map(|s| format!("{:.1}", s.wifi_tx_dbm)),
        SettingKey::AutoRecovery => perf.map(|p| on_off(p.auto_recovery)),
        SettingKey::ThrMode => perf.map(|p| flag_text(EnumDomain::AutoManual, p.auto_threshold)),
        SettingKey::MinRate => perf.map(|p| p.restart_threshold_pkt_s.to_string()),
        SettingKey::CheckInterval => perf.map(|p| p.check_interval_min.to_string()),
        SettingKey::SchedReset => perf.map(|p| on_off(p.scheduled_reset)),
        SettingKey::ResetHours => perf.map(|p| p.reset_hours.to_string()),
        SettingKey::CpuFreq => thermal.map(|t| t.cpu_mhz.to_string()),
        SettingKey::HpEnable => audio.map(|a| on_off(a.hp_enable)),
        SettingKey::HpCutoff => audio.map(|a| a.hp_cutoff_hz.to_string()),
        SettingKey::OhEnable => thermal.map(|t| on_off(t.protection_enabled)),
        SettingKey::OhLimit => thermal.map(|t| t.shutdown_c.to_string()),
    }
}

/// Configuration hints for the current audio settings
pub fn advice(audio: &AudioStatusPayload) -> Vec<&'static str> {
    let mut tips = Vec::new();
    if audio.buffer_size < 512 {
        tips.push("Buffer below 512 samples: expect dropouts on weak WiFi.");
    }
    if audio.buffer_size < 1024 {
        tips.push("Buffer below 1024 samples trades stability for latency.");
    }
    if audio.gain > 20.0 {
        tips.push("Gain above 20 is likely to clip; raise the I2S shift instead.");
    }
    tips
}

/// Operator-facing summary of the thermal interlock
pub fn thermal_summary(thermal: &ThermalPayload) -> &'static str {
    if thermal.latched_persist {
        "Protection latched, acknowledge to re-enable streaming"
    } else if thermal.latched {
        "Cooling required, restart streaming manually"
    } else if !thermal.protection_enabled {
        "Protection disabled"
    } else if thermal.sensor_fault {
        "Sensor unavailable, protection paused"
    } else {
        "Protection ready"
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RestartBanner {
    pub action: DeviceAction,
    pub next_probe: Instant,
}

impl RestartBanner {
    pub fn message(&self) -> &'static str {
        match self.action {
            DeviceAction::FactoryReset => "Restoring defaults and restarting...",
            _ => "Restarting device...",
        }
    }
}

pub struct App {
    device: Box<dyn DeviceApi>,
    pub fields: Vec<Field>,
    pub selected: usize,
    pub guard: ConcurrencyGuard,
    pub status: Option<StatusPayload>,
    pub audio: Option<AudioStatusPayload>,
    pub perf: Option<PerfStatusPayload>,
    pub thermal: Option<ThermalPayload>,
    pub logs: String,
    pub connected: bool,
    /// Status line shown at the bottom
    pub message: String,
    pub confirm: Option<DeviceAction>,
    pub restarting: Option<RestartBanner>,
    pub last_refresh: Instant,
    pub refresh_interval: Duration,
}

impl App {
    pub fn new(device: Box<dyn DeviceApi>, refresh_interval: Duration) -> Self {
        Self {
            device,
            fields: SettingKey::ALL.iter().copied().map(Field::new).collect(),
            selected: 0,
            guard: ConcurrencyGuard::new(),
            status: None,
            audio: None,
            perf: None,
            thermal: None,
            logs: String::new(),
            connected: false,
            message: "Connecting...".to_string(),
            confirm: None,
            restarting: None,
            last_refresh: Instant::now(),
            refresh_interval,
        }
    }

    pub fn refresh(&mut self) {
        self.refresh_at(Instant::now());
    }

    /// Poll every endpoint and reconcile the fields. While a restart banner is
    /// up only `/api/status` is probed, on its own schedule.
    pub fn refresh_at(&mut self, now: Instant) {
        self.last_refresh = now;

        if let Some(banner) = self.restarting {
            if now < banner.next_probe {
                return;
            }
            match self.device.status() {
                Ok(status) => {
                    self.restarting = None;
                    self.status = Some(status);
                    self.message = "Device is back online".to_string();
                    log_event("device_back", json!({}));
                }
                Err(_) => {
                    self.restarting = Some(RestartBanner {
                        next_probe: now + RESTART_RETRY,
                        ..banner
                    });
                    return;
                }
            }
        }

        if let Err(e) = self.poll() {
            if self.connected {
                log_event("disconnected", json!({ "error": e.to_string() }));
            }
            self.connected = false;
            self.message = format!("Device unreachable: {}", e);
            return;
        }
        if !self.connected {
            self.connected = true;
            if self.message.starts_with("Device unreachable") || self.message == "Connecting..." {
                self.message = "Connected".to_string();
            }
        }

        if self.audio.as_ref().is_some_and(|a| a.i2s_shift.is_none()) {
            self.hide_field(SettingKey::Shift);
        }

        for field in self.fields.iter_mut() {
            let polled = polled_value(
                field.key,
                self.status.as_ref(),
                self.audio.as_ref(),
                self.perf.as_ref(),
                self.thermal.as_ref(),
            );
            if let Some(polled) = polled {
                self.guard.reconcile(field.key, &mut field.value, polled, now);
            }
        }
        self.guard.prune(now);
    }

    fn poll(&mut self) -> Result<(), crate::client::ClientError> {
        self.status = Some(self.device.status()?);
        self.audio = Some(self.device.audio_status()?);
        self.perf = Some(self.device.perf_status()?);
        self.thermal = Some(self.device.thermal()?);
        self.logs = self.device.logs()?;
        Ok(())
    }

    fn hide_field(&mut self, key: SettingKey) {
        let before = self.fields.len();
        self.fields.retain(|f| f.key != key);
        if self.fields.len() != before {
            self.selected = self.selected.min(self.fields.len().saturating_sub(1));
        }
    }

    pub fn field(&self, key: SettingKey) -> Option<&Field> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn selected_field(&self) -> Option<&Field> {
        self.fields.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.fields.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Whether the field is rendered as dirty
    pub fn is_dirty(&self, key: SettingKey, now: Instant) -> bool {
        self.guard.is_editing(key, now)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Append a character to a numeric field. Returns false when rejected.
    pub fn type_char(&mut self, c: char, now: Instant) -> bool {
        let Some(field) = self.fields.get_mut(self.selected) else {
            return false;
        };
        if field.kind != FieldKind::Number || !(c.is_ascii_digit() || matches!(c, '.' | ',' | '-')) {
            return false;
        }
        field.value.push(c);
        self.guard.mark_edit(field.key, now);
        true
    }

    pub fn backspace(&mut self, now: Instant) {
        if let Some(field) = self.fields.get_mut(self.selected) {
            if field.kind == FieldKind::Number {
                field.value.pop();
                self.guard.mark_edit(field.key, now);
            }
        }
    }

    /// Flip a two-valued field between its labels
    pub fn toggle_selected(&mut self, now: Instant) {
        if let Some(field) = self.fields.get_mut(self.selected) {
            if let FieldKind::Toggle(domain) = field.kind {
                let (on, _) = domain.labels();
                field.value = flag_text(domain, field.value != on);
                self.guard.mark_edit(field.key, now);
            }
        }
    }

    /// Send the selected field to the device. Empty input is dropped without a
    /// request.
    pub fn submit_selected(&mut self, now: Instant) {
        let Some(field) = self.fields.get_mut(self.selected) else {
            return;
        };
        let key = field.key;
        let Some(value) = normalize_input(&field.value) else {
            self.message = format!("{}: nothing to submit", field.label);
            return;
        };
        field.value = value.clone();
        self.guard.submit(key, now);

        match self.device.set(key, &value) {
            Ok(_) => {
                self.message = format!("Set {} = {}", key, value);
                log_event("set", json!({ "key": key.as_str(), "value": value }));
            }
            Err(e) => {
                self.message = format!("Set {} failed: {}", key, e);
                log_event("set_failed", json!({ "key": key.as_str(), "error": e.to_string() }));
            }
        }
        self.refresh_at(now);
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    pub fn request_action(&mut self, action: DeviceAction, now: Instant) {
        if action.needs_confirmation() {
            self.confirm = Some(action);
            return;
        }
        self.perform_action(action, now);
    }

    pub fn confirm_pending(&mut self, now: Instant) {
        if let Some(action) = self.confirm.take() {
            self.perform_action(action, now);
        }
    }

    pub fn cancel_pending(&mut self) {
        if let Some(action) = self.confirm.take() {
            self.message = format!("{} cancelled", action.label());
        }
    }

    fn perform_action(&mut self, action: DeviceAction, now: Instant) {
        let result = self.device.action(action);
        log_event(
            "action",
            json!({
                "name": action.label(),
                "ok": result.as_ref().map(|r| r.ok).unwrap_or(false),
            }),
        );

        match result {
            Ok(response) if response.ok => {
                self.message = format!("{} requested", action.label());
                if action.restarts_device() {
                    self.restarting = Some(RestartBanner {
                        action,
                        next_probe: now + RESTART_FIRST_PROBE,
                    });
                    return;
                }
            }
            Ok(response) if response.error.as_deref() == Some(ERROR_THERMAL_LATCHED) => {
                self.message =
                    "Streaming blocked: thermal protection latched, clear the latch first".to_string();
            }
            Ok(_) => {
                self.message = format!("{} refused by device", action.label());
            }
            Err(e) => {
                self.message = format!("{} failed: {}", action.label(), e);
            }
        }
        self.refresh_at(now);
    }

    pub fn advice(&self) -> Vec<&'static str> {
        self.audio.as_ref().map(advice).unwrap_or_default()
    }
}
