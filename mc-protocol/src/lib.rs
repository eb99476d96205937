use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP paths served by the device
pub mod endpoints {
    pub const STATUS: &str = "/api/status";
    pub const AUDIO_STATUS: &str = "/api/audio_status";
    pub const PERF_STATUS: &str = "/api/perf_status";
    pub const THERMAL: &str = "/api/thermal";
    pub const THERMAL_CLEAR: &str = "/api/thermal/clear";
    pub const LOGS: &str = "/api/logs";
    pub const SET: &str = "/api/set";
    pub const SERVER_START: &str = "/api/action/server_start";
    pub const SERVER_STOP: &str = "/api/action/server_stop";
    pub const RESET_AUDIO: &str = "/api/action/reset_i2s";
    pub const REBOOT: &str = "/api/action/reboot";
    pub const FACTORY_RESET: &str = "/api/action/factory_reset";
}

/// Error tag returned when the stream is started while the thermal latch holds
pub const ERROR_THERMAL_LATCHED: &str = "thermal_latched";

/// Runtime-tunable setting identifiers, as used in `/api/set?key=`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    Rate,
    Gain,
    Buffer,
    Shift,
    WifiTx,
    AutoRecovery,
    ThrMode,
    MinRate,
    CheckInterval,
    SchedReset,
    ResetHours,
    CpuFreq,
    HpEnable,
    HpCutoff,
    OhEnable,
    OhLimit,
}

impl SettingKey {
    pub const ALL: [SettingKey; 16] = [
        SettingKey::Rate,
        SettingKey::Gain,
        SettingKey::Buffer,
        SettingKey::Shift,
        SettingKey::WifiTx,
        SettingKey::AutoRecovery,
        SettingKey::ThrMode,
        SettingKey::MinRate,
        SettingKey::CheckInterval,
        SettingKey::SchedReset,
        SettingKey::ResetHours,
        SettingKey::CpuFreq,
        SettingKey::HpEnable,
        SettingKey::HpCutoff,
        SettingKey::OhEnable,
        SettingKey::OhLimit,
    ];

    /// Wire name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::Rate => "rate",
            SettingKey::Gain => "gain",
            SettingKey::Buffer => "buffer",
            SettingKey::Shift => "shift",
            SettingKey::WifiTx => "wifi_tx",
            SettingKey::AutoRecovery => "auto_recovery",
            SettingKey::ThrMode => "thr_mode",
            SettingKey::MinRate => "min_rate",
            SettingKey::CheckInterval => "check_interval",
            SettingKey::SchedReset => "sched_reset",
            SettingKey::ResetHours => "reset_hours",
            SettingKey::CpuFreq => "cpu_freq",
            SettingKey::HpEnable => "hp_enable",
            SettingKey::HpCutoff => "hp_cutoff",
            SettingKey::OhEnable => "oh_enable",
            SettingKey::OhLimit => "oh_limit",
        }
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown setting key: {}", s))
    }
}

/// Query string of `/api/set`. Both fields are optional on the wire; a missing
/// key or value is absorbed by the device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetQuery {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

impl SetQuery {
    /// Build from decoded query pairs. A repeated `key` or `value` keeps its
    /// first occurrence; unrelated parameters are ignored.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut query = Self::default();
        for (name, value) in pairs {
            match name.as_str() {
                "key" if query.key.is_none() => query.key = Some(value),
                "value" if query.value.is_none() => query.value = Some(value),
                _ => {}
            }
        }
        query
    }
}

/// `{ok:..}` body returned by actions and `/api/set`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    /// Failure without detail (thermal clear when not latched)
    pub fn failed() -> Self {
        Self { ok: false, error: None }
    }

    pub fn thermal_latched() -> Self {
        Self {
            ok: false,
            error: Some(ERROR_THERMAL_LATCHED.to_string()),
        }
    }
}

/// `/api/status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub fw_version: String,
    pub ip: String,
    pub wifi_rssi: i32,
    pub wifi_tx_dbm: f32,
    pub free_heap_kb: u64,
    pub min_free_heap_kb: u64,
    pub uptime: String,
    pub rtsp_server_enabled: bool,
    /// Connected client address, empty when none
    pub client: String,
    pub streaming: bool,
    pub current_rate_pkt_s: u32,
    pub last_rtsp_connect: String,
    pub last_stream_start: String,
}

/// `/api/audio_status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStatusPayload {
    pub sample_rate: u32,
    pub gain: f32,
    pub buffer_size: u16,
    /// Only reported on hardware variants with shift bits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i2s_shift: Option<u8>,
    pub latency_ms: f32,
    pub profile: String,
    pub hp_enable: bool,
    pub hp_cutoff_hz: u16,
    pub peak_pct: f32,
    pub peak_dbfs: f32,
    pub clip: bool,
    pub clip_count: u32,
}

/// `/api/perf_status`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfStatusPayload {
    pub restart_threshold_pkt_s: u32,
    pub check_interval_min: u32,
    pub auto_recovery: bool,
    pub auto_threshold: bool,
    pub recommended_min_rate: u32,
    pub scheduled_reset: bool,
    pub reset_hours: u32,
}

/// `/api/thermal`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalPayload {
    /// `null` when the sensor reading is invalid
    pub current_c: Option<f32>,
    pub current_valid: bool,
    pub max_c: f32,
    pub cpu_mhz: u32,
    pub protection_enabled: bool,
    pub shutdown_c: u32,
    /// Transient lockout
    pub latched: bool,
    /// Persistent latch, cleared only through `/api/thermal/clear`
    pub latched_persist: bool,
    pub sensor_fault: bool,
    pub last_trip_c: f32,
    pub last_reason: String,
    pub last_trip_ts: String,
    pub last_trip_since: String,
    pub manual_restart: bool,
}
