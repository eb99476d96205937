//! Device state aggregate
//!
//! `DeviceState` owns everything the control plane mutates: the tunable
//! settings, the thermal flags reported by the trip detector, the streaming
//! actuator flag and the diagnostic log. Components receive it by reference;
//! settings and flags are only writable from inside this crate.

use std::time::{Duration, Instant};

use mc_protocol::SettingKey;
use serde::{Deserialize, Serialize};

use crate::constants::{audio, cpu, perf, wifi};
use crate::log_ring::LogRingBuffer;

// ============================================================================
// Settings
// ============================================================================

/// Runtime-tunable settings, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub sample_rate: u32,
    pub gain: f32,
    pub buffer_size: u16,
    /// Right shift applied to raw I2S samples (hardware variants with shift bits)
    pub shift_bits: u8,
    pub wifi_tx_dbm: f32,
    pub auto_recovery: bool,
    /// Restart threshold follows the recommender when set
    pub auto_threshold: bool,
    /// Minimum acceptable packet rate before a pipeline restart
    pub min_rate: u32,
    pub check_interval_min: u32,
    pub scheduled_reset: bool,
    pub reset_hours: u32,
    pub cpu_mhz: u32,
    pub hp_enable: bool,
    pub hp_cutoff_hz: u16,
    pub overheat_protection: bool,
    pub overheat_limit_c: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            gain: 1.0,
            buffer_size: 1024,
            shift_bits: 12,
            wifi_tx_dbm: 19.5,
            auto_recovery: true,
            auto_threshold: true,
            min_rate: 50,
            check_interval_min: 15,
            scheduled_reset: false,
            reset_hours: 24,
            cpu_mhz: 160,
            hp_enable: true,
            hp_cutoff_hz: 500,
            overheat_protection: true,
            overheat_limit_c: 80,
        }
    }
}

impl Settings {
    /// Pull every field back into its validation domain.
    ///
    /// Used on values read from disk, which may have been edited by hand or
    /// written by another firmware revision. Returns the keys that changed.
    pub fn clamp_to_domain(&mut self) -> Vec<SettingKey> {
        let before = self.clone();

        self.sample_rate = self
            .sample_rate
            .clamp(audio::MIN_SAMPLE_RATE, audio::MAX_SAMPLE_RATE);
        self.gain = clamp_f32(self.gain, audio::MIN_GAIN, audio::MAX_GAIN, Settings::default().gain);
        self.buffer_size = self.buffer_size.clamp(audio::MIN_BUFFER, audio::MAX_BUFFER);
        self.shift_bits = self.shift_bits.min(audio::MAX_SHIFT_BITS);
        self.wifi_tx_dbm = crate::settings::snap_wifi_tx(clamp_f32(
            self.wifi_tx_dbm,
            wifi::MIN_TX_DBM,
            wifi::MAX_TX_DBM,
            wifi::MAX_TX_DBM,
        ));
        self.min_rate = self.min_rate.clamp(perf::MIN_RATE, perf::MAX_RATE);
        self.check_interval_min = self
            .check_interval_min
            .clamp(perf::MIN_CHECK_INTERVAL_MIN, perf::MAX_CHECK_INTERVAL_MIN);
        self.reset_hours = self
            .reset_hours
            .clamp(perf::MIN_RESET_HOURS, perf::MAX_RESET_HOURS);
        self.cpu_mhz = self.cpu_mhz.clamp(cpu::MIN_MHZ, cpu::MAX_MHZ);
        self.hp_cutoff_hz = self
            .hp_cutoff_hz
            .clamp(audio::MIN_HP_CUTOFF_HZ, audio::MAX_HP_CUTOFF_HZ);
        self.overheat_limit_c = crate::settings::snap_thermal_limit(self.overheat_limit_c);

        let mut changed = Vec::new();
        let pairs = [
            (SettingKey::Rate, before.sample_rate != self.sample_rate),
            (SettingKey::Gain, before.gain != self.gain),
            (SettingKey::Buffer, before.buffer_size != self.buffer_size),
            (SettingKey::Shift, before.shift_bits != self.shift_bits),
            (SettingKey::WifiTx, before.wifi_tx_dbm != self.wifi_tx_dbm),
            (SettingKey::MinRate, before.min_rate != self.min_rate),
            (SettingKey::CheckInterval, before.check_interval_min != self.check_interval_min),
            (SettingKey::ResetHours, before.reset_hours != self.reset_hours),
            (SettingKey::CpuFreq, before.cpu_mhz != self.cpu_mhz),
            (SettingKey::HpCutoff, before.hp_cutoff_hz != self.hp_cutoff_hz),
            (SettingKey::OhLimit, before.overheat_limit_c != self.overheat_limit_c),
        ];
        for (key, differs) in pairs {
            if differs {
                changed.push(key);
            }
        }
        changed
    }
}

/// NaN falls back to `fallback`, everything else is clamped
fn clamp_f32(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(min, max)
    }
}

// ============================================================================
// Thermal flags
// ============================================================================

/// Last trip event reported by the trip detector
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripRecord {
    pub temperature_c: f32,
    /// Monotonic instant of the trip, used for "since" strings
    pub triggered_at: Option<Instant>,
    pub reason: String,
    /// Human-readable wall-clock timestamp supplied by the detector
    pub timestamp: String,
}

/// Flags written by the external trip detector and read by this crate.
///
/// The two latch bits are orthogonal: configuration changes drop the
/// transient bit only, an operator acknowledgement drops both.
#[derive(Debug, Clone, Default)]
pub struct ThermalFlags {
    transient_lockout: bool,
    persistent_latch: bool,
    sensor_fault: bool,
    current_c: Option<f32>,
    max_c: f32,
    trip: TripRecord,
}

impl ThermalFlags {
    pub fn transient_lockout(&self) -> bool {
        self.transient_lockout
    }

    pub fn persistent_latch(&self) -> bool {
        self.persistent_latch
    }

    pub fn sensor_fault(&self) -> bool {
        self.sensor_fault
    }

    /// Latest valid reading, `None` while the sensor is faulted
    pub fn current_c(&self) -> Option<f32> {
        self.current_c
    }

    pub fn max_c(&self) -> f32 {
        self.max_c
    }

    pub fn trip(&self) -> &TripRecord {
        &self.trip
    }

    pub(crate) fn clear_transient(&mut self) {
        self.transient_lockout = false;
    }

    pub(crate) fn clear_latches(&mut self) {
        self.transient_lockout = false;
        self.persistent_latch = false;
    }

    pub(crate) fn trip_mut(&mut self) -> &mut TripRecord {
        &mut self.trip
    }

    pub(crate) fn record_sample(&mut self, reading: Option<f32>) {
        match reading {
            Some(c) if c.is_finite() => {
                self.sensor_fault = false;
                self.current_c = Some(c);
                if c > self.max_c {
                    self.max_c = c;
                }
            }
            _ => {
                self.sensor_fault = true;
                self.current_c = None;
            }
        }
    }

    pub(crate) fn record_trip(&mut self, trip: TripRecord, persistent: bool) {
        if persistent {
            self.persistent_latch = true;
        } else {
            self.transient_lockout = true;
        }
        self.trip = trip;
    }
}

/// Derived protection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalState {
    Disabled,
    Armed,
    SensorFault,
    TransientLockout,
    PersistentLatch,
}

impl ThermalState {
    /// A held latch outranks everything, including disabled protection
    pub fn derive(protection_enabled: bool, flags: &ThermalFlags) -> Self {
        if flags.persistent_latch {
            ThermalState::PersistentLatch
        } else if flags.transient_lockout {
            ThermalState::TransientLockout
        } else if !protection_enabled {
            ThermalState::Disabled
        } else if flags.sensor_fault {
            ThermalState::SensorFault
        } else {
            ThermalState::Armed
        }
    }
}

// ============================================================================
// Persisted snapshot
// ============================================================================

/// Latch record that survives a restart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedLatch {
    pub latched: bool,
    pub trip_c: f32,
    pub reason: String,
    pub timestamp: String,
}

/// What the settings store writes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub latch: PersistedLatch,
}

// ============================================================================
// DeviceState
// ============================================================================

#[derive(Debug, Clone)]
pub struct DeviceState {
    settings: Settings,
    thermal: ThermalFlags,
    streaming_enabled: bool,
    log: LogRingBuffer,
    booted_at: Instant,
}

impl DeviceState {
    pub fn new(settings: Settings, booted_at: Instant) -> Self {
        Self {
            settings,
            thermal: ThermalFlags::default(),
            streaming_enabled: true,
            log: LogRingBuffer::new(),
            booted_at,
        }
    }

    /// Rebuild state from a persisted snapshot. A restored persistent latch
    /// keeps the streaming actuator off.
    pub fn restore(persisted: PersistedState, booted_at: Instant) -> Self {
        let mut state = Self::new(persisted.settings, booted_at);
        if persisted.latch.latched {
            state.thermal.persistent_latch = true;
            state.thermal.trip = TripRecord {
                temperature_c: persisted.latch.trip_c,
                triggered_at: None,
                reason: persisted.latch.reason,
                timestamp: persisted.latch.timestamp,
            };
            state.streaming_enabled = false;
        }
        state
    }

    pub fn persisted(&self) -> PersistedState {
        PersistedState {
            settings: self.settings.clone(),
            latch: PersistedLatch {
                latched: self.thermal.persistent_latch,
                trip_c: self.thermal.trip.temperature_c,
                reason: self.thermal.trip.reason.clone(),
                timestamp: self.thermal.trip.timestamp.clone(),
            },
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn thermal(&self) -> &ThermalFlags {
        &self.thermal
    }

    pub(crate) fn thermal_mut(&mut self) -> &mut ThermalFlags {
        &mut self.thermal
    }

    pub fn thermal_state(&self) -> ThermalState {
        ThermalState::derive(self.settings.overheat_protection, &self.thermal)
    }

    /// Streaming actuator flag (`rtsp_server_enabled`)
    pub fn streaming_enabled(&self) -> bool {
        self.streaming_enabled
    }

    pub(crate) fn set_streaming_enabled(&mut self, enabled: bool) {
        self.streaming_enabled = enabled;
    }

    pub fn log(&self) -> &LogRingBuffer {
        &self.log
    }

    /// Append a line to the diagnostic log
    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line);
    }

    pub fn uptime(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.booted_at)
    }

    pub(crate) fn reset_settings(&mut self) {
        self.settings = Settings::default();
        self.thermal.clear_latches();
        self.thermal.trip = TripRecord::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::thermal;

    #[test]
    fn test_defaults_are_in_domain() {
        let mut s = Settings::default();
        assert!(s.clamp_to_domain().is_empty());
        assert_eq!((s.overheat_limit_c - thermal::LIMIT_MIN_C) % thermal::LIMIT_STEP_C, 0);
    }

    #[test]
    fn test_clamp_reports_changed_keys() {
        let mut s = Settings {
            sample_rate: 200_000,
            buffer_size: 10,
            overheat_limit_c: 77,
            gain: f32::NAN,
            ..Settings::default()
        };
        let changed = s.clamp_to_domain();
        assert_eq!(s.sample_rate, 96000);
        assert_eq!(s.buffer_size, 256);
        assert_eq!(s.overheat_limit_c, 75);
        assert_eq!(s.gain, 1.0);
        assert!(changed.contains(&SettingKey::Rate));
        assert!(changed.contains(&SettingKey::Buffer));
        assert!(changed.contains(&SettingKey::OhLimit));
        assert!(changed.contains(&SettingKey::Gain));
        assert!(!changed.contains(&SettingKey::CpuFreq));
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let s: Settings = serde_json::from_str(r#"{"gain": 2.5}"#).unwrap();
        assert_eq!(s.gain, 2.5);
        assert_eq!(s.sample_rate, 48000);
    }

    #[test]
    fn test_thermal_state_priority() {
        let mut flags = ThermalFlags::default();
        assert_eq!(ThermalState::derive(true, &flags), ThermalState::Armed);
        assert_eq!(ThermalState::derive(false, &flags), ThermalState::Disabled);

        flags.record_sample(None);
        assert_eq!(ThermalState::derive(true, &flags), ThermalState::SensorFault);

        assert_eq!(ThermalState::derive(false, &flags), ThermalState::Disabled);

        flags.record_trip(TripRecord::default(), false);
        assert_eq!(ThermalState::derive(true, &flags), ThermalState::TransientLockout);
        assert_eq!(ThermalState::derive(false, &flags), ThermalState::TransientLockout);

        flags.record_trip(TripRecord::default(), true);
        assert_eq!(ThermalState::derive(true, &flags), ThermalState::PersistentLatch);
        assert_eq!(ThermalState::derive(false, &flags), ThermalState::PersistentLatch);
    }

    #[test]
    fn test_record_sample_tracks_peak() {
        let mut flags = ThermalFlags::default();
        flags.record_sample(Some(41.0));
        flags.record_sample(Some(55.5));
        flags.record_sample(Some(43.0));
        assert_eq!(flags.current_c(), Some(43.0));
        assert_eq!(flags.max_c(), 55.5);

        flags.record_sample(Some(f32::NAN));
        assert!(flags.sensor_fault());
        assert_eq!(flags.current_c(), None);
        assert_eq!(flags.max_c(), 55.5);
    }

    #[test]
    fn test_restore_with_latch_keeps_streaming_off() {
        let persisted = PersistedState {
            settings: Settings::default(),
            latch: PersistedLatch {
                latched: true,
                trip_c: 86.0,
                reason: "Overheat".into(),
                timestamp: "2026-01-01 12:00".into(),
            },
        };
        let state = DeviceState::restore(persisted.clone(), Instant::now());
        assert!(!state.streaming_enabled());
        assert_eq!(state.thermal_state(), ThermalState::PersistentLatch);
        assert_eq!(state.persisted(), persisted);
    }

    #[test]
    fn test_fresh_state_streams() {
        let state = DeviceState::restore(PersistedState::default(), Instant::now());
        assert!(state.streaming_enabled());
        assert!(state.log().is_empty());
    }
}
