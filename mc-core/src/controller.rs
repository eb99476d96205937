//! Controller facade
//!
//! One `Controller` owns the device state and its collaborators. Each method
//! maps to one HTTP endpoint and runs to completion synchronously; the daemon
//! wraps the controller in a mutex and never holds it across an await.

use std::time::Instant;

use mc_error::Result;
use mc_protocol::{AudioStatusPayload, PerfStatusPayload, StatusPayload, ThermalPayload};
use tracing::{info, warn};

use crate::device::{DeviceState, PersistedState};
use crate::peripherals::Peripherals;
use crate::settings::{SettingValue, SettingsRegistry};
use crate::status::StatusAggregator;
use crate::thermal::ThermalControlSurface;

/// Build-time options of the device
#[derive(Debug, Clone)]
pub struct DeviceProfile {
    pub firmware_version: String,
    pub has_shift_bits: bool,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            firmware_version: env!("CARGO_PKG_VERSION").to_string(),
            has_shift_bits: true,
        }
    }
}

#[derive(Debug)]
pub struct Controller {
    state: DeviceState,
    io: Peripherals,
    registry: SettingsRegistry,
    status: StatusAggregator,
}

impl Controller {
    pub fn new(state: DeviceState, io: Peripherals, profile: DeviceProfile) -> Self {
        Self {
            state,
            io,
            registry: SettingsRegistry::new(profile.has_shift_bits),
            status: StatusAggregator::new(profile.firmware_version, profile.has_shift_bits),
        }
    }

    /// Load persisted state and bring the collaborators up to match it.
    ///
    /// A store that cannot be read falls back to defaults. The stream server
    /// is started unless a persistent latch was restored.
    pub fn boot(mut io: Peripherals, profile: DeviceProfile, now: Instant) -> Self {
        let persisted = match io.store.load() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                info!("No stored settings, using defaults");
                PersistedState::default()
            }
            Err(e) => {
                warn!("Failed to load stored settings, using defaults: {}", e);
                PersistedState::default()
            }
        };

        let mut state = DeviceState::restore(persisted, now);
        let settings = state.settings().clone();

        if let Err(e) = io.platform.set_cpu_frequency(settings.cpu_mhz) {
            warn!("Failed to set CPU frequency at boot: {}", e);
        }
        if let Err(e) = io.platform.apply_wifi_tx_power(settings.wifi_tx_dbm) {
            warn!("Failed to apply Wi-Fi TX power at boot: {}", e);
        }
        if let Err(e) = io.pipeline.restart(&settings) {
            warn!("Audio pipeline failed to start: {}", e);
        }
        io.pipeline
            .update_highpass(settings.hp_enable, settings.hp_cutoff_hz, settings.sample_rate);

        if state.streaming_enabled() {
            if let Err(e) = io.server.start() {
                warn!("Stream server failed to start: {}", e);
                state.set_streaming_enabled(false);
            }
        } else {
            warn!("Thermal latch restored from storage, stream server held off");
            state.push_log("Boot: thermal protection latched, streaming disabled");
        }
        state.push_log(format!("Boot: firmware {}", profile.firmware_version));

        Self::new(state, io, profile)
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    // ------------------------------------------------------------------------
    // Read paths
    // ------------------------------------------------------------------------

    pub fn status(&self, now: Instant) -> StatusPayload {
        self.status.status(&self.state, &self.io, now)
    }

    pub fn audio_status(&self) -> AudioStatusPayload {
        self.status.audio_status(&self.state, &self.io)
    }

    pub fn perf_status(&self) -> PerfStatusPayload {
        self.status.perf_status(&self.state, &self.io)
    }

    pub fn thermal(&self, now: Instant) -> ThermalPayload {
        self.status.thermal(&self.state, &self.io, now)
    }

    pub fn logs(&self) -> String {
        self.state.log().render_text()
    }

    // ------------------------------------------------------------------------
    // Write paths
    // ------------------------------------------------------------------------

    pub fn set(&mut self, key: &str, value: Option<&str>) -> Result<SettingValue> {
        self.registry.apply(&mut self.state, &mut self.io, key, value)
    }

    pub fn start_streaming(&mut self) -> Result<()> {
        self.thermal_surface().start_streaming()
    }

    pub fn stop_streaming(&mut self) {
        self.thermal_surface().stop_streaming()
    }

    pub fn clear_thermal_latch(&mut self) -> Result<()> {
        self.thermal_surface().clear_latch()
    }

    /// Restart audio capture with the current settings
    pub fn reset_audio(&mut self) -> Result<()> {
        self.state.push_log("UI action: reset_i2s");
        info!("AUDIT: audio pipeline restart requested");
        self.io.pipeline.restart(self.state.settings())
    }

    /// Record a terminal action (reboot, factory reset) in the device log
    pub fn note_action(&mut self, action: &str) {
        self.state.push_log(format!("UI action: {}", action));
        info!("AUDIT: {} requested", action);
    }

    /// Factory reset: default settings, no latch, committed to the store
    pub fn reset_to_defaults(&mut self) -> Result<()> {
        self.state.reset_settings();
        self.io.store.commit(&self.state.persisted())?;
        info!("AUDIT: settings reset to factory defaults");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Trip detector input
    // ------------------------------------------------------------------------

    pub fn record_temperature(&mut self, reading: Option<f32>) {
        self.thermal_surface().record_temperature(reading)
    }

    pub fn report_trip(
        &mut self,
        temperature_c: f32,
        reason: &str,
        timestamp: &str,
        persistent: bool,
        now: Instant,
    ) {
        self.thermal_surface()
            .report_trip(temperature_c, reason, timestamp, persistent, now)
    }

    fn thermal_surface(&mut self) -> ThermalControlSurface<'_> {
        ThermalControlSurface::new(&mut self.state, &mut self.io)
    }
}
