//! micctl Core Library
//!
//! Control and status plane of a network microphone appliance.
//!
//! # Features
//!
//! - **Settings**: validated mutation of every runtime-tunable key with per-key side effects
//! - **Thermal Interlock**: guards the streaming actuator against a held thermal latch
//! - **Status**: live composition of the status, audio, performance and thermal payloads
//! - **Diagnostics**: bounded device log served to clients
//! - **Client Sync**: TTL guard that keeps polling from clobbering in-flight edits
//!
//! # Module Structure
//!
//! - `device` - state aggregate, settings and thermal flags
//! - `peripherals` - collaborator traits (pipeline, stream server, platform, store)
//! - `settings`, `thermal`, `status` - the three control-plane components
//! - `controller` - facade used by the daemon
//!
//! # Example
//!
//! ```no_run
//! use mc_core::{Controller, DeviceProfile, Peripherals};
//! # fn peripherals() -> Peripherals { unimplemented!() }
//!
//! let mut controller = Controller::boot(peripherals(), DeviceProfile::default(), std::time::Instant::now());
//! controller.set("gain", Some("2.0")).ok();
//! ```

use std::sync::Arc;

pub mod config;
pub mod constants;
pub mod controller;
pub mod device;
pub mod guard;
pub mod log_ring;
pub mod peripherals;
pub mod persistence;
pub mod settings;
pub mod status;
pub mod thermal;

pub use config::DaemonConfig;
pub use controller::{Controller, DeviceProfile};
pub use device::{
    DeviceState, PersistedLatch, PersistedState, Settings, ThermalFlags, ThermalState, TripRecord,
};
pub use guard::{normalize_input, ConcurrencyGuard};
pub use log_ring::LogRingBuffer;
pub use peripherals::{
    AudioPipeline, DefaultRateRecommender, LevelSnapshot, MemoryInfo, NetworkInfo, Peripherals,
    Platform, RateRecommender, SettingsStore, StreamServer, StreamSnapshot,
};
pub use persistence::JsonSettingsStore;
pub use settings::{snap_thermal_limit, snap_wifi_tx, SettingValue, SettingsRegistry, ValidationRule};
pub use status::{effective_rate, format_since, format_uptime, StatusAggregator};
pub use thermal::ThermalControlSurface;

// Re-export error types
pub use mc_error::{MicError, Result};

/// Controller shared between request handlers and background tasks
pub type SharedController = Arc<parking_lot::Mutex<Controller>>;

pub fn shared(controller: Controller) -> SharedController {
    Arc::new(parking_lot::Mutex::new(controller))
}
