//! Constants and configuration values for micctl
//!
//! Centralizes the magic numbers of the control plane: validation bounds,
//! snapping tables, protocol windows and default paths.

use std::time::Duration;

/// Diagnostic log ring
pub mod log {
    /// Number of lines kept in the device log
    pub const CAPACITY: usize = 80;
}

/// Client-side optimistic synchronization windows
pub mod guard {
    use super::Duration;

    /// A submitted value is protected from poll overwrites for this long
    pub const LOCK_WINDOW: Duration = Duration::from_millis(5000);

    /// A field being edited is protected for this long after each keystroke
    pub const EDIT_WINDOW: Duration = Duration::from_millis(10000);
}

/// Audio pipeline bounds and metering
pub mod audio {
    pub const MIN_SAMPLE_RATE: u32 = 8000;
    pub const MAX_SAMPLE_RATE: u32 = 96000;

    pub const MIN_GAIN: f32 = 0.1;
    pub const MAX_GAIN: f32 = 100.0;

    pub const MIN_BUFFER: u16 = 256;
    pub const MAX_BUFFER: u16 = 8192;

    pub const MAX_SHIFT_BITS: u8 = 24;

    pub const MIN_HP_CUTOFF_HZ: u16 = 10;
    pub const MAX_HP_CUTOFF_HZ: u16 = 10000;

    /// Full-scale magnitude of a 16-bit sample
    pub const FULL_SCALE: f32 = 32767.0;

    /// Reported level when no peak has been observed
    pub const DBFS_FLOOR: f32 = -90.0;

    /// Latency profile upper bounds (buffer size in samples)
    pub const PROFILE_ULTRA_LOW_MAX: u16 = 256;
    pub const PROFILE_BALANCED_MAX: u16 = 512;
    pub const PROFILE_STABLE_MAX: u16 = 1024;
}

/// Stream health and recovery
pub mod perf {
    pub const MIN_RATE: u32 = 5;
    pub const MAX_RATE: u32 = 200;

    pub const MIN_CHECK_INTERVAL_MIN: u32 = 1;
    pub const MAX_CHECK_INTERVAL_MIN: u32 = 60;

    pub const MIN_RESET_HOURS: u32 = 1;
    pub const MAX_RESET_HOURS: u32 = 168;

    /// Stats window that must elapse before a packet rate is reported
    pub const RATE_WARMUP_MS: u64 = 1000;

    /// Fraction of the expected packet rate recommended as restart threshold
    pub const RECOMMENDED_RATE_FRACTION: f32 = 0.7;
}

/// Radio
pub mod wifi {
    /// Transmit power levels supported by the radio, ascending (dBm)
    pub const TX_STEPS_DBM: [f32; 12] = [
        -1.0, 2.0, 5.0, 7.0, 8.5, 11.0, 13.0, 15.0, 17.0, 18.5, 19.0, 19.5,
    ];

    pub const MIN_TX_DBM: f32 = -1.0;
    pub const MAX_TX_DBM: f32 = 19.5;
}

/// Processor clock
pub mod cpu {
    pub const MIN_MHZ: u32 = 40;
    pub const MAX_MHZ: u32 = 160;
}

/// Thermal protection
pub mod thermal {
    pub const LIMIT_MIN_C: u32 = 30;
    pub const LIMIT_MAX_C: u32 = 95;
    pub const LIMIT_STEP_C: u32 = 5;

    /// Reason recorded when the operator acknowledges a latch
    pub const CLEARED_REASON: &str = "Thermal latch cleared manually.";
}

/// Deferred terminal actions
pub mod actions {
    /// Delay between a reboot request and the process restart
    pub const REBOOT_DELAY_MS: u64 = 600;
}

/// Daemon defaults
pub mod daemon {
    pub const DEFAULT_BIND: &str = "0.0.0.0:80";
    pub const DEFAULT_CONFIG_PATH: &str = "/etc/micctl/daemon.json";
    pub const DEFAULT_SENSOR_PATH: &str = "/sys/class/thermal/thermal_zone0/temp";
    pub const DEFAULT_SENSOR_INTERVAL_MS: u64 = 2000;

    /// sysfs thermal zones report millidegrees
    pub const MILLIDEGREE_DIVISOR: f32 = 1000.0;
}

/// System paths
pub mod paths {
    /// Directory holding persisted device settings
    /// Falls back to /var/lib/micctl when no user config dir is resolvable
    pub fn state_dir() -> std::path::PathBuf {
        if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
            return std::path::PathBuf::from(xdg).join("micctl");
        }
        dirs::config_dir()
            .map(|p| p.join("micctl"))
            .unwrap_or_else(|| std::path::PathBuf::from("/var/lib/micctl"))
    }

    /// Default settings file
    pub fn settings_file() -> std::path::PathBuf {
        state_dir().join("settings.json")
    }
}
