//! Host collaborators
//!
//! Stand-ins that let the daemon run on a Linux host: memory and radio figures
//! come from procfs, the temperature from a sysfs thermal zone. The audio
//! pipeline and stream server record the calls made to them instead of driving
//! real capture hardware.

use std::fs;
use std::net::{IpAddr, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use mc_core::constants::daemon::MILLIDEGREE_DIVISOR;
use mc_core::{
    AudioPipeline, JsonSettingsStore, LevelSnapshot, MemoryInfo, NetworkInfo, Peripherals,
    Platform, Settings, StreamServer, StreamSnapshot,
};
use mc_error::{MicError, Result};
use tracing::{debug, info};

const MEMINFO_PATH: &str = "/proc/meminfo";
const WIRELESS_PATH: &str = "/proc/net/wireless";

/// Host collaborators with settings persisted at `settings_path`
pub fn host_peripherals(settings_path: &Path) -> Peripherals {
    Peripherals::new(
        Box::new(HostPipeline::new()),
        Box::new(HostStreamServer::new()),
        Box::new(HostPlatform::new()),
        Box::new(JsonSettingsStore::new(settings_path)),
    )
}

// ============================================================================
// Audio pipeline
// ============================================================================

#[derive(Debug, Default)]
pub struct HostPipeline {
    restarts: u64,
    highpass: Option<(bool, u16)>,
}

impl HostPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    /// Last high-pass configuration applied, as (enabled, cutoff)
    pub fn highpass(&self) -> Option<(bool, u16)> {
        self.highpass
    }
}

impl AudioPipeline for HostPipeline {
    fn restart(&mut self, settings: &Settings) -> Result<()> {
        self.restarts += 1;
        info!(
            "Audio pipeline restart #{}: {} Hz, buffer {}, gain {:.2}, shift {}",
            self.restarts,
            settings.sample_rate,
            settings.buffer_size,
            settings.gain,
            settings.shift_bits
        );
        Ok(())
    }

    fn update_highpass(&mut self, enabled: bool, cutoff_hz: u16, sample_rate: u32) {
        debug!(
            "High-pass coefficients: enabled={} cutoff={} Hz at {} Hz",
            enabled, cutoff_hz, sample_rate
        );
        self.highpass = Some((enabled, cutoff_hz));
    }

    fn levels(&self) -> LevelSnapshot {
        LevelSnapshot::default()
    }
}

// ============================================================================
// Stream server
// ============================================================================

#[derive(Debug, Default)]
pub struct HostStreamServer {
    listening_since: Option<Instant>,
}

impl HostStreamServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_listening(&self) -> bool {
        self.listening_since.is_some()
    }
}

impl StreamServer for HostStreamServer {
    fn start(&mut self) -> Result<()> {
        if self.listening_since.is_none() {
            self.listening_since = Some(Instant::now());
            info!("Stream server listening");
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.listening_since.take().is_some() {
            info!("Stream server stopped");
        }
    }

    fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            stats_elapsed_ms: self
                .listening_since
                .map(|since| since.elapsed().as_millis() as u64)
                .unwrap_or(0),
            ..StreamSnapshot::default()
        }
    }
}

// ============================================================================
// Platform
// ============================================================================

#[derive(Debug)]
pub struct HostPlatform {
    cpu_mhz: u32,
    wifi_tx_dbm: f32,
    min_free_kb: AtomicU64,
}

impl HostPlatform {
    pub fn new() -> Self {
        Self {
            cpu_mhz: 0,
            wifi_tx_dbm: 0.0,
            min_free_kb: AtomicU64::new(u64::MAX),
        }
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for HostPlatform {
    fn apply_wifi_tx_power(&mut self, dbm: f32) -> Result<()> {
        info!("Wi-Fi TX power set to {:.1} dBm", dbm);
        self.wifi_tx_dbm = dbm;
        Ok(())
    }

    fn set_cpu_frequency(&mut self, mhz: u32) -> Result<()> {
        info!("CPU frequency set to {} MHz", mhz);
        self.cpu_mhz = mhz;
        Ok(())
    }

    fn cpu_frequency(&self) -> u32 {
        self.cpu_mhz
    }

    fn wifi_tx_dbm(&self) -> f32 {
        self.wifi_tx_dbm
    }

    fn network(&self) -> NetworkInfo {
        let rssi_dbm = fs::read_to_string(WIRELESS_PATH)
            .ok()
            .and_then(|content| parse_wireless_rssi(&content))
            .unwrap_or(0);
        NetworkInfo {
            ip: local_ip(),
            rssi_dbm,
        }
    }

    fn memory(&self) -> MemoryInfo {
        let free_kb = fs::read_to_string(MEMINFO_PATH)
            .ok()
            .and_then(|content| parse_meminfo_available(&content))
            .unwrap_or(0);
        let previous = self.min_free_kb.fetch_min(free_kb, Ordering::Relaxed);
        MemoryInfo {
            free_kb,
            min_free_kb: previous.min(free_kb),
        }
    }
}

/// Address of the interface holding the default route. No packet is sent.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("192.0.2.1:9").ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

/// `MemAvailable` in kB
fn parse_meminfo_available(content: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let rest = line.strip_prefix("MemAvailable:")?;
        rest.split_whitespace().next()?.parse().ok()
    })
}

/// Signal level of the first interface in `/proc/net/wireless`
fn parse_wireless_rssi(content: &str) -> Option<i32> {
    let line = content.lines().nth(2)?;
    let (_, stats) = line.split_once(':')?;
    let level = stats.split_whitespace().nth(2)?;
    level.trim_end_matches('.').parse::<f32>().ok().map(|v| v as i32)
}

// ============================================================================
// Thermal sensor
// ============================================================================

/// sysfs thermal zone reporting millidegrees Celsius
#[derive(Debug, Clone)]
pub struct SysfsThermalSensor {
    path: PathBuf,
}

impl SysfsThermalSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_celsius(&self) -> Result<f32> {
        let raw = fs::read_to_string(&self.path).map_err(|e| MicError::SensorRead {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let millidegrees: i64 = raw.trim().parse().map_err(|_| MicError::SensorRead {
            path: self.path.clone(),
            reason: format!("unparsable reading {:?}", raw.trim()),
        })?;
        Ok(millidegrees as f32 / MILLIDEGREE_DIVISOR)
    }
}
