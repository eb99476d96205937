//! Collaborator interfaces
//!
//! Audio capture, the RTSP stream server, radio and clock control and the
//! settings store live outside the control plane. Each is reached through a
//! narrow trait so the daemon can plug in host implementations and tests can
//! plug in mocks.

use std::net::IpAddr;
use std::time::Instant;

use mc_error::Result;

use crate::constants::perf;
use crate::device::{PersistedState, Settings};

/// Level telemetry of the capture pipeline (16-bit sample magnitudes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelSnapshot {
    /// Peak held since the last status read, 0 when nothing was held
    pub peak_hold: u32,
    pub last_peak: u32,
    pub clipped_last_block: bool,
    pub clip_count: u32,
}

/// Stream server telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSnapshot {
    pub client: Option<IpAddr>,
    pub streaming: bool,
    pub packets_sent: u64,
    /// Length of the current stats window
    pub stats_elapsed_ms: u64,
    pub last_client_connect: Option<Instant>,
    pub last_stream_start: Option<Instant>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkInfo {
    pub ip: Option<IpAddr>,
    pub rssi_dbm: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub free_kb: u64,
    pub min_free_kb: u64,
}

#[cfg_attr(test, mockall::automock)]
pub trait AudioPipeline: Send {
    /// Tear down and rebuild capture with the given settings
    fn restart(&mut self, settings: &Settings) -> Result<()>;

    /// Recompute high-pass filter coefficients
    fn update_highpass(&mut self, enabled: bool, cutoff_hz: u16, sample_rate: u32);

    fn levels(&self) -> LevelSnapshot;
}

/// The streaming actuator
#[cfg_attr(test, mockall::automock)]
pub trait StreamServer: Send {
    /// Start listening for clients
    fn start(&mut self) -> Result<()>;

    /// Disconnect any client and stop listening
    fn stop(&mut self);

    fn snapshot(&self) -> StreamSnapshot;
}

#[cfg_attr(test, mockall::automock)]
pub trait Platform: Send {
    fn apply_wifi_tx_power(&mut self, dbm: f32) -> Result<()>;

    fn set_cpu_frequency(&mut self, mhz: u32) -> Result<()>;

    /// Clock the processor is actually running at
    fn cpu_frequency(&self) -> u32;

    /// Transmit power the radio actually reports
    fn wifi_tx_dbm(&self) -> f32;

    fn network(&self) -> NetworkInfo;

    fn memory(&self) -> MemoryInfo;
}

#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send {
    fn commit(&self, state: &PersistedState) -> Result<()>;

    /// `None` when nothing has been stored yet
    fn load(&self) -> Result<Option<PersistedState>>;
}

/// Derives the restart threshold from the stream geometry
pub trait RateRecommender: Send {
    fn recommend(&self, sample_rate: u32, buffer_size: u16) -> u32;
}

/// 70 % of the expected packet rate, kept inside the `min_rate` domain
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRateRecommender;

impl RateRecommender for DefaultRateRecommender {
    fn recommend(&self, sample_rate: u32, buffer_size: u16) -> u32 {
        if buffer_size == 0 {
            return perf::MIN_RATE;
        }
        let expected = sample_rate as f32 / buffer_size as f32;
        let recommended = (expected * perf::RECOMMENDED_RATE_FRACTION) as u32;
        recommended.clamp(perf::MIN_RATE, perf::MAX_RATE)
    }
}

/// Every collaborator the controller drives
pub struct Peripherals {
    pub pipeline: Box<dyn AudioPipeline>,
    pub server: Box<dyn StreamServer>,
    pub platform: Box<dyn Platform>,
    pub store: Box<dyn SettingsStore>,
    pub recommender: Box<dyn RateRecommender>,
}

impl Peripherals {
    pub fn new(
        pipeline: Box<dyn AudioPipeline>,
        server: Box<dyn StreamServer>,
        platform: Box<dyn Platform>,
        store: Box<dyn SettingsStore>,
    ) -> Self {
        Self {
            pipeline,
            server,
            platform,
            store,
            recommender: Box::new(DefaultRateRecommender),
        }
    }

    pub fn with_recommender(mut self, recommender: Box<dyn RateRecommender>) -> Self {
        self.recommender = recommender;
        self
    }
}

impl std::fmt::Debug for Peripherals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peripherals").finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_recommender() {
        let r = DefaultRateRecommender;
        // 48000 / 1024 = 46.875 packets/s, 70 % of it
        assert_eq!(r.recommend(48000, 1024), 32);
        assert_eq!(r.recommend(96000, 256), 200);
        assert_eq!(r.recommend(8000, 8192), 5);
        assert_eq!(r.recommend(48000, 0), 5);
    }
}
