//! Status composition
//!
//! Builds the four JSON status payloads from live collaborator state at call
//! time. Nothing is cached.

use std::time::{Duration, Instant};

use mc_protocol::{AudioStatusPayload, PerfStatusPayload, StatusPayload, ThermalPayload};

use crate::constants::{audio, perf};
use crate::device::DeviceState;
use crate::peripherals::Peripherals;

/// Packets per second over the stats window, integer arithmetic.
/// Zero unless streaming and the window is longer than the warm-up.
pub fn effective_rate(packets_sent: u64, elapsed_ms: u64, streaming: bool) -> u32 {
    if !streaming || elapsed_ms <= perf::RATE_WARMUP_MS {
        return 0;
    }
    let rate = packets_sent.saturating_mul(1000) / elapsed_ms;
    u32::try_from(rate).unwrap_or(u32::MAX)
}

/// Peak as (percent of full scale, dBFS). A zero peak reads as 0 % at the floor.
pub fn peak_level(peak: u32) -> (f32, f32) {
    if peak == 0 {
        return (0.0, audio::DBFS_FLOOR);
    }
    let ratio = peak as f32 / audio::FULL_SCALE;
    let pct = 100.0 * ratio;
    let dbfs = (20.0 * ratio.log10()).max(audio::DBFS_FLOOR);
    (pct, dbfs)
}

pub fn latency_profile(buffer_size: u16) -> &'static str {
    if buffer_size <= audio::PROFILE_ULTRA_LOW_MAX {
        "ultra-low-latency"
    } else if buffer_size <= audio::PROFILE_BALANCED_MAX {
        "balanced"
    } else if buffer_size <= audio::PROFILE_STABLE_MAX {
        "stable"
    } else {
        "high-stability"
    }
}

/// Buffer duration in milliseconds
pub fn latency_ms(buffer_size: u16, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    buffer_size as f32 / sample_rate as f32 * 1000.0
}

/// `1d 02:03:04`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Compact age of an event: `12s ago`, `5m 3s ago`, `2h 5m ago`, `3d 4h ago`
pub fn format_since(event: Option<Instant>, now: Instant) -> String {
    let Some(at) = event else {
        return "never".to_string();
    };
    let secs = now.saturating_duration_since(at).as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m {}s ago", secs / 60, secs % 60)
    } else if secs < 86_400 {
        format!("{}h {}m ago", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h ago", secs / 86_400, (secs % 86_400) / 3600)
    }
}

fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f32.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone)]
pub struct StatusAggregator {
    firmware_version: String,
    has_shift_bits: bool,
}

impl StatusAggregator {
    pub fn new(firmware_version: impl Into<String>, has_shift_bits: bool) -> Self {
        Self {
            firmware_version: firmware_version.into(),
            has_shift_bits,
        }
    }

    pub fn status(&self, state: &DeviceState, io: &Peripherals, now: Instant) -> StatusPayload {
        let net = io.platform.network();
        let mem = io.platform.memory();
        let stream = io.server.snapshot();

        StatusPayload {
            fw_version: self.firmware_version.clone(),
            ip: net.ip.map(|ip| ip.to_string()).unwrap_or_default(),
            wifi_rssi: net.rssi_dbm,
            wifi_tx_dbm: round_to(io.platform.wifi_tx_dbm(), 1),
            free_heap_kb: mem.free_kb,
            min_free_heap_kb: mem.min_free_kb,
            uptime: format_uptime(state.uptime(now)),
            rtsp_server_enabled: state.streaming_enabled(),
            client: stream.client.map(|ip| ip.to_string()).unwrap_or_default(),
            streaming: stream.streaming,
            current_rate_pkt_s: effective_rate(
                stream.packets_sent,
                stream.stats_elapsed_ms,
                stream.streaming,
            ),
            last_rtsp_connect: format_since(stream.last_client_connect, now),
            last_stream_start: format_since(stream.last_stream_start, now),
        }
    }

    pub fn audio_status(&self, state: &DeviceState, io: &Peripherals) -> AudioStatusPayload {
        let s = state.settings();
        let levels = io.pipeline.levels();
        let peak = if levels.peak_hold > 0 {
            levels.peak_hold
        } else {
            levels.last_peak
        };
        let (peak_pct, peak_dbfs) = peak_level(peak);

        AudioStatusPayload {
            sample_rate: s.sample_rate,
            gain: round_to(s.gain, 2),
            buffer_size: s.buffer_size,
            i2s_shift: self.has_shift_bits.then_some(s.shift_bits),
            latency_ms: round_to(latency_ms(s.buffer_size, s.sample_rate), 1),
            profile: latency_profile(s.buffer_size).to_string(),
            hp_enable: s.hp_enable,
            hp_cutoff_hz: s.hp_cutoff_hz,
            peak_pct: round_to(peak_pct, 1),
            peak_dbfs: round_to(peak_dbfs, 1),
            clip: levels.clipped_last_block,
            clip_count: levels.clip_count,
        }
    }

    pub fn perf_status(&self, state: &DeviceState, io: &Peripherals) -> PerfStatusPayload {
        let s = state.settings();
        PerfStatusPayload {
            restart_threshold_pkt_s: s.min_rate,
            check_interval_min: s.check_interval_min,
            auto_recovery: s.auto_recovery,
            auto_threshold: s.auto_threshold,
            recommended_min_rate: io.recommender.recommend(s.sample_rate, s.buffer_size),
            scheduled_reset: s.scheduled_reset,
            reset_hours: s.reset_hours,
        }
    }

    pub fn thermal(&self, state: &DeviceState, io: &Peripherals, now: Instant) -> ThermalPayload {
        let s = state.settings();
        let flags = state.thermal();
        let trip = flags.trip();
        let current_c = flags.current_c().map(|c| round_to(c, 1));

        let manual_restart = flags.persistent_latch()
            || (!state.streaming_enabled() && s.overheat_protection && trip.temperature_c > 0.0);

        let last_trip_since = match trip.triggered_at {
            Some(at) if trip.temperature_c > 0.0 => format_since(Some(at), now),
            _ => String::new(),
        };

        ThermalPayload {
            current_c,
            current_valid: current_c.is_some(),
            max_c: round_to(flags.max_c(), 1),
            cpu_mhz: io.platform.cpu_frequency(),
            protection_enabled: s.overheat_protection,
            shutdown_c: s.overheat_limit_c,
            latched: flags.transient_lockout(),
            latched_persist: flags.persistent_latch(),
            sensor_fault: flags.sensor_fault(),
            last_trip_c: round_to(trip.temperature_c, 1),
            last_reason: trip.reason.clone(),
            last_trip_ts: trip.timestamp.clone(),
            last_trip_since,
            manual_restart,
        }
    }
}
