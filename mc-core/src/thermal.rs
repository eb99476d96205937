//! Thermal interlock control surface
//!
//! The trip decision itself is made elsewhere; it reports samples and trips
//! through [`ThermalControlSurface::record_temperature`] and
//! [`ThermalControlSurface::report_trip`]. This surface guards the streaming
//! actuator against a held persistent latch and owns the one mutation the
//! operator can make: acknowledging and clearing that latch.

use std::time::Instant;

use mc_error::{MicError, Result};
use tracing::{info, warn};

use crate::constants::thermal::CLEARED_REASON;
use crate::device::{DeviceState, TripRecord};
use crate::peripherals::Peripherals;

pub struct ThermalControlSurface<'a> {
    state: &'a mut DeviceState,
    io: &'a mut Peripherals,
}

impl<'a> ThermalControlSurface<'a> {
    pub fn new(state: &'a mut DeviceState, io: &'a mut Peripherals) -> Self {
        Self { state, io }
    }

    /// Explicit operator start. Rejected while the persistent latch holds,
    /// whatever the current actuator state.
    pub fn start_streaming(&mut self) -> Result<()> {
        if self.state.thermal().persistent_latch() {
            self.state
                .push_log("Server start blocked: thermal protection latched");
            warn!("Stream start rejected: thermal latch held");
            return Err(MicError::ThermalLatched);
        }

        if !self.state.streaming_enabled() {
            self.io.server.start()?;
            self.state.set_streaming_enabled(true);
            self.state.thermal_mut().clear_transient();
        }
        self.state.push_log("UI action: server_start");
        info!("AUDIT: stream server started");
        Ok(())
    }

    /// Disconnect any client and stop listening. Always succeeds.
    pub fn stop_streaming(&mut self) {
        self.io.server.stop();
        self.state.set_streaming_enabled(false);
        self.state.push_log("UI action: server_stop");
        info!("AUDIT: stream server stopped");
    }

    /// Acknowledge a persistent latch.
    ///
    /// Fails with [`MicError::NotLatched`] and changes nothing when no latch
    /// is held.
    pub fn clear_latch(&mut self) -> Result<()> {
        if !self.state.thermal().persistent_latch() {
            return Err(MicError::NotLatched);
        }

        let thermal = self.state.thermal_mut();
        thermal.clear_latches();
        let trip = thermal.trip_mut();
        trip.temperature_c = 0.0;
        trip.triggered_at = None;
        trip.reason = CLEARED_REASON.to_string();
        trip.timestamp.clear();

        if !self.state.streaming_enabled() {
            match self.io.server.start() {
                Ok(()) => self.state.set_streaming_enabled(true),
                Err(e) => warn!("Stream server restart after latch clear failed: {}", e),
            }
        }

        if let Err(e) = self.io.store.commit(&self.state.persisted()) {
            warn!("Failed to persist cleared thermal latch: {}", e);
        }
        self.state.push_log("UI action: thermal_latch_clear");
        info!("AUDIT: thermal latch cleared by operator");
        Ok(())
    }

    /// Sensor sample from the trip detector; `None` marks a faulted read
    pub fn record_temperature(&mut self, reading: Option<f32>) {
        let was_faulted = self.state.thermal().sensor_fault();
        self.state.thermal_mut().record_sample(reading);
        let faulted = self.state.thermal().sensor_fault();
        if faulted && !was_faulted {
            warn!("Temperature sensor fault, protection paused");
            self.state.push_log("Thermal sensor fault");
        } else if !faulted && was_faulted {
            info!("Temperature sensor recovered");
        }
    }

    /// Trip event from the detector. Stops the streaming actuator; a
    /// persistent trip is committed so it survives a restart.
    pub fn report_trip(
        &mut self,
        temperature_c: f32,
        reason: impl Into<String>,
        timestamp: impl Into<String>,
        persistent: bool,
        now: Instant,
    ) {
        let reason = reason.into();
        warn!(
            "Thermal trip at {:.1} C ({}), persistent={}",
            temperature_c, reason, persistent
        );
        self.state.thermal_mut().record_trip(
            TripRecord {
                temperature_c,
                triggered_at: Some(now),
                reason: reason.clone(),
                timestamp: timestamp.into(),
            },
            persistent,
        );

        self.io.server.stop();
        self.state.set_streaming_enabled(false);
        self.state
            .push_log(format!("Thermal shutdown at {:.1} C: {}", temperature_c, reason));

        if persistent {
            if let Err(e) = self.io.store.commit(&self.state.persisted()) {
                warn!("Failed to persist thermal latch: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Settings, ThermalState};
    use crate::peripherals::testing::Mocks;

    fn latched_state(streaming: bool) -> DeviceState {
        let mut state = DeviceState::new(Settings::default(), Instant::now());
        state.thermal_mut().record_trip(
            TripRecord {
                temperature_c: 86.5,
                triggered_at: Some(Instant::now()),
                reason: "Overheat".into(),
                timestamp: "12:00:00".into(),
            },
            true,
        );
        state.set_streaming_enabled(streaming);
        state
    }

    #[test]
    fn test_start_rejected_while_latched_regardless_of_actuator() {
        for streaming in [false, true] {
            let mut state = latched_state(streaming);
            // No server expectations: any start/stop call would panic
            let mut io = Mocks::new().into_peripherals();

            let err = ThermalControlSurface::new(&mut state, &mut io)
                .start_streaming()
                .unwrap_err();
            assert!(matches!(err, MicError::ThermalLatched));
            assert_eq!(state.streaming_enabled(), streaming);
            assert!(state.thermal().persistent_latch());
            assert_eq!(
                state.log().read_all(),
                vec!["Server start blocked: thermal protection latched"]
            );
        }
    }

    #[test]
    fn test_start_when_off_starts_and_clears_transient() {
        let mut state = DeviceState::new(Settings::default(), Instant::now());
        state.set_streaming_enabled(false);
        state.thermal_mut().record_trip(TripRecord::default(), false);

        let mut mocks = Mocks::new();
        mocks.server.expect_start().times(1).returning(|| Ok(()));
        let mut io = mocks.into_peripherals();

        ThermalControlSurface::new(&mut state, &mut io)
            .start_streaming()
            .unwrap();
        assert!(state.streaming_enabled());
        assert!(!state.thermal().transient_lockout());
        assert_eq!(state.log().read_all(), vec!["UI action: server_start"]);
    }

    #[test]
    fn test_start_when_running_is_noop_on_actuator() {
        let mut state = DeviceState::new(Settings::default(), Instant::now());
        let mut io = Mocks::new().into_peripherals();

        ThermalControlSurface::new(&mut state, &mut io)
            .start_streaming()
            .unwrap();
        assert!(state.streaming_enabled());
    }

    #[test]
    fn test_stop_always_succeeds() {
        let mut state = latched_state(true);
        let mut mocks = Mocks::new();
        mocks.server.expect_stop().times(1).return_const(());
        let mut io = mocks.into_peripherals();

        ThermalControlSurface::new(&mut state, &mut io).stop_streaming();
        assert!(!state.streaming_enabled());
        assert_eq!(state.log().read_all(), vec!["UI action: server_stop"]);
    }

    #[test]
    fn test_clear_when_not_latched_mutates_nothing() {
        let mut state = DeviceState::new(Settings::default(), Instant::now());
        state.thermal_mut().record_trip(
            TripRecord {
                temperature_c: 70.0,
                triggered_at: None,
                reason: "soft".into(),
                timestamp: "t".into(),
            },
            false,
        );
        let mut io = Mocks::new().into_peripherals();

        let err = ThermalControlSurface::new(&mut state, &mut io)
            .clear_latch()
            .unwrap_err();
        assert!(matches!(err, MicError::NotLatched));
        assert!(state.thermal().transient_lockout());
        assert_eq!(state.thermal().trip().temperature_c, 70.0);
        assert_eq!(state.thermal().trip().reason, "soft");
        assert!(state.log().is_empty());
    }

    #[test]
    fn test_clear_when_latched_resets_record_and_restarts_actuator() {
        let mut state = latched_state(false);
        let mut mocks = Mocks::new();
        mocks.server.expect_start().times(1).returning(|| Ok(()));
        mocks
            .store
            .expect_commit()
            .withf(|p| !p.latch.latched && p.latch.trip_c == 0.0)
            .times(1)
            .returning(|_| Ok(()));
        let mut io = mocks.into_peripherals();

        ThermalControlSurface::new(&mut state, &mut io)
            .clear_latch()
            .unwrap();

        let thermal = state.thermal();
        assert!(!thermal.persistent_latch());
        assert!(!thermal.transient_lockout());
        assert_eq!(thermal.trip().temperature_c, 0.0);
        assert_eq!(thermal.trip().triggered_at, None);
        assert_eq!(thermal.trip().reason, CLEARED_REASON);
        assert!(thermal.trip().timestamp.is_empty());
        assert!(state.streaming_enabled());
        assert_eq!(state.thermal_state(), ThermalState::Armed);
        assert_eq!(state.log().read_all(), vec!["UI action: thermal_latch_clear"]);
    }

    #[test]
    fn test_clear_when_latched_and_running_does_not_restart() {
        let mut state = latched_state(true);
        let mut io = Mocks::new().lenient_store().into_peripherals();

        ThermalControlSurface::new(&mut state, &mut io)
            .clear_latch()
            .unwrap();
        assert!(state.streaming_enabled());
    }

    #[test]
    fn test_report_trip_stops_actuator() {
        let mut state = DeviceState::new(Settings::default(), Instant::now());
        let mut mocks = Mocks::new();
        mocks.server.expect_stop().times(2).return_const(());
        mocks
            .store
            .expect_commit()
            .withf(|p| p.latch.latched)
            .times(1)
            .returning(|_| Ok(()));
        let mut io = mocks.into_peripherals();
        let now = Instant::now();

        let mut surface = ThermalControlSurface::new(&mut state, &mut io);
        surface.report_trip(81.0, "Limit exceeded", "08:15:00", false, now);
        surface.report_trip(90.0, "Limit exceeded twice", "08:20:00", true, now);

        assert!(!state.streaming_enabled());
        assert!(state.thermal().transient_lockout());
        assert!(state.thermal().persistent_latch());
        assert_eq!(state.thermal().trip().temperature_c, 90.0);
        assert_eq!(state.thermal().trip().triggered_at, Some(now));
    }

    #[test]
    fn test_sensor_fault_transitions() {
        let mut state = DeviceState::new(Settings::default(), Instant::now());
        let mut io = Mocks::new().into_peripherals();
        let mut surface = ThermalControlSurface::new(&mut state, &mut io);

        surface.record_temperature(Some(42.0));
        surface.record_temperature(None);
        surface.record_temperature(None);
        surface.record_temperature(Some(44.0));

        assert_eq!(state.thermal_state(), ThermalState::Armed);
        assert_eq!(state.thermal().max_c(), 44.0);
        assert_eq!(state.log().read_all(), vec!["Thermal sensor fault"]);
    }
}
