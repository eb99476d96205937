//! Settings mutation dispatcher
//!
//! Every tunable key maps to one validation rule and one set of side effects.
//! `SettingsRegistry::apply` parses the raw text, validates it against the
//! rule, mutates the live value, runs the side effects and finally asks the
//! store to commit. Validation happens before any mutation, so a rejected
//! value leaves state untouched.

use std::fmt;

use mc_error::{MicError, Result};
use mc_protocol::SettingKey;
use tracing::{debug, info, warn};

use crate::constants::{audio, cpu, perf, thermal, wifi};
use crate::device::DeviceState;
use crate::peripherals::Peripherals;

// ============================================================================
// Validation rules
// ============================================================================

/// Two-valued text domains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumDomain {
    OnOff,
    AutoManual,
}

impl EnumDomain {
    /// Text for `true` and `false`
    pub fn labels(&self) -> (&'static str, &'static str) {
        match self {
            EnumDomain::OnOff => ("on", "off"),
            EnumDomain::AutoManual => ("auto", "manual"),
        }
    }
}

/// Post-validation quantization
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    None,
    /// Nearest member of an ascending step set
    Snap(&'static [f32]),
    /// Round down to a multiple of the step above the minimum
    Floor(u32),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationRule {
    Unsigned { min: u32, max: u32, step: Step },
    Float { min: f32, max: f32, step: Step },
    Toggle(EnumDomain),
}

impl ValidationRule {
    pub fn for_key(key: SettingKey) -> Self {
        use ValidationRule::{Float, Toggle, Unsigned};

        match key {
            SettingKey::Rate => Unsigned {
                min: audio::MIN_SAMPLE_RATE,
                max: audio::MAX_SAMPLE_RATE,
                step: Step::None,
            },
            SettingKey::Gain => Float {
                min: audio::MIN_GAIN,
                max: audio::MAX_GAIN,
                step: Step::None,
            },
            SettingKey::Buffer => Unsigned {
                min: audio::MIN_BUFFER as u32,
                max: audio::MAX_BUFFER as u32,
                step: Step::None,
            },
            SettingKey::Shift => Unsigned {
                min: 0,
                max: audio::MAX_SHIFT_BITS as u32,
                step: Step::None,
            },
            SettingKey::WifiTx => Float {
                min: wifi::MIN_TX_DBM,
                max: wifi::MAX_TX_DBM,
                step: Step::Snap(&wifi::TX_STEPS_DBM),
            },
            SettingKey::AutoRecovery
            | SettingKey::SchedReset
            | SettingKey::HpEnable
            | SettingKey::OhEnable => Toggle(EnumDomain::OnOff),
            SettingKey::ThrMode => Toggle(EnumDomain::AutoManual),
            SettingKey::MinRate => Unsigned {
                min: perf::MIN_RATE,
                max: perf::MAX_RATE,
                step: Step::None,
            },
            SettingKey::CheckInterval => Unsigned {
                min: perf::MIN_CHECK_INTERVAL_MIN,
                max: perf::MAX_CHECK_INTERVAL_MIN,
                step: Step::None,
            },
            SettingKey::ResetHours => Unsigned {
                min: perf::MIN_RESET_HOURS,
                max: perf::MAX_RESET_HOURS,
                step: Step::None,
            },
            SettingKey::CpuFreq => Unsigned {
                min: cpu::MIN_MHZ,
                max: cpu::MAX_MHZ,
                step: Step::None,
            },
            SettingKey::HpCutoff => Unsigned {
                min: audio::MIN_HP_CUTOFF_HZ as u32,
                max: audio::MAX_HP_CUTOFF_HZ as u32,
                step: Step::None,
            },
            SettingKey::OhLimit => Unsigned {
                min: thermal::LIMIT_MIN_C,
                max: thermal::LIMIT_MAX_C,
                step: Step::Floor(thermal::LIMIT_STEP_C),
            },
        }
    }

    /// Parse and validate raw text. Quantization is applied to the result.
    pub fn parse(&self, key: SettingKey, raw: &str) -> Result<SettingValue> {
        match *self {
            ValidationRule::Unsigned { min, max, step } => {
                let parsed =
                    parse_leading_int(raw).ok_or_else(|| MicError::malformed(key.as_str(), raw))?;
                if parsed < min as i64 || parsed > max as i64 {
                    return Err(MicError::out_of_range(
                        key.as_str(),
                        parsed,
                        format!("must be {}..={}", min, max),
                    ));
                }
                let v = parsed as u32;
                let v = match step {
                    Step::Floor(step) => min + ((v - min) / step) * step,
                    _ => v,
                };
                Ok(SettingValue::Unsigned(v))
            }
            ValidationRule::Float { min, max, step } => {
                let parsed: f32 = raw
                    .trim()
                    .parse()
                    .ok()
                    .filter(|v: &f32| v.is_finite())
                    .ok_or_else(|| MicError::malformed(key.as_str(), raw))?;
                if parsed < min || parsed > max {
                    return Err(MicError::out_of_range(
                        key.as_str(),
                        parsed,
                        format!("must be {}..={}", min, max),
                    ));
                }
                let v = match step {
                    Step::Snap(steps) => snap_to_steps(parsed, steps),
                    _ => parsed,
                };
                Ok(SettingValue::Float(v))
            }
            ValidationRule::Toggle(domain) => {
                let (on, off) = domain.labels();
                if raw == on {
                    Ok(SettingValue::Flag(true))
                } else if raw == off {
                    Ok(SettingValue::Flag(false))
                } else {
                    Err(MicError::malformed(key.as_str(), raw))
                }
            }
        }
    }
}

/// A validated value, ready to be stored
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingValue {
    Unsigned(u32),
    Float(f32),
    Flag(bool),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Unsigned(v) => write!(f, "{}", v),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Flag(v) => write!(f, "{}", v),
        }
    }
}

/// Leading-integer conversion: optional whitespace, optional sign, then
/// digits up to the first non-digit. `None` when no digit is present.
/// Values beyond `i64` saturate.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    let magnitude = rest[..digits_len].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn snap_to_steps(value: f32, steps: &[f32]) -> f32 {
    let mut best = match steps.first() {
        Some(first) => *first,
        None => return value,
    };
    let mut best_distance = (value - best).abs();
    for &candidate in &steps[1..] {
        let distance = (value - candidate).abs();
        if distance < best_distance {
            best = candidate;
            best_distance = distance;
        }
    }
    best
}

/// Nearest supported transmit power; ties go to the lower step
pub fn snap_wifi_tx(dbm: f32) -> f32 {
    snap_to_steps(dbm, &wifi::TX_STEPS_DBM)
}

/// Round a thermal limit down to the 5 °C grid, clamped to the supported span
pub fn snap_thermal_limit(limit_c: u32) -> u32 {
    let clamped = limit_c.clamp(thermal::LIMIT_MIN_C, thermal::LIMIT_MAX_C);
    let snapped = thermal::LIMIT_MIN_C
        + ((clamped - thermal::LIMIT_MIN_C) / thermal::LIMIT_STEP_C) * thermal::LIMIT_STEP_C;
    snapped.clamp(thermal::LIMIT_MIN_C, thermal::LIMIT_MAX_C)
}

// ============================================================================
// Registry
// ============================================================================

#[derive(Debug, Clone)]
pub struct SettingsRegistry {
    has_shift_bits: bool,
}

impl SettingsRegistry {
    pub fn new(has_shift_bits: bool) -> Self {
        Self { has_shift_bits }
    }

    pub fn has_shift_bits(&self) -> bool {
        self.has_shift_bits
    }

    /// Resolve a wire key, hiding keys the hardware does not support
    pub fn resolve(&self, key: &str) -> Result<SettingKey> {
        match key.parse::<SettingKey>() {
            Ok(SettingKey::Shift) if !self.has_shift_bits => Err(MicError::UnknownKey(key.into())),
            Ok(k) => Ok(k),
            Err(_) => Err(MicError::UnknownKey(key.into())),
        }
    }

    /// Validate and apply one setting.
    ///
    /// A non-empty value is written to the device log before validation. On
    /// error nothing is mutated and no side effect runs. Collaborator failures
    /// after the mutation are logged and do not undo it.
    pub fn apply(
        &self,
        state: &mut DeviceState,
        io: &mut Peripherals,
        key: &str,
        raw: Option<&str>,
    ) -> Result<SettingValue> {
        let raw = raw.unwrap_or("");
        if !raw.is_empty() {
            state.push_log(format!("UI set: {}={}", key, raw));
        }

        let key = self.resolve(key)?;
        if raw.is_empty() {
            return Err(MicError::MissingArgument {
                key: key.as_str().to_string(),
            });
        }

        let value = ValidationRule::for_key(key).parse(key, raw)?;
        self.mutate(state, io, key, value);

        if let Err(e) = io.store.commit(&state.persisted()) {
            warn!("Failed to commit settings after {} change: {}", key, e);
        }
        info!("AUDIT: setting {} = {}", key, value);
        Ok(value)
    }

    /// Assign a validated value and run the key's side effects
    fn mutate(&self, state: &mut DeviceState, io: &mut Peripherals, key: SettingKey, value: SettingValue) {
        match (key, value) {
            (SettingKey::Rate, SettingValue::Unsigned(v)) => {
                state.settings_mut().sample_rate = v;
                recompute_threshold_if_auto(state, io);
                restart_pipeline(state, io);
            }
            (SettingKey::Buffer, SettingValue::Unsigned(v)) => {
                state.settings_mut().buffer_size = v as u16;
                recompute_threshold_if_auto(state, io);
                restart_pipeline(state, io);
            }
            (SettingKey::Gain, SettingValue::Float(v)) => {
                state.settings_mut().gain = v;
                restart_pipeline(state, io);
            }
            (SettingKey::Shift, SettingValue::Unsigned(v)) => {
                state.settings_mut().shift_bits = v as u8;
                restart_pipeline(state, io);
            }
            (SettingKey::WifiTx, SettingValue::Float(v)) => {
                state.settings_mut().wifi_tx_dbm = v;
                if let Err(e) = io.platform.apply_wifi_tx_power(v) {
                    warn!("Failed to apply Wi-Fi TX power {} dBm: {}", v, e);
                }
            }
            (SettingKey::AutoRecovery, SettingValue::Flag(on)) => {
                state.settings_mut().auto_recovery = on;
            }
            (SettingKey::ThrMode, SettingValue::Flag(auto)) => {
                state.settings_mut().auto_threshold = auto;
                if auto {
                    recompute_threshold_if_auto(state, io);
                }
            }
            (SettingKey::MinRate, SettingValue::Unsigned(v)) => {
                state.settings_mut().min_rate = v;
            }
            (SettingKey::CheckInterval, SettingValue::Unsigned(v)) => {
                state.settings_mut().check_interval_min = v;
            }
            (SettingKey::SchedReset, SettingValue::Flag(on)) => {
                state.settings_mut().scheduled_reset = on;
            }
            (SettingKey::ResetHours, SettingValue::Unsigned(v)) => {
                state.settings_mut().reset_hours = v;
            }
            (SettingKey::CpuFreq, SettingValue::Unsigned(v)) => {
                state.settings_mut().cpu_mhz = v;
                if let Err(e) = io.platform.set_cpu_frequency(v) {
                    warn!("Failed to set CPU frequency to {} MHz: {}", v, e);
                }
            }
            (SettingKey::HpEnable, SettingValue::Flag(on)) => {
                state.settings_mut().hp_enable = on;
                update_highpass(state, io);
            }
            (SettingKey::HpCutoff, SettingValue::Unsigned(v)) => {
                state.settings_mut().hp_cutoff_hz = v as u16;
                update_highpass(state, io);
            }
            (SettingKey::OhEnable, SettingValue::Flag(on)) => {
                state.settings_mut().overheat_protection = on;
                if !on {
                    state.thermal_mut().clear_transient();
                }
            }
            (SettingKey::OhLimit, SettingValue::Unsigned(v)) => {
                state.settings_mut().overheat_limit_c = v;
                state.thermal_mut().clear_transient();
            }
            (key, value) => {
                // Rules and arms are keyed identically; reaching here is a table bug
                debug!("No mutation registered for {} = {:?}", key, value);
            }
        }
    }
}

fn recompute_threshold_if_auto(state: &mut DeviceState, io: &Peripherals) {
    let settings = state.settings();
    if !settings.auto_threshold {
        return;
    }
    let recommended = io
        .recommender
        .recommend(settings.sample_rate, settings.buffer_size);
    debug!("Restart threshold recomputed: {} pkt/s", recommended);
    state.settings_mut().min_rate = recommended;
}

fn restart_pipeline(state: &DeviceState, io: &mut Peripherals) {
    if let Err(e) = io.pipeline.restart(state.settings()) {
        warn!("Audio pipeline restart failed: {}", e);
    }
}

fn update_highpass(state: &DeviceState, io: &mut Peripherals) {
    let s = state.settings();
    io.pipeline
        .update_highpass(s.hp_enable, s.hp_cutoff_hz, s.sample_rate);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Settings;
    use crate::peripherals::testing::Mocks;
    use crate::peripherals::RateRecommender;
    use std::time::Instant;

    fn fresh_state() -> DeviceState {
        DeviceState::new(Settings::default(), Instant::now())
    }

    /// Peripherals that reject any call except store commits
    fn quiet_io() -> Peripherals {
        Mocks::new().lenient_store().into_peripherals()
    }

    struct FixedRecommender(u32);

    impl RateRecommender for FixedRecommender {
        fn recommend(&self, _sample_rate: u32, _buffer_size: u16) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_snap_wifi_tx() {
        assert_eq!(snap_wifi_tx(6.0), 5.0);
        assert_eq!(snap_wifi_tx(-1.0), -1.0);
        assert_eq!(snap_wifi_tx(19.4), 19.5);
        assert_eq!(snap_wifi_tx(18.75), 18.5);
        assert_eq!(snap_wifi_tx(9.0), 8.5);
        assert_eq!(snap_wifi_tx(100.0), 19.5);
    }

    #[test]
    fn test_snap_thermal_limit() {
        assert_eq!(snap_thermal_limit(77), 75);
        assert_eq!(snap_thermal_limit(30), 30);
        assert_eq!(snap_thermal_limit(95), 95);
        assert_eq!(snap_thermal_limit(34), 30);
        assert_eq!(snap_thermal_limit(10), 30);
        assert_eq!(snap_thermal_limit(200), 95);
    }

    #[test]
    fn test_parse_leading_int() {
        assert_eq!(parse_leading_int("48000"), Some(48000));
        assert_eq!(parse_leading_int("48000.7"), Some(48000));
        assert_eq!(parse_leading_int("  12abc"), Some(12));
        assert_eq!(parse_leading_int("-5"), Some(-5));
        assert_eq!(parse_leading_int("+7"), Some(7));
        assert_eq!(parse_leading_int("abc"), None);
        assert_eq!(parse_leading_int("-"), None);
        assert_eq!(parse_leading_int("99999999999999999999999"), Some(i64::MAX));
    }

    #[test]
    fn test_out_of_range_leaves_every_key_unchanged() {
        let registry = SettingsRegistry::new(true);
        let cases: [(&str, &str); 16] = [
            ("rate", "7999"),
            ("gain", "100.5"),
            ("buffer", "255"),
            ("shift", "25"),
            ("wifi_tx", "-1.5"),
            ("auto_recovery", "yes"),
            ("thr_mode", "on"),
            ("min_rate", "201"),
            ("check_interval", "0"),
            ("sched_reset", "ON"),
            ("reset_hours", "169"),
            ("cpu_freq", "39"),
            ("hp_enable", "true"),
            ("hp_cutoff", "10001"),
            ("oh_enable", "1"),
            ("oh_limit", "96"),
        ];

        for (key, raw) in cases {
            let mut state = fresh_state();
            // No expectations: any collaborator call would panic
            let mut io = Mocks::new().into_peripherals();
            let before = state.settings().clone();

            let result = registry.apply(&mut state, &mut io, key, Some(raw));
            assert!(result.as_ref().is_err_and(MicError::is_validation), "{}={}", key, raw);
            assert_eq!(state.settings(), &before, "{}={}", key, raw);
        }
    }

    #[test]
    fn test_malformed_and_negative_input() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut io = Mocks::new().into_peripherals();

        let err = registry
            .apply(&mut state, &mut io, "rate", Some("fast"))
            .unwrap_err();
        assert!(matches!(err, MicError::MalformedInput { .. }));

        let err = registry
            .apply(&mut state, &mut io, "rate", Some("-48000"))
            .unwrap_err();
        assert!(matches!(err, MicError::OutOfRange { .. }));

        let err = registry
            .apply(&mut state, &mut io, "gain", Some("NaN"))
            .unwrap_err();
        assert!(matches!(err, MicError::MalformedInput { .. }));
        assert_eq!(state.settings(), &Settings::default());
    }

    #[test]
    fn test_missing_value_and_unknown_key() {
        let registry = SettingsRegistry::new(false);
        let mut state = fresh_state();
        let mut io = Mocks::new().into_peripherals();

        let err = registry.apply(&mut state, &mut io, "gain", None).unwrap_err();
        assert!(matches!(err, MicError::MissingArgument { .. }));

        let err = registry.apply(&mut state, &mut io, "volume", Some("3")).unwrap_err();
        assert!(matches!(err, MicError::UnknownKey(_)));

        // Shift is hidden on hardware without shift bits
        let err = registry.apply(&mut state, &mut io, "shift", Some("8")).unwrap_err();
        assert!(matches!(err, MicError::UnknownKey(_)));
        assert_eq!(state.settings().shift_bits, 12);
    }

    #[test]
    fn test_audit_line_pushed_before_validation() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut io = Mocks::new().into_peripherals();

        let _ = registry.apply(&mut state, &mut io, "rate", Some("1"));
        let _ = registry.apply(&mut state, &mut io, "gain", Some(""));
        assert_eq!(state.log().read_all(), vec!["UI set: rate=1"]);
    }

    #[test]
    fn test_rate_recomputes_threshold_and_restarts() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut mocks = Mocks::new();
        mocks
            .pipeline
            .expect_restart()
            .withf(|s: &Settings| s.sample_rate == 44100 && s.min_rate == 42)
            .times(1)
            .returning(|_| Ok(()));
        mocks
            .store
            .expect_commit()
            .withf(|p| p.settings.sample_rate == 44100)
            .times(1)
            .returning(|_| Ok(()));
        let mut io = mocks
            .into_peripherals()
            .with_recommender(Box::new(FixedRecommender(42)));

        let value = registry
            .apply(&mut state, &mut io, "rate", Some("44100"))
            .unwrap();
        assert_eq!(value, SettingValue::Unsigned(44100));
        assert_eq!(state.settings().min_rate, 42);
    }

    #[test]
    fn test_buffer_in_manual_mode_keeps_threshold() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        state.settings_mut().auto_threshold = false;
        state.settings_mut().min_rate = 17;

        let mut mocks = Mocks::new().lenient_store();
        mocks.pipeline.expect_restart().times(1).returning(|_| Ok(()));
        let mut io = mocks
            .into_peripherals()
            .with_recommender(Box::new(FixedRecommender(99)));

        registry.apply(&mut state, &mut io, "buffer", Some("512")).unwrap();
        assert_eq!(state.settings().buffer_size, 512);
        assert_eq!(state.settings().min_rate, 17);
    }

    #[test]
    fn test_gain_and_shift_restart_pipeline() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut mocks = Mocks::new().lenient_store();
        mocks.pipeline.expect_restart().times(2).returning(|_| Ok(()));
        let mut io = mocks.into_peripherals();

        registry.apply(&mut state, &mut io, "gain", Some("2.5")).unwrap();
        registry.apply(&mut state, &mut io, "shift", Some("8")).unwrap();
        assert_eq!(state.settings().gain, 2.5);
        assert_eq!(state.settings().shift_bits, 8);
    }

    #[test]
    fn test_wifi_tx_snaps_and_applies() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut mocks = Mocks::new().lenient_store();
        mocks
            .platform
            .expect_apply_wifi_tx_power()
            .withf(|dbm| *dbm == 5.0)
            .times(1)
            .returning(|_| Ok(()));
        let mut io = mocks.into_peripherals();

        let value = registry
            .apply(&mut state, &mut io, "wifi_tx", Some("6.0"))
            .unwrap();
        assert_eq!(value, SettingValue::Float(5.0));
        assert_eq!(state.settings().wifi_tx_dbm, 5.0);
    }

    #[test]
    fn test_thr_mode() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        state.settings_mut().auto_threshold = false;
        state.settings_mut().min_rate = 10;
        let mut io = Mocks::new()
            .lenient_store()
            .into_peripherals()
            .with_recommender(Box::new(FixedRecommender(33)));

        registry.apply(&mut state, &mut io, "thr_mode", Some("manual")).unwrap();
        assert!(!state.settings().auto_threshold);
        assert_eq!(state.settings().min_rate, 10);

        registry.apply(&mut state, &mut io, "thr_mode", Some("auto")).unwrap();
        assert!(state.settings().auto_threshold);
        assert_eq!(state.settings().min_rate, 33);
    }

    #[test]
    fn test_cpu_freq_applies_clock() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut mocks = Mocks::new().lenient_store();
        mocks
            .platform
            .expect_set_cpu_frequency()
            .withf(|mhz| *mhz == 80)
            .times(1)
            .returning(|_| Ok(()));
        let mut io = mocks.into_peripherals();

        registry.apply(&mut state, &mut io, "cpu_freq", Some("80")).unwrap();
        assert_eq!(state.settings().cpu_mhz, 80);
    }

    #[test]
    fn test_highpass_keys_update_coefficients() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut mocks = Mocks::new().lenient_store();
        mocks
            .pipeline
            .expect_update_highpass()
            .withf(|enabled, cutoff, rate| !*enabled && *cutoff == 500 && *rate == 48000)
            .times(1)
            .return_const(());
        mocks
            .pipeline
            .expect_update_highpass()
            .withf(|enabled, cutoff, _| !*enabled && *cutoff == 300)
            .times(1)
            .return_const(());
        let mut io = mocks.into_peripherals();

        registry.apply(&mut state, &mut io, "hp_enable", Some("off")).unwrap();
        registry.apply(&mut state, &mut io, "hp_cutoff", Some("300")).unwrap();
        assert!(!state.settings().hp_enable);
        assert_eq!(state.settings().hp_cutoff_hz, 300);
    }

    #[test]
    fn test_thermal_keys_clear_transient_lockout_only() {
        let registry = SettingsRegistry::new(true);
        let mut io = quiet_io();

        let mut state = fresh_state();
        state
            .thermal_mut()
            .record_trip(Default::default(), false);
        state.thermal_mut().record_trip(Default::default(), true);

        let value = registry
            .apply(&mut state, &mut io, "oh_limit", Some("77"))
            .unwrap();
        assert_eq!(value, SettingValue::Unsigned(75));
        assert_eq!(state.settings().overheat_limit_c, 75);
        assert!(!state.thermal().transient_lockout());
        assert!(state.thermal().persistent_latch());

        state.thermal_mut().record_trip(Default::default(), false);
        registry.apply(&mut state, &mut io, "oh_enable", Some("on")).unwrap();
        assert!(state.thermal().transient_lockout());
        registry.apply(&mut state, &mut io, "oh_enable", Some("off")).unwrap();
        assert!(!state.thermal().transient_lockout());
        assert!(state.thermal().persistent_latch());
    }

    #[test]
    fn test_plain_assignments_only_commit() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut mocks = Mocks::new();
        mocks.store.expect_commit().times(5).returning(|_| Ok(()));
        let mut io = mocks.into_peripherals();

        registry.apply(&mut state, &mut io, "auto_recovery", Some("off")).unwrap();
        registry.apply(&mut state, &mut io, "min_rate", Some("40")).unwrap();
        registry.apply(&mut state, &mut io, "check_interval", Some("5")).unwrap();
        registry.apply(&mut state, &mut io, "sched_reset", Some("on")).unwrap();
        registry.apply(&mut state, &mut io, "reset_hours", Some("48")).unwrap();

        let s = state.settings();
        assert!(!s.auto_recovery);
        assert_eq!(s.min_rate, 40);
        assert_eq!(s.check_interval_min, 5);
        assert!(s.scheduled_reset);
        assert_eq!(s.reset_hours, 48);
    }

    #[test]
    fn test_commit_failure_keeps_mutation() {
        let registry = SettingsRegistry::new(true);
        let mut state = fresh_state();
        let mut mocks = Mocks::new();
        mocks
            .store
            .expect_commit()
            .returning(|_| Err(MicError::persistence("disk full")));
        let mut io = mocks.into_peripherals();

        registry.apply(&mut state, &mut io, "reset_hours", Some("12")).unwrap();
        assert_eq!(state.settings().reset_hours, 12);
    }
}
