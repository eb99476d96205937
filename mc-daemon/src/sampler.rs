//! Thermal sensor sampling loop
//!
//! Feeds periodic readings into the controller's thermal input surface. A
//! failed read is reported as a sensor fault; the loop itself never exits on
//! read errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mc_core::SharedController;
use tracing::{debug, info, warn};

use crate::host::SysfsThermalSensor;

/// Consecutive failures before the warning is repeated
const FAULT_LOG_EVERY: u32 = 30;

pub async fn run_sensor_loop(
    controller: SharedController,
    sensor: SysfsThermalSensor,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    info!(
        "Thermal sampling started: {} every {} ms",
        sensor.path().display(),
        interval.as_millis()
    );

    let mut ticker = tokio::time::interval(interval);
    let mut consecutive_errors: u32 = 0;

    loop {
        ticker.tick().await;
        if shutdown.load(Ordering::SeqCst) {
            info!("Thermal sampling shutting down");
            break;
        }

        let reading = match sensor.read_celsius() {
            Ok(c) => {
                if consecutive_errors > 0 {
                    debug!("Sensor recovered after {} failed reads", consecutive_errors);
                    consecutive_errors = 0;
                }
                Some(c)
            }
            Err(e) => {
                if consecutive_errors % FAULT_LOG_EVERY == 0 {
                    warn!("Temperature read failed: {}", e);
                }
                consecutive_errors = consecutive_errors.saturating_add(1);
                None
            }
        };

        controller.lock().record_temperature(reading);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_controller;
    use std::fs;

    #[tokio::test(start_paused = true)]
    async fn test_loop_feeds_readings_and_faults() {
        let (controller, dir) = test_controller();
        let path = dir.path().join("temp");
        fs::write(&path, "51000\n").unwrap();

        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(run_sensor_loop(
            controller.clone(),
            SysfsThermalSensor::new(&path),
            Duration::from_millis(2000),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(controller.lock().state().thermal().current_c(), Some(51.0));

        fs::remove_file(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert!(controller.lock().state().thermal().sensor_fault());
        assert_eq!(controller.lock().state().thermal().max_c(), 51.0);

        shutdown.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2000)).await;
        handle.await.unwrap();
    }
}
