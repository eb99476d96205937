//! Deferred terminal actions
//!
//! Reboot and factory reset must not kill the process before the HTTP
//! response that requested them has been written. The scheduler spawns a
//! one-shot task that optionally resets settings, sleeps for the configured
//! delay and then restarts the process. Only one action can be pending.

use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mc_core::SharedController;
use mc_error::{MicError, Result};
use tracing::{error, info, warn};

/// Replaces the running process
pub trait ProcessRestarter: Send + Sync {
    /// Only returns on failure
    fn restart(&self) -> Result<()>;
}

/// Re-executes the current binary with the same arguments
#[derive(Debug, Default)]
pub struct ExecRestarter;

impl ProcessRestarter for ExecRestarter {
    fn restart(&self) -> Result<()> {
        let exe = std::env::current_exe()?;
        info!("SHUTDOWN: restarting {}", exe.display());
        let err = Command::new(&exe).args(std::env::args_os().skip(1)).exec();
        Err(MicError::generic(format!("exec of {} failed: {}", exe.display(), err)))
    }
}

pub struct DeferredActionScheduler {
    controller: SharedController,
    restarter: Arc<dyn ProcessRestarter>,
    in_flight: Arc<AtomicBool>,
}

impl DeferredActionScheduler {
    pub fn new(controller: SharedController, restarter: Arc<dyn ProcessRestarter>) -> Self {
        Self {
            controller,
            restarter,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Fire-and-forget. Returns false when an action is already pending, in
    /// which case this request is dropped.
    pub fn schedule(&self, factory_reset: bool, delay: Duration) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(
                "Restart already pending, dropping {} request",
                if factory_reset { "factory reset" } else { "reboot" }
            );
            return false;
        }

        let controller = self.controller.clone();
        let restarter = self.restarter.clone();
        let in_flight = self.in_flight.clone();

        tokio::spawn(async move {
            if factory_reset {
                let result = controller.lock().reset_to_defaults();
                if let Err(e) = result {
                    error!("Factory reset failed: {}", e);
                }
            }

            tokio::time::sleep(delay).await;

            if let Err(e) = restarter.restart() {
                error!("Process restart failed: {}", e);
                in_flight.store(false, Ordering::SeqCst);
            }
        });

        info!(
            "{} scheduled in {} ms",
            if factory_reset { "Factory reset" } else { "Reboot" },
            delay.as_millis()
        );
        true
    }
}
