//! micctl daemon (micctld)
//!
//! Serves the control and status API of the microphone appliance over HTTP.
//!
//! # Start-up
//! - panic hook, restrictive umask, no core dumps
//! - configuration from JSON, overridden by command-line flags
//! - logging to the systemd journal when available, stdout otherwise
//! - stored settings loaded, collaborators brought up, stream server started
//!   unless a thermal latch was restored
//! - thermal sampling task and HTTP server

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use mc_core::constants::daemon::DEFAULT_CONFIG_PATH;
use mc_core::{Controller, DaemonConfig};
use mc_daemon::host::{host_peripherals, SysfsThermalSensor};
use mc_daemon::sampler::run_sensor_loop;
use mc_daemon::{run_server, AppState, DeferredActionScheduler, ExecRestarter};
use tracing::{debug, error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "micctld")]
#[command(author, version, about = "micctl network microphone control daemon")]
struct Cli {
    /// Listen address, overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Path to the daemon config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Path to the persisted settings file, overrides the config file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Run in foreground (always on; kept for service files)
    #[arg(short, long)]
    foreground: bool,
}

// ============================================================================
// Process hardening
// ============================================================================

/// No core dumps: they would carry settings and network state
fn disable_core_dumps() {
    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: setrlimit reads a fully initialized rlimit struct for a known resource.
    if unsafe { libc::setrlimit(libc::RLIMIT_CORE, &limit) } != 0 {
        warn!("Failed to disable core dumps");
    }
}

fn set_secure_umask() {
    // SAFETY: umask only replaces the process file creation mask.
    unsafe { libc::umask(0o077) };
    debug!("Umask set to 0077");
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("PANIC at {}: {}", location, message);
    }));
}

// ============================================================================
// Logging
// ============================================================================

/// Journald when the socket exists, stdout otherwise. Returns true for journald.
fn init_logging(level: &str) -> bool {
    use tracing_subscriber::prelude::*;

    if std::path::Path::new("/run/systemd/journal/socket").exists() {
        match tracing_journald::layer() {
            Ok(journald_layer) => {
                tracing_subscriber::registry()
                    .with(journald_layer)
                    .with(tracing_subscriber::EnvFilter::new(level))
                    .init();
                return true;
            }
            Err(e) => {
                eprintln!("Failed to create journald layer: {}, falling back to stdout", e);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(level)
        .init();
    false
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    install_panic_hook();
    set_secure_umask();

    let cli = Cli::parse();

    let log_level = std::env::var("MICCTL_LOG").unwrap_or_else(|_| "info".to_string());
    let use_journald = init_logging(&log_level);
    disable_core_dumps();

    info!("STARTUP: micctld {} starting", VERSION);
    if cli.foreground {
        debug!("STARTUP: Foreground mode");
    }
    info!(
        "STARTUP: Logging to {}",
        if use_journald { "systemd journal" } else { "stdout" }
    );

    let mut config = DaemonConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(settings) = cli.settings {
        config.settings_path = settings;
    }
    config.validate().context("invalid configuration")?;
    let addr = config.bind_addr()?;

    info!("STARTUP: Settings file: {}", config.settings_path.display());
    info!("STARTUP: Log level: {}", log_level);

    let io = host_peripherals(&config.settings_path);
    let controller = mc_core::shared(Controller::boot(
        io,
        config.device_profile(),
        Instant::now(),
    ));

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("SIGNAL: Received SIGINT/SIGTERM - shutting down");
        shutdown_signal.store(true, Ordering::SeqCst);
        std::process::exit(0);
    }) {
        warn!("Failed to set signal handler: {}", e);
    }

    let sampler = tokio::spawn(run_sensor_loop(
        controller.clone(),
        SysfsThermalSensor::new(&config.sensor_path),
        config.sensor_interval(),
        shutdown.clone(),
    ));

    let scheduler = Arc::new(DeferredActionScheduler::new(
        controller.clone(),
        Arc::new(ExecRestarter),
    ));

    let result = run_server(
        addr,
        AppState {
            controller,
            scheduler,
            reboot_delay: config.reboot_delay(),
        },
    )
    .await;

    shutdown.store(true, Ordering::SeqCst);
    sampler.abort();

    if let Err(e) = &result {
        error!("Server error: {:#}", e);
    }
    result
}
