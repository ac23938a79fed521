//! tun-warden: bootstrap and supervise a user-space TUN endpoint.
//!
//! This is the main entry point. There are no command-line flags: the
//! deployment is described by the settings files (see [`tun_warden::settings`])
//! and logging verbosity by `RUST_LOG`. The exit code is the supervised
//! child's when it exited first, zero after a completed signal-initiated
//! shutdown, and a distinct per-failure-class code otherwise.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, error, warn};

use tun_warden::error::EXIT_SETTINGS;
use tun_warden::orchestrator;
use tun_warden::settings::SettingsLoader;
use tun_warden::telemetry::{self, AuditEvent};

fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("tun-warden: {e:#}");
        return ExitCode::from(EXIT_SETTINGS);
    }

    // Audit telemetry is best-effort; a host without syslog still runs.
    if let Err(e) = telemetry::init_logger() {
        warn!("Telemetry initialization skipped: {}", e);
    }

    let settings = match SettingsLoader::new().load() {
        Ok(settings) => settings,
        Err(e) => {
            error!("Failed to load settings: {}", e);
            return ExitCode::from(EXIT_SETTINGS);
        }
    };
    debug!("Loaded settings: {:?}", settings);

    telemetry::audit().log(AuditEvent::SessionStart {
        user: whoami(),
        image: settings.endpoint.image.clone(),
        pid: std::process::id(),
    });

    let code = match orchestrator::run(&settings) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            i32::from(e.exit_code())
        }
    };

    telemetry::audit().log(AuditEvent::SessionEnd {
        user: whoami(),
        exit_code: code,
    });

    ExitCode::from(code.clamp(0, 255) as u8)
}

/// Initialize the tracing subscriber for operational logging.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

/// Get the invoking username for audit logging.
fn whoami() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
