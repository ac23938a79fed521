//! Bootstrap sequencing and failure unwinding.
//!
//! Strict order: grant -> launch -> configure -> supervise. Every step
//! returns a typed result consumed by the next; a failure short-circuits the
//! remaining steps, and once the endpoint is running, any failure terminates
//! and reaps it before unwinding so no half-configured endpoint outlives its
//! supervisor.

use nix::sys::signal::Signal;
use tracing::{error, info, warn};

use crate::error::WardenError;
use crate::grant;
use crate::iface::{self, IpRoute2, WaitPolicy};
use crate::launch::{self, EndpointHandle};
use crate::settings::Settings;
use crate::supervisor::{self, Outcome};
use crate::telemetry::{self, AuditEvent};

/// Run the full bootstrap-and-supervision sequence.
///
/// Returns the process exit code on a supervised shutdown; errors carry
/// their own distinct exit codes (see [`crate::error`]).
pub fn run(settings: &Settings) -> Result<i32, WardenError> {
    let image = launch::resolve_image(&settings.endpoint.image)?;
    info!("Endpoint image: {}", image.display());

    grant::grant(&image)?;
    telemetry::audit().log(AuditEvent::GrantApplied {
        image: image.display().to_string(),
    });

    let mut handle = launch::launch(&image)?;
    telemetry::audit().log(AuditEvent::EndpointLaunched {
        image: image.display().to_string(),
        pid: handle.pid,
    });

    let wait = WaitPolicy::new(settings.wait.poll_interval(), settings.wait.timeout());
    let mut link = IpRoute2;
    if let Err(e) = iface::configure(
        &mut link,
        &settings.interface.name,
        settings.interface.address,
        settings.interface.prefix_len,
        &wait,
    ) {
        error!("Interface configuration failed: {}", e);
        abort_endpoint(&mut handle);
        return Err(e.into());
    }
    telemetry::audit().log(AuditEvent::InterfaceUp {
        name: settings.interface.name.clone(),
        address: format!(
            "{}/{}",
            settings.interface.address, settings.interface.prefix_len
        ),
    });

    let pid = handle.pid;
    let outcome = supervisor::supervise(handle)?;
    match &outcome {
        Outcome::ChildExited { status } => {
            telemetry::audit().log(AuditEvent::EndpointExited {
                pid,
                code: status.code(),
            });
        }
        Outcome::SignalStopped { signal, status } => {
            telemetry::audit().log(AuditEvent::ShutdownForwarded {
                signal: format!("{:?}", signal),
                pid,
            });
            telemetry::audit().log(AuditEvent::EndpointExited {
                pid,
                code: status.code(),
            });
        }
    }

    Ok(outcome.exit_code())
}

/// Terminate and reap the endpoint after a bootstrap failure.
///
/// Best-effort: delivery and reap problems are logged, not escalated — the
/// original bootstrap error is what the caller reports.
fn abort_endpoint(handle: &mut EndpointHandle) {
    info!(
        "Terminating endpoint (PID {}) after bootstrap failure",
        handle.pid
    );
    match handle.signal(Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => {
            warn!(
                "Failed to deliver SIGTERM to endpoint (PID {}): {}",
                handle.pid, e
            );
        }
    }
    match handle.wait() {
        Ok(status) => info!("Endpoint reaped: {}", status),
        Err(e) => warn!("Failed to reap endpoint (PID {}): {}", handle.pid, e),
    }
}
