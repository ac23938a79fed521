//! Lifecycle supervision: a single multiplexed wait over termination
//! signals and child exit, signal forwarding, and reaping.
//!
//! The supervisor owns the only suspension point of the program. In RUNNING
//! it blocks on one `select!` over two event sources: a shutdown channel fed
//! by the process's SIGTERM/SIGINT streams, and a blocking reap task around
//! `Child::wait`. Whichever fires first decides the shutdown path:
//!
//! - signal first: forward exactly one equivalent signal to the child, then
//!   block until the child is reaped;
//! - child exit first: nothing to forward, the exit status is the result.
//!
//! There is deliberately no forced-kill escalation: a failed termination
//! delivery is reported with its own error (and exit code) after a bounded
//! reap attempt, and the supervisor exits.

use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::Signal;
use thiserror::Error;
use tokio::signal::unix::{signal as unix_signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::{self, JoinError};
use tracing::{debug, info, warn};

use crate::launch::EndpointHandle;

/// How long to keep trying to reap after a failed termination delivery.
const REAP_GRACE: Duration = Duration::from_secs(2);

/// Errors that can occur during supervision.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Failed to build the supervision runtime.
    #[error("Failed to build supervision runtime: {0}")]
    RuntimeBuild(#[source] std::io::Error),

    /// Failed to install signal handlers.
    #[error("Failed to install signal handlers: {0}")]
    SignalSetup(#[source] std::io::Error),

    /// OS-level failure while reaping the endpoint.
    #[error("Failed to reap endpoint: {0}")]
    WaitFailed(#[source] std::io::Error),

    /// The forwarded termination signal could not be delivered.
    #[error("Failed to deliver {signal:?} to endpoint (PID {pid}): {source}")]
    TerminationDeliveryFailed {
        /// The signal that could not be delivered.
        signal: Signal,
        /// The endpoint's PID.
        pid: u32,
        /// The underlying errno.
        #[source]
        source: nix::Error,
    },
}

/// Supervision lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Endpoint launched, interface not yet configured.
    Starting,
    /// Interface configured; blocked on the multiplexed wait.
    Running,
    /// Shutdown in progress; waiting for the reap.
    Stopping,
    /// Terminal.
    Exited,
}

/// Log a lifecycle transition.
pub(crate) fn transition(from: State, to: State) {
    debug!("lifecycle: {:?} -> {:?}", from, to);
}

/// How the supervised run ended.
#[derive(Debug)]
pub enum Outcome {
    /// The endpoint exited on its own; the supervisor mirrors its status.
    ChildExited {
        /// The endpoint's exit status.
        status: ExitStatus,
    },
    /// Supervisor-initiated shutdown: a signal was forwarded and the
    /// endpoint was reaped.
    SignalStopped {
        /// The signal that was forwarded.
        signal: Signal,
        /// The endpoint's exit status after the forward.
        status: ExitStatus,
    },
}

impl Outcome {
    /// The process exit code this outcome maps to.
    ///
    /// A child that exited first propagates its own code (128+signo when it
    /// was signal-killed by someone else); a supervisor-initiated shutdown
    /// that completed is a success.
    pub fn exit_code(&self) -> i32 {
        use std::os::unix::process::ExitStatusExt;

        match self {
            Outcome::ChildExited { status } => status
                .code()
                .unwrap_or_else(|| status.signal().map(|s| 128 + s).unwrap_or(1)),
            Outcome::SignalStopped { .. } => 0,
        }
    }
}

/// Supervise the endpoint until a termination signal or its own exit.
///
/// Installs SIGTERM/SIGINT handlers, then blocks on the multiplexed wait.
/// This consumes the handle: the child is owned by the reap task from here
/// on, and is guaranteed reaped on every non-error path.
pub fn supervise(handle: EndpointHandle) -> Result<Outcome, SupervisorError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(SupervisorError::RuntimeBuild)?;

    rt.block_on(async {
        let mut term =
            unix_signal(SignalKind::terminate()).map_err(SupervisorError::SignalSetup)?;
        let mut int =
            unix_signal(SignalKind::interrupt()).map_err(SupervisorError::SignalSetup)?;

        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            let received = tokio::select! {
                _ = term.recv() => Signal::SIGTERM,
                _ = int.recv() => Signal::SIGINT,
            };
            // A full channel means shutdown is already in progress.
            let _ = tx.send(received).await;
        });

        run(handle, rx).await
    })
}

/// Core supervision loop over an explicit shutdown channel.
///
/// Split from [`supervise`] so tests can drive shutdown without delivering
/// process-wide signals. Exactly one termination request is ever forwarded:
/// the channel is consumed once, and later sends are never received.
pub async fn run(
    handle: EndpointHandle,
    mut shutdown: mpsc::Receiver<Signal>,
) -> Result<Outcome, SupervisorError> {
    let pid = handle.pid;
    transition(State::Starting, State::Running);
    info!("Supervising endpoint (PID {})", pid);

    let mut reap = task::spawn_blocking(move || handle.into_child().wait());

    tokio::select! {
        status = &mut reap => {
            let status = flatten_reap(status)?;
            transition(State::Running, State::Exited);
            info!("Endpoint exited on its own: {}", status);
            Ok(Outcome::ChildExited { status })
        }
        requested = shutdown.recv() => {
            transition(State::Running, State::Stopping);
            match requested {
                Some(signal) => {
                    if reap.is_finished() {
                        // The endpoint exited just as shutdown was requested:
                        // its pid may already be stale, so nothing is
                        // forwarded and its own status wins.
                        let status = flatten_reap((&mut reap).await)?;
                        transition(State::Stopping, State::Exited);
                        return Ok(Outcome::ChildExited { status });
                    }
                    info!("Forwarding {:?} to endpoint (PID {})", signal, pid);
                    match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal) {
                        Ok(()) => {
                            let status = flatten_reap((&mut reap).await)?;
                            transition(State::Stopping, State::Exited);
                            info!("Endpoint stopped after {:?}: {}", signal, status);
                            Ok(Outcome::SignalStopped { signal, status })
                        }
                        Err(nix::errno::Errno::ESRCH) => {
                            // The endpoint beat us to exiting; treat this as
                            // the child-exit path and mirror its status.
                            debug!("Endpoint (PID {}) already gone before forward", pid);
                            let status = flatten_reap((&mut reap).await)?;
                            transition(State::Stopping, State::Exited);
                            Ok(Outcome::ChildExited { status })
                        }
                        Err(source) => {
                            warn!("Termination delivery to PID {} failed: {}", pid, source);
                            let _ = tokio::time::timeout(REAP_GRACE, &mut reap).await;
                            transition(State::Stopping, State::Exited);
                            Err(SupervisorError::TerminationDeliveryFailed { signal, pid, source })
                        }
                    }
                }
                None => {
                    // Signal sources are gone; only child exit remains.
                    let status = flatten_reap((&mut reap).await)?;
                    transition(State::Stopping, State::Exited);
                    Ok(Outcome::ChildExited { status })
                }
            }
        }
    }
}

/// Collapse the reap task's nested result into the endpoint's exit status.
fn flatten_reap(
    result: Result<std::io::Result<ExitStatus>, JoinError>,
) -> Result<ExitStatus, SupervisorError> {
    match result {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => Err(SupervisorError::WaitFailed(e)),
        Err(e) => Err(SupervisorError::WaitFailed(std::io::Error::other(e))),
    }
}
