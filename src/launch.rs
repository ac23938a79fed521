//! Endpoint process launch and child handle.
//!
//! Launch success means "process started", nothing more: the endpoint is
//! expected to create its TUN interface as a side effect of starting, and
//! the interface configurator waits for that separately. The handle is the
//! single owner of the child; it is passed by value through the lifecycle,
//! never stored globally.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while resolving or launching the endpoint.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// The image path does not resolve to an existing file.
    #[error("Endpoint image not found: {path}")]
    ImageNotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// A bare image name was not found in PATH.
    #[error("Endpoint '{name}' not found in PATH: {source}")]
    NotInPath {
        /// The bare name that was looked up.
        name: String,
        /// The underlying lookup error.
        #[source]
        source: which::Error,
    },

    /// The OS could not start the process.
    #[error("Failed to start endpoint {path}: {source}")]
    ExecFailure {
        /// The image that failed to start.
        path: PathBuf,
        /// The underlying spawn error.
        #[source]
        source: io::Error,
    },
}

/// Handle to the running endpoint process.
///
/// Exclusively owned by the supervision path for the duration of the run;
/// created at launch, destroyed when the child is reaped.
#[derive(Debug)]
pub struct EndpointHandle {
    child: Child,
    /// PID of the endpoint process.
    pub pid: u32,
}

impl EndpointHandle {
    /// Block until the endpoint exits, reaping it.
    pub fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait()
    }

    /// Get the exit status if available, without blocking.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Check if the endpoint is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Send a signal to the endpoint process.
    pub fn signal(&self, signal: nix::sys::signal::Signal) -> nix::Result<()> {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        kill(Pid::from_raw(self.pid as i32), signal)
    }

    /// Surrender the underlying child, e.g. to a blocking reap task.
    pub fn into_child(self) -> Child {
        self.child
    }
}

/// Resolve the configured image string to a concrete executable path.
///
/// Absolute paths must exist as given; relative paths are canonicalized;
/// bare names are looked up in PATH.
pub fn resolve_image(image: &str) -> Result<PathBuf, LaunchError> {
    let path = PathBuf::from(image);
    if path.is_absolute() {
        if path.exists() {
            Ok(path)
        } else {
            Err(LaunchError::ImageNotFound { path })
        }
    } else if image.contains('/') {
        std::fs::canonicalize(&path).map_err(|_| LaunchError::ImageNotFound { path })
    } else {
        which::which(image).map_err(|source| LaunchError::NotInPath {
            name: image.to_string(),
            source,
        })
    }
}

/// Start the endpoint image as an independent background process.
///
/// stdin is closed; stdout/stderr stay on the supervisor's descriptors so
/// the endpoint's own output remains visible. Does not wait for the child
/// to reach any internal state.
pub fn launch(image: &Path) -> Result<EndpointHandle, LaunchError> {
    if !image.is_file() {
        return Err(LaunchError::ImageNotFound {
            path: image.to_path_buf(),
        });
    }

    debug!("Spawning endpoint: {}", image.display());
    let child = Command::new(image)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| LaunchError::ExecFailure {
            path: image.to_path_buf(),
            source,
        })?;

    let pid = child.id();
    info!("Endpoint started with PID: {}", pid);
    Ok(EndpointHandle { child, pid })
}
