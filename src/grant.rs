//! File-capability grant for the endpoint image.
//!
//! The endpoint must create and drive a TUN interface, which requires
//! `CAP_NET_ADMIN`. Rather than running it as root, we attach the capability
//! to the executable image itself (`setcap cap_net_admin=eip`), so the
//! launched process carries exactly that one privilege.
//!
//! The grant lives in the image's security xattrs: it persists across runs
//! and re-applying it is idempotent, so `grant` is safe to call on every
//! invocation.
//!
//! # Requirements
//!
//! - `CAP_SETFCAP` (or root) in the invoking context
//! - `setcap` available in PATH (libcap2-bin)

use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// Capability flags applied to the endpoint image.
pub const NET_ADMIN_FLAGS: &str = "cap_net_admin=eip";

/// Errors that can occur while granting file capabilities.
#[derive(Debug, Error)]
pub enum GrantError {
    /// The image path does not resolve to a regular file.
    #[error("Endpoint image not found or not a regular file: {path}")]
    ImageNotFound {
        /// The path that was requested.
        path: PathBuf,
    },

    /// The invoking context cannot modify file capabilities.
    #[error("Cannot modify file capabilities: invoking context lacks CAP_SETFCAP")]
    InsufficientAuthority,

    /// The `setcap` binary is not installed.
    #[error("setcap not found. Install with: apt install libcap2-bin")]
    SetcapUnavailable,

    /// The OS failed to run `setcap` at all.
    #[error("Failed to run setcap: {source}")]
    CommandFailed {
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// `setcap` ran but rejected the grant.
    #[error("setcap rejected the grant: {stderr}")]
    Rejected {
        /// Standard error output from setcap.
        stderr: String,
    },
}

/// Apply `cap_net_admin=eip` to the endpoint image.
///
/// Idempotent: granting an image that already carries the capability
/// succeeds and rewrites the same xattr.
pub fn grant(image: &Path) -> Result<(), GrantError> {
    if !image.is_file() {
        return Err(GrantError::ImageNotFound {
            path: image.to_path_buf(),
        });
    }

    // Pre-check before shelling out; the stderr classification below still
    // catches a privilege drop racing this probe.
    if !has_setfcap() {
        return Err(GrantError::InsufficientAuthority);
    }

    debug!("Running: setcap {} {}", NET_ADMIN_FLAGS, image.display());
    let output = Command::new("setcap")
        .arg(NET_ADMIN_FLAGS)
        .arg(image)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GrantError::SetcapUnavailable
            } else {
                GrantError::CommandFailed { source: e }
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if authority_denied(&stderr) {
            return Err(GrantError::InsufficientAuthority);
        }
        return Err(GrantError::Rejected { stderr });
    }

    info!("Applied {} to {}", NET_ADMIN_FLAGS, image.display());
    Ok(())
}

/// Check whether the current process holds `CAP_SETFCAP`.
fn has_setfcap() -> bool {
    caps::has_cap(
        None,
        caps::CapSet::Effective,
        caps::Capability::CAP_SETFCAP,
    )
    .unwrap_or(false)
}

/// Classify a `setcap` stderr line as an authority failure.
fn authority_denied(stderr: &str) -> bool {
    stderr.contains("not permitted") || stderr.contains("Permission denied")
}
