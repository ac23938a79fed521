//! Top-level error type and exit-code mapping.
//!
//! Each failure class maps to its own non-zero exit code so a unit file or
//! wrapper script can tell them apart; a supervised child's own exit code is
//! propagated separately by the orchestrator.

use thiserror::Error;

use crate::grant::GrantError;
use crate::iface::ConfigError;
use crate::launch::LaunchError;
use crate::settings::SettingsError;
use crate::supervisor::SupervisorError;

/// Exit code for settings/bootstrap failures.
pub const EXIT_SETTINGS: u8 = 2;
/// Exit code for capability-grant failures.
pub const EXIT_GRANT: u8 = 10;
/// Exit code for endpoint-launch failures.
pub const EXIT_LAUNCH: u8 = 11;
/// Exit code for interface-configuration failures.
pub const EXIT_CONFIG: u8 = 12;
/// Exit code for supervision failures (including termination delivery).
pub const EXIT_SUPERVISOR: u8 = 13;

/// Any failure of the bootstrap-and-supervision sequence.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Settings loading or validation failed.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Capability grant failed.
    #[error(transparent)]
    Grant(#[from] GrantError),

    /// Endpoint launch failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// Interface configuration failed.
    #[error(transparent)]
    Iface(#[from] ConfigError),

    /// Supervision failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

impl WardenError {
    /// The process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            WardenError::Settings(_) => EXIT_SETTINGS,
            WardenError::Grant(_) => EXIT_GRANT,
            WardenError::Launch(_) => EXIT_LAUNCH,
            WardenError::Iface(_) => EXIT_CONFIG,
            WardenError::Supervisor(_) => EXIT_SUPERVISOR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn failure_classes_map_to_distinct_codes() {
        let errors: Vec<WardenError> = vec![
            SettingsError::InvalidValue {
                field: "interface.name".to_string(),
                message: "empty".to_string(),
            }
            .into(),
            GrantError::InsufficientAuthority.into(),
            LaunchError::ImageNotFound {
                path: PathBuf::from("/x"),
            }
            .into(),
            ConfigError::InterfaceNeverAppeared {
                name: "tun0".to_string(),
                waited: Duration::from_secs(5),
            }
            .into(),
            SupervisorError::RuntimeBuild(std::io::Error::other("x")).into(),
        ];

        let mut codes: Vec<u8> = errors.iter().map(WardenError::exit_code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
