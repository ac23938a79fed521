//! Settings loading with hierarchy merging.
//!
//! Settings are loaded from multiple sources and merged in order:
//!
//! 1. Embedded defaults (compiled into the binary)
//! 2. System settings: `/etc/tun-warden/config.toml`
//! 3. User settings: `~/.config/tun-warden/config.toml`
//! 4. File named by the `TUN_WARDEN_CONFIG` environment variable
//!
//! Scalars are **overridden** by later sources. Missing system/user files
//! are not errors and are simply skipped; a missing `TUN_WARDEN_CONFIG`
//! file *is* an error, since it was explicitly requested. Invalid TOML is
//! always an error (fail fast with a clear message).
//!
//! There are no command-line flags: the supervised deployment is fixed per
//! host, and these files are the only knobs.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::SettingsError;
use super::schema::{Settings, SettingsPatch};

/// System-wide settings path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tun-warden/config.toml";

/// User settings directory name (under the XDG config dir).
pub const USER_CONFIG_DIR: &str = "tun-warden";

/// User settings filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Environment variable naming an additional settings file.
pub const CONFIG_PATH_ENV: &str = "TUN_WARDEN_CONFIG";

/// Settings loader with support for hierarchy merging.
pub struct SettingsLoader {
    /// Path to system-wide settings.
    system_path: PathBuf,
    /// Path to user settings.
    user_path: PathBuf,
    /// Explicitly requested settings file (from `TUN_WARDEN_CONFIG`).
    extra_path: Option<PathBuf>,
}

impl SettingsLoader {
    /// Create a new loader with the default path hierarchy.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
            extra_path: std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
        }
    }

    /// Create a loader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(
        system_path: PathBuf,
        user_path: PathBuf,
        extra_path: Option<PathBuf>,
    ) -> Self {
        Self {
            system_path,
            user_path,
            extra_path,
        }
    }

    /// Load, merge and validate settings from all sources.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::default();
        debug!("Loaded embedded default settings");

        if let Some(patch) = self.load_file(&self.system_path)? {
            settings.apply(patch);
            debug!("Loaded system settings from {:?}", self.system_path);
        } else {
            debug!("No system settings at {:?}", self.system_path);
        }

        if let Some(patch) = self.load_file(&self.user_path)? {
            settings.apply(patch);
            debug!("Loaded user settings from {:?}", self.user_path);
        } else {
            debug!("No user settings at {:?}", self.user_path);
        }

        if let Some(extra) = &self.extra_path {
            // Explicitly requested, so a missing file is an error.
            match self.load_file(extra)? {
                Some(patch) => {
                    settings.apply(patch);
                    debug!("Loaded settings from {}={:?}", CONFIG_PATH_ENV, extra);
                }
                None => {
                    return Err(SettingsError::ReadError {
                        path: extra.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "file named by TUN_WARDEN_CONFIG does not exist",
                        ),
                    });
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Load a single settings file, returning `None` if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<SettingsPatch>, SettingsError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SettingsError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        let patch = toml::from_str(&content).map_err(|e| SettingsError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Some(patch))
    }
}

impl Default for SettingsLoader {
    fn default() -> Self {
        Self::new()
    }
}
