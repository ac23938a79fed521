//! Settings schema with compiled-in deployment defaults.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::Deserialize;

use super::error::SettingsError;
use crate::iface::MAX_IFACE_NAME_LEN;

/// Complete, validated runtime settings.
///
/// Defaults describe the stock deployment: a `tun0` endpoint addressed
/// `192.168.0.1/24`, with a five second bound on interface appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Endpoint process settings.
    pub endpoint: EndpointSettings,
    /// Virtual interface settings.
    pub interface: InterfaceSettings,
    /// Interface-appearance wait settings.
    pub wait: WaitSettings,
}

/// Settings for the supervised endpoint process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSettings {
    /// Executable image to grant, launch and supervise. Absolute path,
    /// relative path, or bare name resolved through `PATH`.
    pub image: String,
}

/// Settings for the virtual interface the endpoint creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceSettings {
    /// Kernel interface name (max 15 bytes).
    pub name: String,
    /// IPv4 address to assign.
    pub address: Ipv4Addr,
    /// Subnet prefix length.
    pub prefix_len: u8,
}

/// Bounds on the post-launch wait for the interface to appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSettings {
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Total timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings {
                image: "/usr/local/bin/tun-endpoint".to_string(),
            },
            interface: InterfaceSettings {
                name: "tun0".to_string(),
                address: Ipv4Addr::new(192, 168, 0, 1),
                prefix_len: 24,
            },
            wait: WaitSettings {
                poll_interval_ms: 100,
                timeout_ms: 5000,
            },
        }
    }
}

impl WaitSettings {
    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Total timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    /// Apply a partial overlay loaded from one settings file.
    ///
    /// Scalars present in the patch override; absent ones are kept.
    pub(crate) fn apply(&mut self, patch: SettingsPatch) {
        if let Some(endpoint) = patch.endpoint {
            if let Some(image) = endpoint.image {
                self.endpoint.image = image;
            }
        }
        if let Some(interface) = patch.interface {
            if let Some(name) = interface.name {
                self.interface.name = name;
            }
            if let Some(address) = interface.address {
                self.interface.address = address;
            }
            if let Some(prefix_len) = interface.prefix_len {
                self.interface.prefix_len = prefix_len;
            }
        }
        if let Some(wait) = patch.wait {
            if let Some(poll_interval_ms) = wait.poll_interval_ms {
                self.wait.poll_interval_ms = poll_interval_ms;
            }
            if let Some(timeout_ms) = wait.timeout_ms {
                self.wait.timeout_ms = timeout_ms;
            }
        }
    }

    /// Validate the merged settings. Fail fast with a clear message.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.endpoint.image.is_empty() {
            return Err(SettingsError::InvalidValue {
                field: "endpoint.image".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.interface.name.is_empty() {
            return Err(SettingsError::InvalidValue {
                field: "interface.name".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.interface.name.len() > MAX_IFACE_NAME_LEN {
            return Err(SettingsError::InvalidValue {
                field: "interface.name".to_string(),
                message: format!(
                    "'{}' exceeds the kernel limit of {} bytes",
                    self.interface.name, MAX_IFACE_NAME_LEN
                ),
            });
        }
        if self.interface.prefix_len > 32 {
            return Err(SettingsError::InvalidValue {
                field: "interface.prefix_len".to_string(),
                message: format!("{} exceeds 32", self.interface.prefix_len),
            });
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(SettingsError::InvalidValue {
                field: "wait.poll_interval_ms".to_string(),
                message: "must be non-zero".to_string(),
            });
        }
        if self.wait.timeout_ms < self.wait.poll_interval_ms {
            return Err(SettingsError::InvalidValue {
                field: "wait.timeout_ms".to_string(),
                message: "must be at least one poll interval".to_string(),
            });
        }
        Ok(())
    }
}

/// Partial settings as read from a single TOML file.
///
/// All fields optional so a file can set only what it cares about.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct SettingsPatch {
    pub(crate) endpoint: Option<EndpointPatch>,
    pub(crate) interface: Option<InterfacePatch>,
    pub(crate) wait: Option<WaitPatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EndpointPatch {
    pub(crate) image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct InterfacePatch {
    pub(crate) name: Option<String>,
    pub(crate) address: Option<Ipv4Addr>,
    pub(crate) prefix_len: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct WaitPatch {
    pub(crate) poll_interval_ms: Option<u64>,
    pub(crate) timeout_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.interface.name, "tun0");
        assert_eq!(settings.interface.address, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(settings.interface.prefix_len, 24);
    }

    #[test]
    fn patch_overrides_only_named_fields() {
        let mut settings = Settings::default();
        let patch: SettingsPatch = toml::from_str(
            r#"
            [interface]
            name = "tun7"
            "#,
        )
        .unwrap();
        settings.apply(patch);

        assert_eq!(settings.interface.name, "tun7");
        // Untouched fields keep their defaults.
        assert_eq!(settings.interface.prefix_len, 24);
        assert_eq!(settings.endpoint.image, "/usr/local/bin/tun-endpoint");
    }

    #[test]
    fn full_patch_round_trips() {
        let mut settings = Settings::default();
        let patch: SettingsPatch = toml::from_str(
            r#"
            [endpoint]
            image = "/opt/stack/rustcp"

            [interface]
            name = "tcpstack0"
            address = "10.0.7.1"
            prefix_len = 16

            [wait]
            poll_interval_ms = 50
            timeout_ms = 2000
            "#,
        )
        .unwrap();
        settings.apply(patch);
        settings.validate().unwrap();

        assert_eq!(settings.endpoint.image, "/opt/stack/rustcp");
        assert_eq!(settings.interface.address, Ipv4Addr::new(10, 0, 7, 1));
        assert_eq!(settings.wait.timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<SettingsPatch, _> = toml::from_str(
            r#"
            [interface]
            nmae = "tun0"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn overlong_interface_name_is_rejected() {
        let mut settings = Settings::default();
        settings.interface.name = "interface-name-way-too-long".to_string();
        let err = settings.validate().unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue { ref field, .. } if field == "interface.name"));
    }

    #[test]
    fn out_of_range_prefix_is_rejected() {
        let mut settings = Settings::default();
        settings.interface.prefix_len = 33;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut settings = Settings::default();
        settings.wait.poll_interval_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn timeout_shorter_than_interval_is_rejected() {
        let mut settings = Settings::default();
        settings.wait.poll_interval_ms = 500;
        settings.wait.timeout_ms = 100;
        assert!(settings.validate().is_err());
    }
}
