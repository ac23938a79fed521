//! Runtime settings for tun-warden.
//!
//! The external interface is deliberately flag-free: the endpoint image,
//! interface name and address are constants for a given deployment. They are
//! set through TOML files merged in order (embedded defaults, then
//! `/etc/tun-warden/config.toml`, then `~/.config/tun-warden/config.toml`,
//! then the file named by `TUN_WARDEN_CONFIG`):
//!
//! ```toml
//! [endpoint]
//! image = "/usr/local/bin/tun-endpoint"
//!
//! [interface]
//! name = "tun0"
//! address = "192.168.0.1"
//! prefix_len = 24
//!
//! [wait]
//! poll_interval_ms = 100
//! timeout_ms = 5000
//! ```

mod error;
mod loader;
mod schema;

pub use error::SettingsError;
pub use loader::{SettingsLoader, CONFIG_PATH_ENV, SYSTEM_CONFIG_PATH};
pub use schema::{EndpointSettings, InterfaceSettings, Settings, WaitSettings};
