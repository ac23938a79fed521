//! tun-warden: capability-scoped bootstrap and supervision for a user-space
//! TUN endpoint.
//!
//! A user-space network stack talks to the kernel through a TUN device, and
//! creating one needs `CAP_NET_ADMIN`. tun-warden keeps the stack itself
//! unprivileged: it grants that single capability to the endpoint's
//! executable image, launches the endpoint, waits for the TUN interface the
//! endpoint creates, addresses and activates it, and then supervises the
//! endpoint until a termination signal or its own exit.
//!
//! # Architecture
//!
//! - **Grant**: `cap_net_admin=eip` file capability on the endpoint image
//! - **Launch**: endpoint spawned as an independent child with an owned handle
//! - **Iface**: bounded wait for interface appearance, then address + up
//! - **Supervisor**: one multiplexed wait over signals and child exit
//! - **Settings**: hierarchical TOML configuration, no command-line flags
//! - **Telemetry**: structured syslog audit trail of the lifecycle

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod grant;
pub mod iface;
pub mod launch;
pub mod orchestrator;
pub mod settings;
pub mod supervisor;
pub mod telemetry;
