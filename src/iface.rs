//! Virtual interface configuration: bounded existence wait, addressing,
//! activation.
//!
//! The endpoint creates its TUN interface as a side effect of starting, so
//! there is a window after launch where the interface does not exist yet.
//! Addressing it inside that window fails against a nonexistent device, and
//! doing so on a fixed-delay assumption is a race. The configurator instead
//! polls for existence with a bounded timeout, and only then runs the two
//! mutation steps, strictly in order:
//!
//! 1. `ip addr add <address>/<prefix> dev <name>`
//! 2. `ip link set <name> up`
//!
//! # Requirements
//!
//! - `CAP_NET_ADMIN` capability or root access
//! - `ip` command available in PATH

use std::net::Ipv4Addr;
use std::path::Path;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

/// Maximum interface name length (kernel IFNAMSIZ minus the NUL).
pub const MAX_IFACE_NAME_LEN: usize = 15;

/// Errors that can occur while configuring the virtual interface.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Interface name exceeds the kernel limit.
    #[error("Interface name too long (max {MAX_IFACE_NAME_LEN} bytes): {name}")]
    InterfaceNameTooLong {
        /// The offending name.
        name: String,
    },

    /// The interface never appeared within the wait bound.
    #[error("Interface {name} did not appear within {waited:?}")]
    InterfaceNeverAppeared {
        /// The interface that was awaited.
        name: String,
        /// How long the configurator waited.
        waited: Duration,
    },

    /// Address assignment was rejected by the OS.
    #[error("Failed to assign {address}/{prefix_len} to {name}: {stderr}")]
    AddressAssignmentFailed {
        /// The interface name.
        name: String,
        /// The address that was being assigned.
        address: Ipv4Addr,
        /// The prefix length that was being assigned.
        prefix_len: u8,
        /// Standard error output from `ip`.
        stderr: String,
    },

    /// Bringing the interface up was rejected by the OS.
    #[error("Failed to bring {name} up: {stderr}")]
    ActivationFailed {
        /// The interface name.
        name: String,
        /// Standard error output from `ip`.
        stderr: String,
    },

    /// The `ip` command itself could not be run.
    #[error("Failed to run {cmd}: {source}")]
    CommandFailed {
        /// The command line that failed.
        cmd: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Bounds on the wait for interface appearance.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    /// Delay between existence probes.
    pub poll_interval: Duration,
    /// Total time to wait before giving up.
    pub timeout: Duration,
}

impl WaitPolicy {
    /// Create a wait policy from explicit bounds.
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Seam between the configuration sequence and the kernel.
///
/// The production implementation is [`IpRoute2`]; tests drive a fake that
/// controls when the interface appears and records call ordering.
pub trait LinkOps {
    /// Probe whether the interface currently exists.
    fn exists(&mut self, name: &str) -> bool;

    /// Assign an IPv4 address with prefix to the interface.
    fn add_address(
        &mut self,
        name: &str,
        address: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<(), ConfigError>;

    /// Transition the interface to the "up" operational state.
    fn set_up(&mut self, name: &str) -> Result<(), ConfigError>;
}

/// `LinkOps` backed by sysfs probes and the iproute2 `ip` tool.
pub struct IpRoute2;

impl LinkOps for IpRoute2 {
    fn exists(&mut self, name: &str) -> bool {
        Path::new("/sys/class/net").join(name).exists()
    }

    fn add_address(
        &mut self,
        name: &str,
        address: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<(), ConfigError> {
        let cidr = format!("{}/{}", address, prefix_len);
        run_ip(&["addr", "add", &cidr, "dev", name]).map_err(|e| match e {
            IpFailure::Spawn { cmd, source } => ConfigError::CommandFailed { cmd, source },
            IpFailure::Exit { stderr, .. } => ConfigError::AddressAssignmentFailed {
                name: name.to_string(),
                address,
                prefix_len,
                stderr,
            },
        })
    }

    fn set_up(&mut self, name: &str) -> Result<(), ConfigError> {
        run_ip(&["link", "set", name, "up"]).map_err(|e| match e {
            IpFailure::Spawn { cmd, source } => ConfigError::CommandFailed { cmd, source },
            IpFailure::Exit { stderr, .. } => ConfigError::ActivationFailed {
                name: name.to_string(),
                stderr,
            },
        })
    }
}

/// Failure modes of a single `ip` invocation.
enum IpFailure {
    Spawn {
        cmd: String,
        source: std::io::Error,
    },
    Exit {
        stderr: String,
    },
}

/// Run an `ip` command.
fn run_ip(args: &[&str]) -> Result<(), IpFailure> {
    let cmd_str = format!("ip {}", args.join(" "));
    debug!("Running: {}", cmd_str);

    let output = Command::new("ip")
        .args(args)
        .output()
        .map_err(|source| IpFailure::Spawn {
            cmd: cmd_str.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(IpFailure::Exit { stderr });
    }

    Ok(())
}

/// Wait for the interface to exist, then address and activate it.
///
/// Runs after launch, before the supervisor enters RUNNING. The two mutation
/// steps execute strictly in the stated order with no interleaving; neither
/// is issued before an existence probe has succeeded.
pub fn configure(
    link: &mut impl LinkOps,
    name: &str,
    address: Ipv4Addr,
    prefix_len: u8,
    wait: &WaitPolicy,
) -> Result<(), ConfigError> {
    configure_with(link, name, address, prefix_len, wait, std::thread::sleep)
}

/// Core of [`configure`] with an injected sleeper, so the bounded wait can
/// be exercised under a fake clock.
fn configure_with<L, S>(
    link: &mut L,
    name: &str,
    address: Ipv4Addr,
    prefix_len: u8,
    wait: &WaitPolicy,
    mut sleep: S,
) -> Result<(), ConfigError>
where
    L: LinkOps,
    S: FnMut(Duration),
{
    if name.is_empty() || name.len() > MAX_IFACE_NAME_LEN {
        return Err(ConfigError::InterfaceNameTooLong {
            name: name.to_string(),
        });
    }

    let mut waited = Duration::ZERO;
    loop {
        if link.exists(name) {
            debug!("Interface {} appeared after {:?}", name, waited);
            break;
        }
        if waited >= wait.timeout {
            return Err(ConfigError::InterfaceNeverAppeared {
                name: name.to_string(),
                waited,
            });
        }
        let step = wait.poll_interval.min(wait.timeout - waited);
        sleep(step);
        waited += step;
    }

    link.add_address(name, address, prefix_len)?;
    link.set_up(name)?;

    info!("Interface {} up with {}/{}", name, address, prefix_len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fake link layer: the interface appears after a fixed number of
    /// probes, and every call is recorded in order.
    struct FakeLink {
        appear_after: u32,
        probes: u32,
        fail_addr: bool,
        fail_up: bool,
        calls: Vec<String>,
    }

    impl FakeLink {
        fn appearing_after(appear_after: u32) -> Self {
            Self {
                appear_after,
                probes: 0,
                fail_addr: false,
                fail_up: false,
                calls: Vec::new(),
            }
        }

        fn never_appearing() -> Self {
            Self::appearing_after(u32::MAX)
        }
    }

    impl LinkOps for FakeLink {
        fn exists(&mut self, _name: &str) -> bool {
            let up = self.probes >= self.appear_after;
            self.probes += 1;
            self.calls.push(format!("exists:{}", up));
            up
        }

        fn add_address(
            &mut self,
            name: &str,
            address: Ipv4Addr,
            prefix_len: u8,
        ) -> Result<(), ConfigError> {
            self.calls.push("addr".to_string());
            if self.fail_addr {
                return Err(ConfigError::AddressAssignmentFailed {
                    name: name.to_string(),
                    address,
                    prefix_len,
                    stderr: "injected".to_string(),
                });
            }
            Ok(())
        }

        fn set_up(&mut self, name: &str) -> Result<(), ConfigError> {
            self.calls.push("up".to_string());
            if self.fail_up {
                return Err(ConfigError::ActivationFailed {
                    name: name.to_string(),
                    stderr: "injected".to_string(),
                });
            }
            Ok(())
        }
    }

    const ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 0, 1);

    fn policy_ms(interval: u64, timeout: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(interval),
            Duration::from_millis(timeout),
        )
    }

    #[test]
    fn interface_present_immediately_is_configured_without_sleeping() {
        let mut link = FakeLink::appearing_after(0);
        let mut sleeps = Vec::new();
        configure_with(&mut link, "tun0", ADDR, 24, &policy_ms(100, 5000), |d| {
            sleeps.push(d)
        })
        .unwrap();

        assert!(sleeps.is_empty());
        assert_eq!(link.calls, vec!["exists:true", "addr", "up"]);
    }

    #[test]
    fn mutations_wait_for_the_interface_to_appear() {
        let mut link = FakeLink::appearing_after(3);
        let mut sleeps = Vec::new();
        configure_with(&mut link, "tun0", ADDR, 24, &policy_ms(100, 5000), |d| {
            sleeps.push(d)
        })
        .unwrap();

        assert_eq!(sleeps.len(), 3);
        assert_eq!(
            link.calls,
            vec![
                "exists:false",
                "exists:false",
                "exists:false",
                "exists:true",
                "addr",
                "up"
            ]
        );
    }

    #[test]
    fn wait_times_out_cleanly_when_interface_never_appears() {
        let mut link = FakeLink::never_appearing();
        let mut slept = Duration::ZERO;
        let err = configure_with(&mut link, "tun0", ADDR, 24, &policy_ms(100, 500), |d| {
            slept += d
        })
        .unwrap_err();

        match err {
            ConfigError::InterfaceNeverAppeared { name, waited } => {
                assert_eq!(name, "tun0");
                assert_eq!(waited, Duration::from_millis(500));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(slept, Duration::from_millis(500));
        // No mutation was ever attempted against the missing interface.
        assert!(!link.calls.iter().any(|c| c == "addr" || c == "up"));
    }

    #[test]
    fn final_partial_interval_is_clamped_to_the_timeout() {
        let mut link = FakeLink::never_appearing();
        let mut sleeps = Vec::new();
        let _ = configure_with(&mut link, "tun0", ADDR, 24, &policy_ms(300, 500), |d| {
            sleeps.push(d)
        });

        assert_eq!(
            sleeps,
            vec![Duration::from_millis(300), Duration::from_millis(200)]
        );
    }

    #[test]
    fn address_failure_stops_before_activation() {
        let mut link = FakeLink::appearing_after(0);
        link.fail_addr = true;
        let err =
            configure_with(&mut link, "tun0", ADDR, 24, &policy_ms(100, 500), |_| {}).unwrap_err();

        assert!(matches!(err, ConfigError::AddressAssignmentFailed { .. }));
        assert!(!link.calls.iter().any(|c| c == "up"));
    }

    #[test]
    fn activation_failure_is_reported() {
        let mut link = FakeLink::appearing_after(0);
        link.fail_up = true;
        let err =
            configure_with(&mut link, "tun0", ADDR, 24, &policy_ms(100, 500), |_| {}).unwrap_err();
        assert!(matches!(err, ConfigError::ActivationFailed { .. }));
    }

    #[test]
    fn overlong_name_is_rejected_before_any_probe() {
        let mut link = FakeLink::appearing_after(0);
        let err = configure_with(
            &mut link,
            "interface-name-way-too-long",
            ADDR,
            24,
            &policy_ms(100, 500),
            |_| {},
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::InterfaceNameTooLong { .. }));
        assert!(link.calls.is_empty());
    }

    #[test]
    fn sysfs_probe_sees_loopback_but_not_phantom_devices() {
        let mut link = IpRoute2;
        assert!(link.exists("lo"));
        assert!(!link.exists("definitely-missing-dev0"));
    }
}
