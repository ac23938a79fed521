//! Telemetry and audit logging for tun-warden.
//!
//! Two separate concerns:
//!
//! - **Audit logging** (syslog): lifecycle events go to syslog as JSON with
//!   the `TUN_WARDEN` tag, never to stdout/stderr.
//! - **Debug logging** (`tracing`): operational logs go to stderr, filtered
//!   by `RUST_LOG`.
//!
//! # Usage
//!
//! ```ignore
//! use tun_warden::telemetry::{self, AuditEvent};
//!
//! telemetry::init_logger()?;
//! telemetry::audit().log(AuditEvent::GrantApplied {
//!     image: "/usr/local/bin/tun-endpoint".to_string(),
//! });
//! ```
//!
//! # Event Format
//!
//! ```json
//! {"ts":"2026-08-07T14:32:01Z","event":"endpoint_launched","image":"/usr/local/bin/tun-endpoint","pid":12345}
//! ```

mod error;
mod events;
mod syslog;

pub use error::TelemetryError;
pub use events::{AuditEvent, TimestampedEvent};
pub use syslog::{audit, init_logger, AuditLogger, SYSLOG_TAG};
