//! Audit event types for structured logging.
//!
//! These events are logged to syslog with the `TUN_WARDEN` tag so a SIEM can
//! reconstruct the full bootstrap-and-supervision timeline of each run.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Audit events for the supervision lifecycle.
///
/// Each variant represents a step of the bootstrap sequence or a lifecycle
/// transition worth an audit trail entry.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Supervisor invocation started.
    SessionStart {
        /// Username of the invoking context.
        user: String,
        /// Endpoint image being supervised.
        image: String,
        /// Process ID of the supervisor itself.
        pid: u32,
    },

    /// `cap_net_admin` file capability applied to the endpoint image.
    GrantApplied {
        /// Endpoint image the grant was applied to.
        image: String,
    },

    /// Endpoint process launched.
    EndpointLaunched {
        /// Endpoint image that was launched.
        image: String,
        /// Process ID of the endpoint.
        pid: u32,
    },

    /// Virtual interface addressed and activated.
    InterfaceUp {
        /// Interface name.
        name: String,
        /// Assigned address with prefix, e.g. `192.168.0.1/24`.
        address: String,
    },

    /// Termination request forwarded to the endpoint.
    ShutdownForwarded {
        /// Signal name, e.g. `SIGTERM`.
        signal: String,
        /// Process ID of the endpoint.
        pid: u32,
    },

    /// Endpoint process reaped.
    EndpointExited {
        /// Process ID of the endpoint.
        pid: u32,
        /// Exit code, if it exited normally.
        code: Option<i32>,
    },

    /// Supervisor invocation ended.
    SessionEnd {
        /// Username of the invoking context.
        user: String,
        /// Exit code the supervisor is about to return.
        exit_code: i32,
    },
}

impl AuditEvent {
    /// Stamp the event with the current UTC time for serialization.
    pub fn with_timestamp(self) -> TimestampedEvent {
        TimestampedEvent {
            ts: Utc::now(),
            event: self,
        }
    }
}

/// An audit event paired with its emission timestamp.
#[derive(Debug, Clone, Serialize)]
pub struct TimestampedEvent {
    /// ISO8601 emission time.
    pub ts: DateTime<Utc>,
    /// The event itself, flattened into the same JSON object.
    #[serde(flatten)]
    pub event: AuditEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tags() {
        let event = AuditEvent::EndpointLaunched {
            image: "/usr/local/bin/tun-endpoint".to_string(),
            pid: 4242,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"endpoint_launched\""));
        assert!(json.contains("\"pid\":4242"));
    }

    #[test]
    fn timestamped_event_flattens_fields() {
        let json = serde_json::to_string(
            &AuditEvent::SessionEnd {
                user: "operator".to_string(),
                exit_code: 0,
            }
            .with_timestamp(),
        )
        .unwrap();
        assert!(json.contains("\"ts\":"));
        assert!(json.contains("\"event\":\"session_end\""));
        assert!(json.contains("\"exit_code\":0"));
    }

    #[test]
    fn optional_exit_code_serializes_as_null() {
        let json = serde_json::to_string(&AuditEvent::EndpointExited {
            pid: 1,
            code: None,
        })
        .unwrap();
        assert!(json.contains("\"code\":null"));
    }
}
