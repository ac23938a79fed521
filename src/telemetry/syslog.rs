//! Syslog integration for audit logging.
//!
//! All audit events are logged to syslog with the `TUN_WARDEN` tag for SIEM
//! integration. Audit logging is best-effort: a host without a reachable
//! syslog daemon gets a null logger and a warning, never an aborted run.

use std::sync::{Mutex, OnceLock};

use syslog::{Facility, Formatter3164};
use tracing::{debug, error, warn};

use super::error::TelemetryError;
use super::events::AuditEvent;

/// Syslog tag for all audit events.
pub const SYSLOG_TAG: &str = "TUN_WARDEN";

/// Global audit logger instance.
static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Audit logger that writes structured JSON events to syslog.
///
/// Uses interior mutability (Mutex) so events can be logged from shared
/// references, which is necessary since the logger lives in a global
/// OnceLock.
pub struct AuditLogger {
    /// Syslog writer protected by a mutex for interior mutability.
    /// None indicates a null logger (for testing, or unreachable syslog).
    writer: Option<Mutex<syslog::Logger<syslog::LoggerBackend, Formatter3164>>>,
}

impl AuditLogger {
    /// Create a new audit logger connected to the local syslog daemon.
    pub fn new() -> Result<Self, TelemetryError> {
        let formatter = Formatter3164 {
            facility: Facility::LOG_DAEMON,
            hostname: None,
            process: SYSLOG_TAG.to_string(),
            pid: std::process::id(),
        };

        let writer = syslog::unix(formatter)
            .map_err(|e| TelemetryError::SyslogConnection(e.to_string()))?;

        debug!("Connected to syslog with tag '{}'", SYSLOG_TAG);
        Ok(Self {
            writer: Some(Mutex::new(writer)),
        })
    }

    /// Create a null audit logger that discards all events.
    pub fn new_null() -> Self {
        Self { writer: None }
    }

    /// Log an audit event to syslog.
    ///
    /// The event is serialized to JSON with an ISO8601 timestamp. If this is
    /// a null logger, the event is silently discarded. Serialization or
    /// transport failures are reported via tracing and otherwise swallowed:
    /// audit trouble must never take down the supervised endpoint.
    pub fn log(&self, event: AuditEvent) {
        let Some(writer) = &self.writer else {
            return;
        };

        let timestamped = event.with_timestamp();
        match serde_json::to_string(&timestamped) {
            Ok(json) => {
                match writer.lock() {
                    Ok(mut writer) => {
                        if let Err(e) = writer.info(&json) {
                            error!("Failed to write to syslog: {}", e);
                        }
                    }
                    Err(e) => {
                        error!("Failed to acquire syslog writer lock: {}", e);
                    }
                }
                debug!("Logged audit event: {}", json);
            }
            Err(e) => {
                error!("Failed to serialize audit event: {}", e);
            }
        }
    }

    /// Check if this is a null logger.
    pub fn is_null(&self) -> bool {
        self.writer.is_none()
    }
}

/// Initialize the global audit logger.
///
/// Falls back to a null logger (with a warning) when syslog is unreachable.
/// Returns `AlreadyInitialized` if called twice.
pub fn init_logger() -> Result<(), TelemetryError> {
    let logger = match AuditLogger::new() {
        Ok(logger) => logger,
        Err(e) => {
            warn!("Audit logging unavailable: {}", e);
            AuditLogger::new_null()
        }
    };

    AUDIT_LOGGER
        .set(logger)
        .map_err(|_| TelemetryError::AlreadyInitialized)
}

/// Get the global audit logger.
///
/// Returns a null logger if `init_logger` was never called, so library
/// consumers and tests can log unconditionally.
pub fn audit() -> &'static AuditLogger {
    AUDIT_LOGGER.get_or_init(AuditLogger::new_null)
}
