//! Status and log event broadcasting
//!
//! The supervisor has no knowledge of the surface that displays its
//! events: callers subscribe and get their own receiver, and dropping a
//! receiver is the unsubscribe. Sends are best-effort; a slow or absent
//! subscriber never blocks process IO handling.

use crate::vpn::ConnectionStatus;
use chrono::{DateTime, Local};
use tokio::sync::broadcast;

/// A single timestamped supervisor log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    fn new(message: String) -> Self {
        Self {
            timestamp: Local::now(),
            message,
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Broadcast fan-out for status changes and log lines
#[derive(Debug, Clone)]
pub struct EventBus {
    status_tx: broadcast::Sender<ConnectionStatus>,
    log_tx: broadcast::Sender<LogEntry>,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        let (status_tx, _) = broadcast::channel(64);
        let (log_tx, _) = broadcast::channel(256);
        Self { status_tx, log_tx }
    }

    /// Subscribe to status change events
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    /// Subscribe to log events
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.log_tx.subscribe()
    }

    /// Push a status change to all subscribers (best-effort)
    pub fn emit_status(&self, status: ConnectionStatus) {
        let _ = self.status_tx.send(status);
    }

    /// Push a timestamped log line to all subscribers (best-effort)
    pub fn emit_log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("{}", message);
        let _ = self.log_tx.send(LogEntry::new(message));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
