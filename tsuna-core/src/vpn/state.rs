//! VPN connection status tracking
//!
//! Defines the status values of the connection lifecycle and a
//! thread-safe wrapper for the single process-wide status slot.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// VPN connection status
///
/// Exactly one value holds at any instant. Only the supervisor mutates it;
/// any caller may read a snapshot at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Not connected
    Disconnected,

    /// Attempting to establish a connection
    Connecting,

    /// Tunnel established
    Connected,

    /// Disconnect command running
    Disconnecting,

    /// A connect or disconnect failed; carries a display-ready reason
    Error(String),
}

impl Default for ConnectionStatus {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl ConnectionStatus {
    /// True if a new connect attempt may start from this status
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Error(_))
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
            ConnectionStatus::Connecting => write!(f, "connecting"),
            ConnectionStatus::Connected => write!(f, "connected"),
            ConnectionStatus::Disconnecting => write!(f, "disconnecting"),
            ConnectionStatus::Error(msg) => write!(f, "error: {}", msg),
        }
    }
}

/// Thread-safe connection status wrapper
#[derive(Debug, Clone, Default)]
pub struct SharedStatus(Arc<Mutex<ConnectionStatus>>);

impl SharedStatus {
    /// Create a new shared status starting at Disconnected
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current status
    pub fn get(&self) -> ConnectionStatus {
        self.0.lock().unwrap().clone()
    }

    /// Set the status
    pub fn set(&self, status: ConnectionStatus) {
        *self.0.lock().unwrap() = status;
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        matches!(self.get(), ConnectionStatus::Connected)
    }

    /// Check if a connect attempt is in flight
    pub fn is_connecting(&self) -> bool {
        matches!(self.get(), ConnectionStatus::Connecting)
    }

    /// Check if in error state
    pub fn is_error(&self) -> bool {
        matches!(self.get(), ConnectionStatus::Error(_))
    }

    /// Atomically claim the connecting state
    ///
    /// Succeeds only from Disconnected or Error; returns the current
    /// status otherwise so the caller can report it.
    pub fn try_begin_connect(&self) -> std::result::Result<(), ConnectionStatus> {
        let mut guard = self.0.lock().unwrap();
        if guard.can_connect() {
            *guard = ConnectionStatus::Connecting;
            Ok(())
        } else {
            Err(guard.clone())
        }
    }

    /// Atomically claim the disconnecting state
    ///
    /// Succeeds only from Connected; returns the current status otherwise.
    pub fn try_begin_disconnect(&self) -> std::result::Result<(), ConnectionStatus> {
        let mut guard = self.0.lock().unwrap();
        if matches!(*guard, ConnectionStatus::Connected) {
            *guard = ConnectionStatus::Disconnecting;
            Ok(())
        } else {
            Err(guard.clone())
        }
    }
}
