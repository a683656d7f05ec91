//! Error types for the tsuna VPN supervisor
//!
//! This module defines all error types used throughout the application,
//! providing consistent error handling and user-friendly error messages.

use thiserror::Error;

/// Main error type for the tsuna application
#[derive(Error, Debug)]
pub enum TsunaError {
    /// Errors related to the profile store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Errors related to keyring operations
    #[error("Keyring error: {0}")]
    Keyring(#[from] KeyringError),

    /// Errors related to VPN connection operations
    #[error("VPN error: {0}")]
    Vpn(#[from] VpnError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Profile store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to load store file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save store file: {path}")]
    SaveFailed { path: String },

    #[error("Store validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// System keyring operation errors
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Keyring service unavailable")]
    ServiceUnavailable,

    #[error("Failed to store credential in keyring")]
    StoreFailed,

    #[error("Failed to retrieve credential from keyring")]
    RetrieveFailed,

    #[error("Failed to delete credential from keyring")]
    DeleteFailed,
}

/// VPN supervision errors
///
/// Covers precondition failures (rejected before any process exists),
/// protocol failures classified from vpncli output, abnormal process
/// termination, and cancellation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VpnError {
    #[error("Operation not allowed while {current}")]
    InvalidState { current: String },

    #[error("No connection profile with id {id}")]
    ProfileNotFound { id: String },

    #[error("No stored password for profile {id}")]
    CredentialMissing { id: String },

    #[error("VPN client binary path is not valid: {path}")]
    InvalidBinaryPath { path: String },

    #[error("Connect attempt was interrupted")]
    Interrupted,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("The VPN client GUI is already running; quit it from the task tray and retry")]
    ClientAlreadyRunning,

    #[error("VPN client error: {message}")]
    ClientError { message: String },

    #[error("VPN client exited unexpectedly (code: {code:?})")]
    UnexpectedExit { code: Option<i32> },

    #[error("Disconnect command exited with code {code:?}")]
    NonZeroExit { code: Option<i32> },

    #[error("Failed to spawn VPN client process: {reason}")]
    SpawnFailure { reason: String },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, TsunaError>;
