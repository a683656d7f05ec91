//! Credential & profile store
//!
//! Persists named connection profiles and application settings as TOML in
//! the user's configuration directory, and keeps each profile's password
//! in the system keyring (never in the TOML file). The supervisor only
//! consumes the [`ProfileStore`] boundary, so tests can substitute an
//! in-memory implementation.

use crate::error::Result;
use crate::types::VpnPassword;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Use mock keyring in test mode or CI environment
#[cfg(any(test, feature = "mock-keyring"))]
#[path = "keyring_mock.rs"]
pub mod keyring;

// Use real keyring in production
#[cfg(not(any(test, feature = "mock-keyring")))]
pub mod keyring;

pub mod toml_store;

pub use toml_store::TomlStore;

/// A named VPN connection profile
///
/// The password is not part of the record; it lives in the keyring under
/// the profile id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    /// Opaque unique token
    pub id: String,
    /// Display label
    pub name: String,
    /// Address of the VPN endpoint
    pub host: String,
    /// Account name sent to the client
    pub username: String,
}

/// Boundary the supervisor consumes to resolve a connect attempt
pub trait ProfileStore: Send + Sync {
    /// Look up a profile by id
    fn profile_by_id(&self, id: &str) -> Result<Option<ConnectionProfile>>;

    /// Retrieve the password stored for a profile id
    fn password(&self, id: &str) -> Result<Option<VpnPassword>>;

    /// Path of the external VPN client binary
    fn cli_path(&self) -> PathBuf;

    /// Check that a path exists and is executable
    fn validate_cli_path(&self, path: &Path) -> bool;
}

/// Existence plus executable-permission check for the client binary
pub fn is_executable(path: &Path) -> bool {
    use nix::unistd::{access, AccessFlags};

    path.is_file() && access(path, AccessFlags::X_OK).is_ok()
}
