//! Keyring operations for secure credential storage
//!
//! Uses the system keyring (GNOME Keyring on Linux) to store and retrieve
//! VPN passwords, keyed by the owning profile's id.

use crate::error::{KeyringError, TsunaError};
use crate::types::VpnPassword;
use keyring::Entry;

/// Service name under which passwords are stored
pub const KEYRING_SERVICE: &str = "tsuna-vpn";

/// Store a profile's password in the system keyring
pub fn store_password(profile_id: &str, password: &VpnPassword) -> Result<(), TsunaError> {
    let entry = Entry::new(KEYRING_SERVICE, profile_id)
        .map_err(|_| TsunaError::Keyring(KeyringError::ServiceUnavailable))?;

    entry
        .set_password(password.expose())
        .map_err(|_| TsunaError::Keyring(KeyringError::StoreFailed))?;

    Ok(())
}

/// Retrieve a profile's password from the system keyring
///
/// Returns None if no password is stored for the profile.
pub fn retrieve_password(profile_id: &str) -> Result<Option<VpnPassword>, TsunaError> {
    let entry = Entry::new(KEYRING_SERVICE, profile_id)
        .map_err(|_| TsunaError::Keyring(KeyringError::ServiceUnavailable))?;

    match entry.get_password() {
        Ok(password) => Ok(Some(VpnPassword::new(password))),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(_) => Err(TsunaError::Keyring(KeyringError::RetrieveFailed)),
    }
}

/// Delete a profile's password from the keyring
///
/// Deleting a password that was never stored is not an error.
pub fn delete_password(profile_id: &str) -> Result<(), TsunaError> {
    let entry = Entry::new(KEYRING_SERVICE, profile_id)
        .map_err(|_| TsunaError::Keyring(KeyringError::ServiceUnavailable))?;

    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(_) => Err(TsunaError::Keyring(KeyringError::DeleteFailed)),
    }
}
