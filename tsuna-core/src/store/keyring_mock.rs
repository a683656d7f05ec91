//! Mock keyring implementation for testing
//!
//! Provides an in-memory keyring that doesn't require system keyring
//! access. Used in CI environments and for testing.

use crate::error::{KeyringError, TsunaError};
use crate::types::VpnPassword;
use std::collections::HashMap;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref MOCK_KEYRING: Mutex<HashMap<String, String>> = Mutex::new(HashMap::new());
}

/// Service name under which passwords are stored
pub const KEYRING_SERVICE: &str = "tsuna-vpn";

fn make_key(profile_id: &str) -> String {
    format!("{}:{}", KEYRING_SERVICE, profile_id)
}

/// Store a profile's password in the mock keyring
pub fn store_password(profile_id: &str, password: &VpnPassword) -> Result<(), TsunaError> {
    let mut entries = MOCK_KEYRING
        .lock()
        .map_err(|_| TsunaError::Keyring(KeyringError::StoreFailed))?;
    entries.insert(make_key(profile_id), password.expose().to_string());
    Ok(())
}

/// Retrieve a profile's password from the mock keyring
pub fn retrieve_password(profile_id: &str) -> Result<Option<VpnPassword>, TsunaError> {
    let entries = MOCK_KEYRING
        .lock()
        .map_err(|_| TsunaError::Keyring(KeyringError::RetrieveFailed))?;
    Ok(entries
        .get(&make_key(profile_id))
        .map(|p| VpnPassword::new(p.clone())))
}

/// Delete a profile's password from the mock keyring
pub fn delete_password(profile_id: &str) -> Result<(), TsunaError> {
    let mut entries = MOCK_KEYRING
        .lock()
        .map_err(|_| TsunaError::Keyring(KeyringError::DeleteFailed))?;
    entries.remove(&make_key(profile_id));
    Ok(())
}
