//! Type wrappers for secure data handling
//!
//! Sensitive values are wrapped with the secrecy crate so they are never
//! accidentally exposed in logs or debug output.

use secrecy::{ExposeSecret, Secret};

/// Wrapper for a VPN account password retrieved from the keyring
///
/// The password lives only for the duration of a single connect attempt
/// and is exposed exactly once, when it is written to the client's stdin.
#[derive(Clone, Debug)]
pub struct VpnPassword(Secret<String>);

impl VpnPassword {
    /// Create a new VpnPassword from a raw string
    pub fn new(password: String) -> Self {
        Self(Secret::new(password))
    }

    /// Expose the password value (use with caution!)
    ///
    /// This should only be called when writing the credential sequence to
    /// the VPN client process.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<String> for VpnPassword {
    fn from(password: String) -> Self {
        Self::new(password)
    }
}
