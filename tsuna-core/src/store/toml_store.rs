//! TOML-backed profile and settings store
//!
//! Profiles and application settings live in a TOML file in the user's
//! configuration directory; passwords go to the keyring keyed by profile
//! id and never touch the file.

use crate::error::{Result, StoreError, TsunaError};
use crate::store::{is_executable, keyring, ConnectionProfile, ProfileStore};
use crate::types::VpnPassword;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default store file name
const STORE_FILE_NAME: &str = "store.toml";

/// Default location of the Cisco Secure Client CLI binary
#[cfg(windows)]
const DEFAULT_CLI_PATH: &str = "C:/Program Files (x86)/Cisco/Cisco Secure Client/vpncli.exe";
#[cfg(not(windows))]
const DEFAULT_CLI_PATH: &str = "/opt/cisco/secureclient/bin/vpn";

/// Default console encoding of the client's output
///
/// vpncli on a Japanese Windows install writes Shift-JIS to its console;
/// elsewhere UTF-8 is the safe assumption. Overridable via settings.
#[cfg(windows)]
const DEFAULT_OUTPUT_ENCODING: &str = "shift_jis";
#[cfg(not(windows))]
const DEFAULT_OUTPUT_ENCODING: &str = "utf-8";

fn default_cli_path() -> String {
    DEFAULT_CLI_PATH.to_string()
}

fn default_output_encoding() -> String {
    DEFAULT_OUTPUT_ENCODING.to_string()
}

/// On-disk store structure
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreFile {
    /// Path of the external VPN client binary
    #[serde(default = "default_cli_path")]
    cli_path: String,

    /// Console encoding label used to decode client output
    #[serde(default = "default_output_encoding")]
    output_encoding: String,

    /// Saved connection profiles
    #[serde(default, rename = "profile")]
    profiles: Vec<ConnectionProfile>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            cli_path: default_cli_path(),
            output_encoding: default_output_encoding(),
            profiles: Vec::new(),
        }
    }
}

/// Get the configuration directory
///
/// Returns ~/.config/tsuna, or the TSUNA_CONFIG_DIR environment variable
/// if set (used by tests).
pub fn get_store_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TSUNA_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        TsunaError::Store(StoreError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;

    Ok(PathBuf::from(home).join(".config").join("tsuna"))
}

/// Get the default store file path
pub fn get_store_path() -> Result<PathBuf> {
    Ok(get_store_dir()?.join(STORE_FILE_NAME))
}

/// TOML-backed implementation of [`ProfileStore`]
///
/// Reads the file on every lookup so concurrent CLI invocations observe
/// each other's edits.
pub struct TomlStore {
    path: PathBuf,
}

impl TomlStore {
    /// Open the store at the default location
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(get_store_path()?))
    }

    /// Open a store at an explicit path
    pub fn open(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|_| {
            TsunaError::Store(StoreError::LoadFailed {
                path: self.path.to_string_lossy().to_string(),
            })
        })?;

        let store: StoreFile = toml::from_str(&contents).map_err(|e| {
            TsunaError::Store(StoreError::ValidationError {
                message: format!("Failed to parse store file: {}", e),
            })
        })?;

        Ok(store)
    }

    fn save(&self, store: &StoreFile) -> Result<()> {
        let contents = toml::to_string_pretty(store)?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TsunaError::Store(StoreError::IoError {
                    message: format!("Failed to create config directory: {}", e),
                })
            })?;
        }

        std::fs::write(&self.path, contents).map_err(|_| {
            TsunaError::Store(StoreError::SaveFailed {
                path: self.path.to_string_lossy().to_string(),
            })
        })?;

        Ok(())
    }

    /// List all saved profiles
    pub fn profiles(&self) -> Result<Vec<ConnectionProfile>> {
        Ok(self.load()?.profiles)
    }

    /// Find a profile by display name
    pub fn profile_by_name(&self, name: &str) -> Result<Option<ConnectionProfile>> {
        Ok(self.load()?.profiles.into_iter().find(|p| p.name == name))
    }

    /// Add a profile and store its password in the keyring
    ///
    /// A fresh opaque id is generated; the created profile is returned.
    pub fn add_profile(
        &self,
        name: &str,
        host: &str,
        username: &str,
        password: &VpnPassword,
    ) -> Result<ConnectionProfile> {
        let mut store = self.load()?;

        let id = new_profile_id(&store.profiles);
        let profile = ConnectionProfile {
            id: id.clone(),
            name: name.to_string(),
            host: host.to_string(),
            username: username.to_string(),
        };

        store.profiles.push(profile.clone());
        self.save(&store)?;

        keyring::store_password(&id, password)?;
        Ok(profile)
    }

    /// Update a profile in place, optionally replacing its password
    pub fn update_profile(
        &self,
        profile: &ConnectionProfile,
        password: Option<&VpnPassword>,
    ) -> Result<()> {
        let mut store = self.load()?;

        let slot = store
            .profiles
            .iter_mut()
            .find(|p| p.id == profile.id)
            .ok_or_else(|| {
                TsunaError::Store(StoreError::ValidationError {
                    message: format!("No profile with id {}", profile.id),
                })
            })?;
        *slot = profile.clone();
        self.save(&store)?;

        if let Some(password) = password {
            keyring::store_password(&profile.id, password)?;
        }
        Ok(())
    }

    /// Delete a profile and its keyring entry
    pub fn delete_profile(&self, id: &str) -> Result<()> {
        let mut store = self.load()?;
        store.profiles.retain(|p| p.id != id);
        self.save(&store)?;

        keyring::delete_password(id)
    }

    /// Set the VPN client binary path
    pub fn set_cli_path(&self, path: &Path) -> Result<()> {
        let mut store = self.load()?;
        store.cli_path = path.to_string_lossy().to_string();
        self.save(&store)
    }

    /// Console encoding label configured for client output
    pub fn output_encoding(&self) -> String {
        self.load()
            .map(|s| s.output_encoding)
            .unwrap_or_else(|_| default_output_encoding())
    }

    /// Set the console encoding label for client output
    pub fn set_output_encoding(&self, label: &str) -> Result<()> {
        if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
            return Err(TsunaError::Store(StoreError::ValidationError {
                message: format!("Unknown encoding label: {}", label),
            }));
        }
        let mut store = self.load()?;
        store.output_encoding = label.to_string();
        self.save(&store)
    }
}

impl ProfileStore for TomlStore {
    fn profile_by_id(&self, id: &str) -> Result<Option<ConnectionProfile>> {
        Ok(self.load()?.profiles.into_iter().find(|p| p.id == id))
    }

    fn password(&self, id: &str) -> Result<Option<VpnPassword>> {
        keyring::retrieve_password(id)
    }

    fn cli_path(&self) -> PathBuf {
        PathBuf::from(
            self.load()
                .map(|s| s.cli_path)
                .unwrap_or_else(|_| default_cli_path()),
        )
    }

    fn validate_cli_path(&self, path: &Path) -> bool {
        is_executable(path)
    }
}

/// Generate an opaque profile id unique within the given list
///
/// Derived from the current time and process id; collisions against the
/// existing profiles are retried with a counter suffix.
fn new_profile_id(existing: &[ConnectionProfile]) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let base = format!("{:x}-{:x}", nanos, std::process::id());

    if !existing.iter().any(|p| p.id == base) {
        return base;
    }
    let mut n = 1u32;
    loop {
        let candidate = format!("{}-{}", base, n);
        if !existing.iter().any(|p| p.id == candidate) {
            return candidate;
        }
        n += 1;
    }
}
