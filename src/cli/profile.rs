//! Profile management commands
//!
//! Interactive commands for adding, listing and removing connection
//! profiles. Passwords go straight to the system keyring and are never
//! written to the store file.

use colored::Colorize;
use std::io::{self, Write};
use tsuna_core::error::{Result, StoreError, TsunaError};
use tsuna_core::store::TomlStore;
use tsuna_core::types::VpnPassword;

/// Run `profile add`
pub fn run_add() -> Result<()> {
    let store = TomlStore::open_default()?;

    println!("New connection profile");
    println!("Credentials are stored in your system keyring.");
    println!();

    let name = prompt("Display name")?;
    if store.profile_by_name(&name)?.is_some() {
        return Err(TsunaError::Store(StoreError::ValidationError {
            message: format!("A profile named '{}' already exists", name),
        }));
    }

    let host = prompt("VPN host")?;
    let username = prompt("Username")?;
    let password = VpnPassword::new(prompt("Password")?);

    let profile = store.add_profile(&name, &host, &username, &password)?;
    println!();
    println!(
        "{} profile '{}' saved (id: {})",
        "✓".green(),
        profile.name,
        profile.id
    );
    Ok(())
}

/// Run `profile list`
pub fn run_list() -> Result<()> {
    let store = TomlStore::open_default()?;
    let profiles = store.profiles()?;

    if profiles.is_empty() {
        println!("No profiles saved. Run {} first.", "tsuna profile add".bold());
        return Ok(());
    }

    for profile in profiles {
        println!(
            "{}  {} ({}@{})",
            profile.id.dimmed(),
            profile.name.bold(),
            profile.username,
            profile.host
        );
    }
    Ok(())
}

/// Run `profile remove <name>`
pub fn run_remove(name: &str) -> Result<()> {
    let store = TomlStore::open_default()?;

    let profile = store.profile_by_name(name)?.ok_or_else(|| {
        TsunaError::Store(StoreError::ValidationError {
            message: format!("No profile named '{}'", name),
        })
    })?;

    store.delete_profile(&profile.id)?;
    println!("{} profile '{}' removed", "✓".green(), name);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = input.trim().to_string();

    if value.is_empty() {
        return Err(TsunaError::Store(StoreError::ValidationError {
            message: format!("{} cannot be empty", label),
        }));
    }
    Ok(value)
}
