//! Application settings commands

use colored::Colorize;
use std::path::PathBuf;
use tsuna_core::error::Result;
use tsuna_core::store::{is_executable, TomlStore};

/// Run `set-cli-path <path>`
///
/// A bare program name is resolved through PATH before being stored.
pub fn run_set_cli_path(path: &str) -> Result<()> {
    let store = TomlStore::open_default()?;

    let resolved = if path.contains(std::path::MAIN_SEPARATOR) {
        PathBuf::from(path)
    } else {
        which::which(path).unwrap_or_else(|_| PathBuf::from(path))
    };

    if !is_executable(&resolved) {
        println!(
            "{} {} does not exist or is not executable; saving anyway",
            "warning:".yellow().bold(),
            resolved.display()
        );
    }

    store.set_cli_path(&resolved)?;
    println!("{} VPN client path set to {}", "✓".green(), resolved.display());
    Ok(())
}

/// Run `set-encoding <label>`
pub fn run_set_encoding(label: &str) -> Result<()> {
    let store = TomlStore::open_default()?;
    store.set_output_encoding(label)?;
    println!("{} client output encoding set to {}", "✓".green(), label);
    Ok(())
}
