//! tsuna - supervisor CLI for Cisco Secure Client style vpncli binaries
//!
//! Manages named connection profiles with keyring-backed passwords and
//! drives the external VPN client through connect/disconnect, classifying
//! its console output into connection state.

use clap::{Parser, Subcommand};
use tsuna_core::{error::TsunaError, init_logging};

mod cli;

#[derive(Parser)]
#[command(name = "tsuna")]
#[command(about = "Drive an external VPN CLI client with stored profiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage connection profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommands,
    },
    /// Connect using a saved profile (Ctrl-C interrupts the attempt)
    Connect {
        /// Profile name or id
        profile: String,
    },
    /// Disconnect the established tunnel
    Disconnect,
    /// Show the supervisor connection status
    Status,
    /// Set the path of the VPN client binary
    SetCliPath { path: String },
    /// Set the console encoding of the client's output (e.g. shift_jis)
    SetEncoding { label: String },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Add a profile interactively
    Add,
    /// List saved profiles
    List,
    /// Remove a profile by name
    Remove { name: String },
}

#[tokio::main]
async fn main() {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Profile { action } => match action {
            ProfileCommands::Add => cli::profile::run_add(),
            ProfileCommands::List => cli::profile::run_list(),
            ProfileCommands::Remove { name } => cli::profile::run_remove(&name),
        },
        Commands::Connect { profile } => cli::vpn::run_connect(&profile).await,
        Commands::Disconnect => cli::vpn::run_disconnect().await,
        Commands::Status => cli::vpn::run_status(),
        Commands::SetCliPath { path } => cli::settings::run_set_cli_path(&path),
        Commands::SetEncoding { label } => cli::settings::run_set_encoding(&label),
    };

    if let Err(e) = result {
        report_failure(&e);
        std::process::exit(1);
    }
}

fn report_failure(e: &TsunaError) {
    use colored::Colorize;

    eprintln!("{} {}", "error:".red().bold(), e);
}
