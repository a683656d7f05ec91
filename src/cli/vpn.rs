//! VPN connection commands
//!
//! Drives the supervisor: connect in the foreground with Ctrl-C mapped to
//! interrupt, one-shot disconnect, and a status snapshot.

use colored::Colorize;
use std::sync::Arc;
use tracing::info;
use tsuna_core::encoding_rs::{Encoding, UTF_8};
use tsuna_core::error::{Result, TsunaError, VpnError};
use tsuna_core::store::{ProfileStore, TomlStore};
use tsuna_core::vpn::{encoding_for_label, LogEntry, Supervisor};

fn output_encoding(store: &TomlStore) -> &'static Encoding {
    let label = store.output_encoding();
    match encoding_for_label(&label) {
        Some(encoding) => encoding,
        None => {
            eprintln!(
                "{} unknown encoding label '{}', falling back to utf-8",
                "warning:".yellow().bold(),
                label
            );
            UTF_8
        }
    }
}

/// Print supervisor log events as they arrive
fn spawn_log_printer(supervisor: &Supervisor) {
    let mut logs = supervisor.subscribe_logs();
    tokio::spawn(async move {
        loop {
            match logs.recv().await {
                Ok(entry) => print_log(&entry),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
    });
}

fn print_log(entry: &LogEntry) {
    println!("{}", entry.to_string().dimmed());
}

/// Run `connect <profile>`
pub async fn run_connect(profile: &str) -> Result<()> {
    let store = TomlStore::open_default()?;

    let target = store
        .profiles()?
        .into_iter()
        .find(|p| p.name == profile || p.id == profile)
        .ok_or_else(|| {
            TsunaError::Vpn(VpnError::ProfileNotFound {
                id: profile.to_string(),
            })
        })?;

    let encoding = output_encoding(&store);
    let supervisor = Arc::new(Supervisor::new(Arc::new(store), encoding));
    spawn_log_printer(&supervisor);

    println!("Connecting to {} ({})...", target.name.bold(), target.host);
    info!("Connect requested for profile {}", target.id);

    let mut connect = {
        let supervisor = Arc::clone(&supervisor);
        let id = target.id.clone();
        tokio::spawn(async move { supervisor.connect(&id).await })
    };

    let result = tokio::select! {
        res = &mut connect => flatten_join(res),
        _ = tokio::signal::ctrl_c() => {
            println!();
            // The connect future keeps running; interrupt settles it
            if let Err(e) = supervisor.interrupt() {
                eprintln!("{} {}", "warning:".yellow().bold(), e);
            }
            flatten_join((&mut connect).await)
        }
    };

    match result {
        Ok(()) => {
            println!("{} tunnel established", "✓".green());
            println!("The connection stays up; run {} to drop it.", "tsuna disconnect".bold());
            Ok(())
        }
        Err(TsunaError::Vpn(VpnError::Interrupted)) => {
            println!("{} connect attempt interrupted", "✗".yellow());
            Ok(())
        }
        Err(e) => Err(e),
    }
}

fn flatten_join(res: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    res.unwrap_or_else(|e| {
        Err(TsunaError::Vpn(VpnError::ClientError {
            message: format!("connect task failed: {}", e),
        }))
    })
}

/// Run `disconnect`
pub async fn run_disconnect() -> Result<()> {
    let store = TomlStore::open_default()?;
    let encoding = output_encoding(&store);
    let supervisor = Supervisor::new(Arc::new(store), encoding);
    spawn_log_printer(&supervisor);

    // The tunnel outlives the process that spawned it; adopt it so the
    // state machine allows the disconnect
    supervisor.resume_connected();
    supervisor.disconnect().await?;

    println!("{} disconnected", "✓".green());
    Ok(())
}

/// Run `status`
pub fn run_status() -> Result<()> {
    let store = TomlStore::open_default()?;
    let cli_path = store.cli_path();
    let valid = store.validate_cli_path(&cli_path);

    println!("client binary:   {}", cli_path.display());
    println!(
        "binary status:   {}",
        if valid {
            "ok".green().to_string()
        } else {
            "missing or not executable".red().to_string()
        }
    );
    println!("output encoding: {}", store.output_encoding());
    println!("profiles:        {}", store.profiles()?.len());
    Ok(())
}
