//! Core library for the tsuna VPN supervisor
//!
//! This crate supervises an external interactive VPN CLI binary: it spawns
//! the process, writes the credential sequence, classifies the text the
//! client emits into connection lifecycle transitions, and exposes
//! connect/disconnect/interrupt/status plus status and log event streams.

pub mod error;
pub mod types;

// Re-exported so callers name console encodings without a direct dependency
pub use encoding_rs;

pub mod store;
pub mod vpn;

/// Initialize the tracing subscriber
///
/// Under systemd the journal gets structured records; otherwise logs go
/// to stderr with pretty formatting for interactive use.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    // JOURNAL_STREAM is set when systemd owns our stdio
    #[cfg(target_os = "linux")]
    if std::env::var("JOURNAL_STREAM").is_ok() {
        tracing_subscriber::registry()
            .with(tracing_journald::layer()?)
            .with(tracing_subscriber::filter::LevelFilter::INFO)
            .init();
        return Ok(());
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().pretty())
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    Ok(())
}
