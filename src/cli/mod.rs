//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands.

pub mod profile;
pub mod settings;
pub mod vpn;
