//! VPN supervision module
//!
//! Drives the external VPN client binary and tracks connection state.

pub mod events;
pub mod line_buffer;
pub mod output_parser;
pub mod state;
pub mod supervisor;

// Public re-exports
pub use events::{EventBus, LogEntry};
pub use line_buffer::{encoding_for_label, LineBuffer};
pub use output_parser::{OutputEvent, OutputParser};
pub use state::{ConnectionStatus, SharedStatus};
pub use supervisor::Supervisor;
