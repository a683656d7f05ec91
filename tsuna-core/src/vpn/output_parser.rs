//! Pattern-based classifier for vpncli output
//!
//! Matches known substrings in the client's stdout/stderr text and maps
//! each line to a lifecycle event. Unknown lines are passed through for
//! logging only; the full protocol grammar is deliberately not parsed.

use regex::Regex;

/// Classification of a single decoded, trimmed output line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    /// The client GUI is already running, connect is unavailable (fatal)
    ClientAlreadyRunning,

    /// The client is asking for a password
    ///
    /// Informational only: credentials are written proactively at spawn
    /// time, so this match never triggers a second credential write.
    PasswordPrompt,

    /// The tunnel has been established (resolves the connect attempt)
    TunnelEstablished,

    /// Authentication was rejected (fatal); the full line is preserved
    AuthenticationFailed { message: String },

    /// A line with the `error:` prefix (fatal); message is the remainder
    ClientError { message: String },

    /// Anything else; produces only a log event
    Other { line: String },
}

/// Classifier for vpncli output lines
pub struct OutputParser {
    /// Pattern for "the connect feature is unavailable" (GUI running)
    already_running_pattern: Regex,
    /// Pattern for interactive password prompts
    password_prompt_pattern: Regex,
    /// Pattern for the tunnel-established notice
    established_pattern: Regex,
    /// Pattern for authentication failures
    auth_failed_pattern: Regex,
    /// Pattern for error-prefixed lines
    error_prefix_pattern: Regex,
}

impl OutputParser {
    /// Create a new OutputParser with compiled patterns
    ///
    /// The match strings cover both the Japanese messages vpncli emits on a
    /// Japanese-locale install and their English equivalents.
    pub fn new() -> Self {
        Self {
            already_running_pattern: Regex::new(
                r"接続機能は使用できません|(?i)connect not available",
            )
            .expect("Failed to compile already_running pattern"),
            password_prompt_pattern: Regex::new(r"(?i)password:")
                .expect("Failed to compile password_prompt pattern"),
            established_pattern: Regex::new(r"VPNを確立|(?i)tunnel established")
                .expect("Failed to compile established pattern"),
            auth_failed_pattern: Regex::new(r"認証に失敗|(?i)authentication failed")
                .expect("Failed to compile auth_failed pattern"),
            error_prefix_pattern: Regex::new(r"(?i)^(?:>>\s*)?error:\s*(.*)$")
                .expect("Failed to compile error_prefix pattern"),
        }
    }

    /// Classify a line from vpncli stdout
    ///
    /// Checks are ordered by priority; the first match wins.
    pub fn parse_line(&self, line: &str) -> OutputEvent {
        if self.already_running_pattern.is_match(line) {
            return OutputEvent::ClientAlreadyRunning;
        }

        if self.password_prompt_pattern.is_match(line) {
            return OutputEvent::PasswordPrompt;
        }

        if self.established_pattern.is_match(line) {
            return OutputEvent::TunnelEstablished;
        }

        if self.auth_failed_pattern.is_match(line) {
            return OutputEvent::AuthenticationFailed {
                message: line.to_string(),
            };
        }

        if let Some(captures) = self.error_prefix_pattern.captures(line) {
            let message = captures
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            return OutputEvent::ClientError { message };
        }

        OutputEvent::Other {
            line: line.to_string(),
        }
    }

    /// Classify a line from vpncli stderr
    ///
    /// Anything arriving on stderr is fatal regardless of content; known
    /// markers still map to their specific event so callers get the most
    /// precise error kind.
    pub fn parse_stderr(&self, line: &str) -> OutputEvent {
        match self.parse_line(line) {
            fatal @ (OutputEvent::ClientAlreadyRunning
            | OutputEvent::AuthenticationFailed { .. }
            | OutputEvent::ClientError { .. }) => fatal,
            _ => OutputEvent::ClientError {
                message: line.to_string(),
            },
        }
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new()
    }
}
