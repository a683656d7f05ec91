//! Connection supervisor for the external VPN client
//!
//! Owns the connection status, the live client process, and the single
//! in-flight connect/disconnect operation. Spawns the client, feeds it
//! the credential sequence over stdin, classifies its streamed output
//! into lifecycle transitions, and emits status and log events.

use crate::error::{Result, TsunaError, VpnError};
use crate::store::ProfileStore;
use crate::vpn::{ConnectionStatus, EventBus, LineBuffer, LogEntry, OutputEvent, OutputParser, SharedStatus};
use encoding_rs::Encoding;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{broadcast, oneshot};

/// The single suspended connect caller, bound to one spawned process
struct PendingConnect {
    /// Session the operation belongs to; a stale process exit must never
    /// settle a newer operation
    session: u64,
    tx: oneshot::Sender<std::result::Result<(), VpnError>>,
}

/// The live client process, if any
struct LiveProcess {
    session: u64,
    pid: u32,
}

/// State shared between the supervisor API and its reader/watcher tasks
struct Shared {
    status: SharedStatus,
    events: EventBus,
    parser: OutputParser,
    pending: Mutex<Option<PendingConnect>>,
    live: Mutex<Option<LiveProcess>>,
    session_counter: AtomicU64,
}

impl Shared {
    /// Set the status and push it to subscribers, synchronously
    fn set_status(&self, status: ConnectionStatus) {
        self.status.set(status.clone());
        self.events.emit_log(format!("VPN status changed to: {}", status));
        self.events.emit_status(status);
    }

    /// Announce a status the state slot already holds (post-CAS)
    fn announce(&self, status: ConnectionStatus) {
        self.events.emit_log(format!("VPN status changed to: {}", status));
        self.events.emit_status(status);
    }

    /// Take the pending operation if it still belongs to `session`
    ///
    /// Returns None when the slot is empty or owned by another session;
    /// later output for the same process is logged but never re-settles.
    /// The caller must land the status transition before sending on the
    /// taken oneshot, so the awaiting connect never resumes ahead of it.
    fn take_pending(&self, session: u64) -> Option<PendingConnect> {
        let mut pending = self.pending.lock().unwrap();
        match pending.as_ref() {
            Some(op) if op.session == session => pending.take(),
            _ => None,
        }
    }

    /// Send SIGTERM to the live process, fire-and-forget
    ///
    /// The authoritative completion signal stays the process's own exit
    /// notification; this never waits for the OS to confirm death.
    fn kill_live(&self) {
        let live = self.live.lock().unwrap();
        if let Some(proc) = live.as_ref() {
            if let Err(e) = kill(Pid::from_raw(proc.pid as i32), Signal::SIGTERM) {
                tracing::warn!("Failed to send SIGTERM to pid {}: {}", proc.pid, e);
            }
        }
    }

    /// Fatal classification while the connect is in flight
    fn fail_connect(&self, session: u64, err: VpnError) {
        if let Some(op) = self.take_pending(session) {
            self.set_status(ConnectionStatus::Error(err.to_string()));
            self.kill_live();
            let _ = op.tx.send(Err(err));
        }
    }

    /// Success classification: tunnel established
    fn complete_connect(&self, session: u64) {
        if let Some(op) = self.take_pending(session) {
            self.set_status(ConnectionStatus::Connected);
            let _ = op.tx.send(Ok(()));
        }
    }

    /// One decoded, trimmed, non-empty stdout line
    fn handle_stdout_line(&self, session: u64, line: &str) {
        self.events.emit_log(format!("[STDOUT] {}", line));

        match self.parser.parse_line(line) {
            OutputEvent::ClientAlreadyRunning => {
                self.fail_connect(session, VpnError::ClientAlreadyRunning);
            }
            // Credentials were written proactively at spawn; the prompt is
            // only diagnostic and must not trigger a second write.
            OutputEvent::PasswordPrompt => {}
            OutputEvent::TunnelEstablished => self.complete_connect(session),
            OutputEvent::AuthenticationFailed { message } => {
                self.fail_connect(session, VpnError::AuthenticationFailed { message });
            }
            OutputEvent::ClientError { message } => {
                self.fail_connect(session, VpnError::ClientError { message });
            }
            OutputEvent::Other { .. } => {}
        }
    }

    /// One decoded, trimmed, non-empty stderr line: always fatal
    fn handle_stderr_line(&self, session: u64, line: &str) {
        self.events.emit_log(format!("[STDERR] {}", line));

        match self.parser.parse_stderr(line) {
            OutputEvent::ClientAlreadyRunning => {
                self.fail_connect(session, VpnError::ClientAlreadyRunning);
            }
            OutputEvent::AuthenticationFailed { message } => {
                self.fail_connect(session, VpnError::AuthenticationFailed { message });
            }
            OutputEvent::ClientError { message } => {
                self.fail_connect(session, VpnError::ClientError { message });
            }
            // parse_stderr escalates everything else to ClientError
            _ => self.fail_connect(session, VpnError::ClientError { message: line.to_string() }),
        }
    }

    /// Process exit notification; clears the live handle for this session
    fn handle_exit(&self, session: u64, code: Option<i32>) {
        self.events
            .emit_log(format!("VPN client process exited (code: {:?})", code));

        {
            let mut live = self.live.lock().unwrap();
            if matches!(live.as_ref(), Some(proc) if proc.session == session) {
                *live = None;
            }
        }

        // Exit before the success marker means the attempt died under us
        if let Some(op) = self.take_pending(session) {
            let err = VpnError::UnexpectedExit { code };
            self.set_status(ConnectionStatus::Error(err.to_string()));
            let _ = op.tx.send(Err(err));
        }
    }
}

/// Supervisor for a single external VPN client process at a time
///
/// Not safe for concurrent connect/disconnect/interrupt in the queuing
/// sense: a second operation while one is in flight fails fast with
/// `InvalidState` instead of waiting.
pub struct Supervisor {
    shared: Arc<Shared>,
    store: Arc<dyn ProfileStore>,
    encoding: &'static Encoding,
}

impl Supervisor {
    /// Create a supervisor over the given store, decoding client output
    /// with the given console encoding
    pub fn new(store: Arc<dyn ProfileStore>, encoding: &'static Encoding) -> Self {
        Self {
            shared: Arc::new(Shared {
                status: SharedStatus::new(),
                events: EventBus::new(),
                parser: OutputParser::new(),
                pending: Mutex::new(None),
                live: Mutex::new(None),
                session_counter: AtomicU64::new(0),
            }),
            store,
            encoding,
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status.get()
    }

    /// PID of the live client process, if one is running
    pub fn pid(&self) -> Option<u32> {
        self.shared.live.lock().unwrap().as_ref().map(|p| p.pid)
    }

    /// Adopt an externally established session
    ///
    /// The client keeps its tunnel alive independently of the process that
    /// spawned it; a fresh supervisor in a new process calls this so it
    /// may issue the one-shot disconnect for that session.
    pub fn resume_connected(&self) {
        self.shared.set_status(ConnectionStatus::Connected);
    }

    /// Subscribe to status change events
    pub fn subscribe_status(&self) -> broadcast::Receiver<ConnectionStatus> {
        self.shared.events.subscribe_status()
    }

    /// Subscribe to log events
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.shared.events.subscribe_logs()
    }

    fn invalid_state(&self) -> TsunaError {
        VpnError::InvalidState {
            current: self.shared.status.get().to_string(),
        }
        .into()
    }

    /// Connect using the profile with the given id
    ///
    /// All preconditions are checked before the process is spawned and
    /// before the status changes. The password is pulled from the store
    /// for this one attempt and dropped after the single stdin write.
    /// No timeout is imposed; a hung client hangs the call until
    /// [`interrupt`](Self::interrupt) or process exit.
    pub async fn connect(&self, profile_id: &str) -> Result<()> {
        if !self.shared.status.get().can_connect() {
            return Err(self.invalid_state());
        }

        let profile = self
            .store
            .profile_by_id(profile_id)?
            .ok_or_else(|| VpnError::ProfileNotFound {
                id: profile_id.to_string(),
            })?;

        let password = self
            .store
            .password(profile_id)?
            .ok_or_else(|| VpnError::CredentialMissing {
                id: profile_id.to_string(),
            })?;

        let cli_path = self.store.cli_path();
        if !self.store.validate_cli_path(&cli_path) {
            return Err(VpnError::InvalidBinaryPath {
                path: cli_path.to_string_lossy().to_string(),
            }
            .into());
        }

        // Claim the status slot; a concurrent operation loses the race here
        self.shared
            .status
            .try_begin_connect()
            .map_err(|current| -> TsunaError {
                VpnError::InvalidState {
                    current: current.to_string(),
                }
                .into()
            })?;
        self.shared.announce(ConnectionStatus::Connecting);
        self.shared
            .events
            .emit_log(format!("VPN connect starting: {} ({})", profile.name, profile.host));

        let mut child = match Command::new(&cli_path)
            .arg("-s")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let err = VpnError::SpawnFailure {
                    reason: format!("Failed to spawn {}: {}", cli_path.display(), e),
                };
                self.shared.events.emit_log(format!("[ERROR] {}", err));
                self.shared.set_status(ConnectionStatus::Error(err.to_string()));
                return Err(err.into());
            }
        };

        let session = self.shared.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
        // id() is None once the process has been reaped; without a pid there
        // is nothing to SIGTERM and the exit watcher settles the attempt
        if let Some(pid) = child.id() {
            *self.shared.live.lock().unwrap() = Some(LiveProcess { session, pid });
            tracing::debug!("VPN client spawned with PID {}", pid);
        }

        let (tx, rx) = oneshot::channel();
        *self.shared.pending.lock().unwrap() = Some(PendingConnect { session, tx });

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Stream readers and the exit watcher run independently of this
        // call so interrupt() can act while we are suspended on rx.
        if let Some(stdout) = stdout {
            let shared = Arc::clone(&self.shared);
            let encoding = self.encoding;
            tokio::spawn(async move {
                read_stream(stdout, encoding, |line| shared.handle_stdout_line(session, line)).await;
            });
        }
        if let Some(stderr) = stderr {
            let shared = Arc::clone(&self.shared);
            let encoding = self.encoding;
            tokio::spawn(async move {
                read_stream(stderr, encoding, |line| shared.handle_stderr_line(session, line)).await;
            });
        }
        {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                let code = match child.wait().await {
                    Ok(status) => status.code(),
                    Err(e) => {
                        tracing::warn!("Failed to await VPN client process: {}", e);
                        None
                    }
                };
                shared.handle_exit(session, code);
            });
        }

        // Write the credential sequence and close stdin: the client reads
        // exactly this once and must not wait for further input.
        if let Some(mut stdin) = stdin {
            let sequence = format!(
                "connect {}\n{}\n{}\n",
                profile.host,
                profile.username,
                password.expose()
            );
            let write = async {
                stdin.write_all(sequence.as_bytes()).await?;
                stdin.shutdown().await
            };
            if let Err(e) = write.await {
                self.shared.fail_connect(
                    session,
                    VpnError::SpawnFailure {
                        reason: format!("Failed to write credentials to stdin: {}", e),
                    },
                );
            }
            drop(stdin);
        }
        drop(password);

        match rx.await {
            Ok(result) => result.map_err(Into::into),
            // Sender dropped without settling; treat as the process dying
            Err(_) => Err(VpnError::UnexpectedExit { code: None }.into()),
        }
    }

    /// Interrupt the in-flight connect attempt
    ///
    /// Legal only while connecting with a live process. Sends SIGTERM
    /// without awaiting exit confirmation, moves to disconnected, and
    /// rejects the pending connect with `Interrupted`.
    pub fn interrupt(&self) -> Result<()> {
        let op = {
            let mut pending = self.shared.pending.lock().unwrap();
            if !self.shared.status.is_connecting()
                || pending.is_none()
                || self.shared.live.lock().unwrap().is_none()
            {
                return Err(self.invalid_state());
            }
            pending.take().unwrap()
        };

        self.shared.events.emit_log("Interrupting connect attempt...");
        self.shared.kill_live();
        self.shared.set_status(ConnectionStatus::Disconnected);
        let _ = op.tx.send(Err(VpnError::Interrupted));
        Ok(())
    }

    /// Disconnect the established tunnel
    ///
    /// Spawns a one-shot `disconnect` invocation of the client and waits
    /// for its exit code; zero is the only success indicator.
    pub async fn disconnect(&self) -> Result<()> {
        self.shared
            .status
            .try_begin_disconnect()
            .map_err(|current| -> TsunaError {
                VpnError::InvalidState {
                    current: current.to_string(),
                }
                .into()
            })?;
        self.shared.announce(ConnectionStatus::Disconnecting);

        let cli_path = self.store.cli_path();
        self.shared
            .events
            .emit_log(format!("Running {} disconnect", cli_path.display()));

        let output = Command::new(&cli_path)
            .arg("disconnect")
            .stdin(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let err = VpnError::SpawnFailure {
                    reason: format!("Failed to run disconnect: {}", e),
                };
                self.shared.set_status(ConnectionStatus::Error(err.to_string()));
                return Err(err.into());
            }
        };

        for line in decode_lines(self.encoding, &output.stdout) {
            self.shared.events.emit_log(format!("[STDOUT] {}", line));
        }
        for line in decode_lines(self.encoding, &output.stderr) {
            self.shared.events.emit_log(format!("[STDERR] {}", line));
        }

        if output.status.success() {
            self.shared.set_status(ConnectionStatus::Disconnected);
            Ok(())
        } else {
            let err = VpnError::NonZeroExit {
                code: output.status.code(),
            };
            self.shared.set_status(ConnectionStatus::Error(err.to_string()));
            Err(err.into())
        }
    }
}

/// Read a byte stream chunk-wise, assembling and dispatching decoded,
/// trimmed, non-empty lines
async fn read_stream<R, F>(mut stream: R, encoding: &'static Encoding, mut dispatch: F)
where
    R: tokio::io::AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut buffer = LineBuffer::new(encoding);
    let mut chunk = [0u8; 4096];

    loop {
        match stream.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for line in buffer.push(&chunk[..n]) {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        dispatch(trimmed);
                    }
                }
            }
            Err(e) => {
                tracing::debug!("Stream read ended: {}", e);
                break;
            }
        }
    }

    if let Some(line) = buffer.flush() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            dispatch(trimmed);
        }
    }
}

/// Decode a captured output buffer into trimmed, non-empty lines
fn decode_lines(encoding: &'static Encoding, bytes: &[u8]) -> Vec<String> {
    let mut buffer = LineBuffer::new(encoding);
    let mut lines: Vec<String> = buffer
        .push(bytes)
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    if let Some(last) = buffer.flush() {
        let trimmed = last.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed.to_string());
        }
    }
    lines
}
