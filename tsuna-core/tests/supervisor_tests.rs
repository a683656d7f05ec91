// Integration tests for the connection supervisor
//
// A shell script stands in for the external VPN client so every lifecycle
// path (success, auth failure, stderr noise, abnormal exit, interrupt,
// disconnect) can be driven for real, process spawning included.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tsuna_core::encoding_rs::UTF_8;
use tsuna_core::error::{Result, TsunaError, VpnError};
use tsuna_core::store::{is_executable, ConnectionProfile, ProfileStore};
use tsuna_core::types::VpnPassword;
use tsuna_core::vpn::{ConnectionStatus, Supervisor};

const PROFILE_ID: &str = "p1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// In-memory store; the supervisor only sees the ProfileStore boundary
struct FakeStore {
    profiles: Vec<ConnectionProfile>,
    passwords: HashMap<String, String>,
    cli: PathBuf,
}

impl FakeStore {
    fn new(cli: PathBuf) -> Self {
        let mut passwords = HashMap::new();
        passwords.insert(PROFILE_ID.to_string(), "pw".to_string());
        Self {
            profiles: vec![ConnectionProfile {
                id: PROFILE_ID.to_string(),
                name: "office".to_string(),
                host: "vpn.example.com".to_string(),
                username: "alice".to_string(),
            }],
            passwords,
            cli,
        }
    }

    fn without_profiles(cli: PathBuf) -> Self {
        let mut store = Self::new(cli);
        store.profiles.clear();
        store
    }

    fn without_password(cli: PathBuf) -> Self {
        let mut store = Self::new(cli);
        store.passwords.clear();
        store
    }
}

impl ProfileStore for FakeStore {
    fn profile_by_id(&self, id: &str) -> Result<Option<ConnectionProfile>> {
        Ok(self.profiles.iter().find(|p| p.id == id).cloned())
    }

    fn password(&self, id: &str) -> Result<Option<VpnPassword>> {
        Ok(self.passwords.get(id).map(|p| VpnPassword::new(p.clone())))
    }

    fn cli_path(&self) -> PathBuf {
        self.cli.clone()
    }

    fn validate_cli_path(&self, path: &Path) -> bool {
        is_executable(path)
    }
}

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("vpncli.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn supervisor_with_script(body: &str) -> (tempfile::TempDir, Arc<Supervisor>) {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_script(dir.path(), body);
    let supervisor = Arc::new(Supervisor::new(Arc::new(FakeStore::new(cli)), UTF_8));
    (dir, supervisor)
}

fn unwrap_vpn_err(result: Result<()>) -> VpnError {
    match result {
        Err(TsunaError::Vpn(e)) => e,
        other => panic!("Expected VPN error, got {:?}", other.map(|_| ())),
    }
}

async fn connect(supervisor: &Supervisor) -> Result<()> {
    tokio::time::timeout(CONNECT_TIMEOUT, supervisor.connect(PROFILE_ID))
        .await
        .expect("connect timed out")
}

async fn wait_until(mut cond: impl FnMut() -> bool, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_resolves_on_established_marker() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"starting...\"\n\
         echo \"notice: tunnel established\"\n\
         echo \"ignored trailer\"\n\
         sleep 2",
    );
    let mut logs = supervisor.subscribe_logs();

    connect(&supervisor).await.unwrap();
    assert_eq!(supervisor.status(), ConnectionStatus::Connected);

    // The trailer line only produces a log event, never a state change
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let mut saw_trailer = false;
    while tokio::time::Instant::now() < deadline && !saw_trailer {
        match tokio::time::timeout(Duration::from_millis(500), logs.recv()).await {
            Ok(Ok(entry)) => saw_trailer = entry.message.contains("ignored trailer"),
            _ => break,
        }
    }
    assert!(saw_trailer, "trailer line was not logged");
    assert_eq!(supervisor.status(), ConnectionStatus::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_rejects_on_auth_failure() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"authentication failed: bad password\"\n\
         sleep 2",
    );

    let err = unwrap_vpn_err(connect(&supervisor).await);
    match err {
        VpnError::AuthenticationFailed { message } => {
            assert!(message.contains("bad password"), "message was: {}", message);
        }
        other => panic!("Expected AuthenticationFailed, got {:?}", other),
    }
    assert!(matches!(supervisor.status(), ConnectionStatus::Error(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stderr_data_is_always_fatal() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"some harmless noise\" 1>&2\n\
         sleep 2",
    );

    let err = unwrap_vpn_err(connect(&supervisor).await);
    match err {
        VpnError::ClientError { message } => assert_eq!(message, "some harmless noise"),
        other => panic!("Expected ClientError, got {:?}", other),
    }
    assert!(matches!(supervisor.status(), ConnectionStatus::Error(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_client_already_running_marker_is_fatal() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"接続機能は使用できません\"\n\
         sleep 2",
    );

    let err = unwrap_vpn_err(connect(&supervisor).await);
    assert!(matches!(err, VpnError::ClientAlreadyRunning));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_error_prefix_line_carries_remainder() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"error: certificate rejected\"\n\
         sleep 2",
    );

    let err = unwrap_vpn_err(connect(&supervisor).await);
    match err {
        VpnError::ClientError { message } => assert_eq!(message, "certificate rejected"),
        other => panic!("Expected ClientError, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unexpected_exit_carries_exit_code() {
    let (_dir, supervisor) = supervisor_with_script("cat > /dev/null\nexit 3");

    let err = unwrap_vpn_err(connect(&supervisor).await);
    assert_eq!(err, VpnError::UnexpectedExit { code: Some(3) });
    assert!(matches!(supervisor.status(), ConnectionStatus::Error(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_profile_not_found_leaves_status_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_script(dir.path(), "sleep 1");
    let supervisor = Supervisor::new(Arc::new(FakeStore::without_profiles(cli)), UTF_8);

    let err = unwrap_vpn_err(supervisor.connect("nope").await);
    assert_eq!(
        err,
        VpnError::ProfileNotFound {
            id: "nope".to_string()
        }
    );
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
    assert!(supervisor.pid().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_missing_password_fails_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let cli = write_script(dir.path(), "sleep 1");
    let supervisor = Supervisor::new(Arc::new(FakeStore::without_password(cli)), UTF_8);

    let err = unwrap_vpn_err(supervisor.connect(PROFILE_ID).await);
    assert!(matches!(err, VpnError::CredentialMissing { .. }));
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
    assert!(supervisor.pid().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_binary_path_fails_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing-vpncli");
    let supervisor = Supervisor::new(Arc::new(FakeStore::new(missing)), UTF_8);

    let err = unwrap_vpn_err(supervisor.connect(PROFILE_ID).await);
    assert!(matches!(err, VpnError::InvalidBinaryPath { .. }));
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_connect_fails_fast_while_connecting() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"starting...\"\n\
         sleep 5",
    );

    let task = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.connect(PROFILE_ID).await })
    };
    wait_until(|| supervisor.pid().is_some(), "client process to spawn").await;

    let err = unwrap_vpn_err(supervisor.connect(PROFILE_ID).await);
    assert!(matches!(err, VpnError::InvalidState { .. }));

    // Clean up the hanging attempt
    wait_until(|| supervisor.interrupt().is_ok(), "interrupt to be accepted").await;
    let result = task.await.unwrap();
    assert!(matches!(unwrap_vpn_err(result), VpnError::Interrupted));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_interrupt_settles_pending_connect() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"starting...\"\n\
         sleep 5",
    );

    let task = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.connect(PROFILE_ID).await })
    };
    wait_until(|| supervisor.pid().is_some(), "client process to spawn").await;

    wait_until(|| supervisor.interrupt().is_ok(), "interrupt to be accepted").await;
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);

    let result = task.await.unwrap();
    assert!(matches!(unwrap_vpn_err(result), VpnError::Interrupted));

    // SIGTERM fells the script; the exit watcher clears the live handle
    wait_until(|| supervisor.pid().is_none(), "live handle to clear").await;
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_interrupt_invalid_outside_connecting() {
    let (_dir, supervisor) = supervisor_with_script("sleep 1");

    let err = unwrap_vpn_err(supervisor.interrupt());
    assert!(matches!(err, VpnError::InvalidState { .. }));
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_interrupt_invalid_while_connected() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"notice: tunnel established\"\n\
         sleep 5",
    );

    connect(&supervisor).await.unwrap();
    let pid = supervisor.pid();

    let err = unwrap_vpn_err(supervisor.interrupt());
    assert!(matches!(err, VpnError::InvalidState { .. }));
    // Interrupt outside connecting must not kill the process
    assert_eq!(supervisor.pid(), pid);
    assert_eq!(supervisor.status(), ConnectionStatus::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_while_connected_is_invalid_state() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"notice: tunnel established\"\n\
         sleep 5",
    );

    connect(&supervisor).await.unwrap();
    let pid = supervisor.pid();

    let err = unwrap_vpn_err(supervisor.connect(PROFILE_ID).await);
    assert!(matches!(err, VpnError::InvalidState { .. }));
    // No second process was spawned
    assert_eq!(supervisor.pid(), pid);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connect_disconnect_roundtrip() {
    let (_dir, supervisor) = supervisor_with_script(
        "if [ \"$1\" = \"disconnect\" ]; then exit 0; fi\n\
         cat > /dev/null\n\
         echo \"notice: tunnel established\"\n\
         sleep 2",
    );

    connect(&supervisor).await.unwrap();
    assert_eq!(supervisor.status(), ConnectionStatus::Connected);

    supervisor.disconnect().await.unwrap();
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);

    // The connect-session process winds down on its own
    wait_until(|| supervisor.pid().is_none(), "live handle to clear").await;
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_nonzero_exit_yields_error() {
    let (_dir, supervisor) = supervisor_with_script(
        "if [ \"$1\" = \"disconnect\" ]; then exit 2; fi\n\
         cat > /dev/null\n\
         echo \"notice: tunnel established\"\n\
         sleep 2",
    );

    connect(&supervisor).await.unwrap();

    let err = unwrap_vpn_err(supervisor.disconnect().await);
    assert_eq!(err, VpnError::NonZeroExit { code: Some(2) });
    assert!(matches!(supervisor.status(), ConnectionStatus::Error(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_invalid_when_not_connected() {
    let (_dir, supervisor) = supervisor_with_script("sleep 1");

    let err = unwrap_vpn_err(supervisor.disconnect().await);
    assert!(matches!(err, VpnError::InvalidState { .. }));
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lingering_process_exit_cannot_settle_newer_connect() {
    // First invocation ignores SIGTERM and lingers past its interrupt;
    // its late exit must not disturb the next attempt's session
    let (_dir, supervisor) = supervisor_with_script(
        "dir=$(dirname \"$0\")\n\
         if [ -f \"$dir/ran\" ]; then\n\
           cat > /dev/null\n\
           echo \"notice: tunnel established\"\n\
           sleep 2\n\
           exit 0\n\
         fi\n\
         trap '' TERM\n\
         touch \"$dir/ran\"\n\
         cat > /dev/null\n\
         echo \"starting...\"\n\
         sleep 2\n\
         exit 7",
    );

    let task = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.connect(PROFILE_ID).await })
    };
    wait_until(|| supervisor.pid().is_some(), "client process to spawn").await;
    wait_until(|| supervisor.interrupt().is_ok(), "interrupt to be accepted").await;
    assert!(matches!(
        unwrap_vpn_err(task.await.unwrap()),
        VpnError::Interrupted
    ));

    connect(&supervisor).await.unwrap();
    assert_eq!(supervisor.status(), ConnectionStatus::Connected);

    // Outlive the first process's exit; neither it nor the second
    // process winding down may change the established status
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(supervisor.status(), ConnectionStatus::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_adopted_session_supports_disconnect() {
    let (_dir, supervisor) =
        supervisor_with_script("if [ \"$1\" = \"disconnect\" ]; then exit 0; fi\nsleep 1");

    supervisor.resume_connected();
    assert_eq!(supervisor.status(), ConnectionStatus::Connected);

    supervisor.disconnect().await.unwrap();
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
    assert!(supervisor.pid().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_events_pushed_on_transitions() {
    let (_dir, supervisor) = supervisor_with_script(
        "cat > /dev/null\n\
         echo \"notice: tunnel established\"\n\
         sleep 2",
    );
    let mut statuses = supervisor.subscribe_status();

    connect(&supervisor).await.unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), statuses.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(2), statuses.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, ConnectionStatus::Connecting);
    assert_eq!(second, ConnectionStatus::Connected);
}
