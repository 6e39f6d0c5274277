use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc::Sender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::action::Action;
use crate::enums::ExitKind;
use crate::scan::{classify_exit, ScanError};
use crate::secret::Secret;

/// Upper bound on the elevation self-test.
pub const AUTH_TEST_WAIT: Duration = Duration::from_millis(5000);
/// Upper bound on waiting for a cancelled subprocess to die.
pub const STOP_KILL_WAIT: Duration = Duration::from_millis(3000);

const PATH_ENV: &str = "PATH";
const SYSTEM_PATH: &str = "/usr/sbin:/sbin";

/// How the session spawns the tool.
#[derive(Debug)]
pub enum Launch {
    /// Run the tool directly; the process already has the needed privileges.
    Direct,
    /// Wrap the tool in `sudo -S`, feeding the credential on stdin.
    Sudo(Secret),
}

/// PATH used for tool resolution and subprocess spawning. Scan tools often
/// live in sbin directories that user shells leave off the PATH.
fn search_path() -> String {
    env::var_os(PATH_ENV).map_or(SYSTEM_PATH.to_string(), |v| {
        format!("{}:{}", v.to_string_lossy(), SYSTEM_PATH)
    })
}

/// Locate the external scan binary before anything is spawned.
pub fn resolve_tool(name: &str) -> Result<PathBuf, ScanError> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        if is_executable(candidate) {
            return Ok(candidate.to_path_buf());
        }
        return Err(ScanError::ToolNotFound(name.to_string()));
    }
    for dir in env::split_paths(&search_path()) {
        let full = dir.join(name);
        if is_executable(&full) {
            return Ok(full);
        }
    }
    Err(ScanError::ToolNotFound(name.to_string()))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Drive one scan subprocess from spawn to exit, reporting everything back
/// over the action channel. Each message carries the session id so the
/// controller can discard events from superseded sessions.
pub async fn run_session(
    id: u64,
    tool: PathBuf,
    args: Vec<String>,
    launch: Launch,
    tx: Sender<Action>,
    cancel: CancellationToken,
) {
    let credential = match launch {
        Launch::Sudo(mut secret) => {
            let checked = tokio::select! {
                res = elevation_test(&secret) => Some(res),
                _ = cancel.cancelled() => None,
            };
            match checked {
                Some(Ok(())) => Some(secret),
                // Whatever went wrong, the credential did not prove out.
                Some(Err(err)) => {
                    secret.wipe();
                    log::warn!("elevation self-test failed: {err}");
                    let _ = tx
                        .send(Action::SessionFailed(id, ScanError::AuthenticationFailed))
                        .await;
                    return;
                }
                None => {
                    secret.wipe();
                    let _ = tx.send(Action::SessionExited(id, ExitKind::Stopped)).await;
                    return;
                }
            }
        }
        Launch::Direct => None,
    };

    let mut cmd = match &credential {
        Some(_) => {
            let mut c = Command::new("sudo");
            c.arg("-S").arg(&tool).args(&args);
            c
        }
        None => {
            let mut c = Command::new(&tool);
            c.args(&args);
            c
        }
    };
    cmd.env(PATH_ENV, search_path())
        .stdin(if credential.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            let _ = tx
                .send(Action::SessionFailed(id, ScanError::ProcessStart(e.to_string())))
                .await;
            return;
        }
    };

    if let Some(mut secret) = credential {
        let fed = match child.stdin.take() {
            Some(mut stdin) => feed_credential(&mut stdin, &secret).await,
            None => Err(ScanError::Channel(String::from("stdin not captured"))),
        };
        // The credential's job ends with that write, success or not.
        secret.wipe();
        if let Err(err) = fed {
            let _ = child.start_kill();
            let _ = tx.send(Action::SessionFailed(id, err)).await;
            return;
        }
    }

    let _ = tx.send(Action::SessionStarted(id)).await;

    let outcome = tokio::select! {
        res = drive(&mut child, &tx, id) => Some(res),
        _ = cancel.cancelled() => None,
    };

    match outcome {
        Some(Ok(kind)) => {
            let _ = tx.send(Action::SessionExited(id, kind)).await;
        }
        Some(Err(err)) => {
            let _ = child.start_kill();
            let _ = tx.send(Action::SessionFailed(id, err)).await;
        }
        None => {
            let _ = child.start_kill();
            if timeout(STOP_KILL_WAIT, child.wait()).await.is_err() {
                log::warn!(
                    "scan subprocess ignored termination for {:?}; giving up the wait",
                    STOP_KILL_WAIT
                );
            }
            let _ = tx.send(Action::SessionExited(id, ExitKind::Stopped)).await;
        }
    }
}

/// Validate the credential with a privileged no-op before the real spawn.
/// `-k` defeats sudo's timestamp cache so the password itself is checked.
async fn elevation_test(secret: &Secret) -> Result<(), ScanError> {
    let mut child = Command::new("sudo")
        .args(["-S", "-k", "true"])
        .env(PATH_ENV, search_path())
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| ScanError::ProcessStart(e.to_string()))?;

    match child.stdin.take() {
        Some(mut stdin) => feed_credential(&mut stdin, secret).await?,
        None => return Err(ScanError::Channel(String::from("stdin not captured"))),
    }

    match timeout(AUTH_TEST_WAIT, child.wait()).await {
        Ok(Ok(status)) if status.success() => Ok(()),
        Ok(Ok(_)) => Err(ScanError::AuthenticationFailed),
        Ok(Err(e)) => Err(ScanError::Channel(e.to_string())),
        Err(_) => {
            let _ = child.start_kill();
            Err(ScanError::AuthenticationFailed)
        }
    }
}

/// Write the credential plus newline, then close the channel so the wrapper
/// stops waiting for input.
async fn feed_credential(stdin: &mut ChildStdin, secret: &Secret) -> Result<(), ScanError> {
    stdin
        .write_all(secret.expose().as_bytes())
        .await
        .map_err(|e| ScanError::Channel(e.to_string()))?;
    stdin
        .write_all(b"\n")
        .await
        .map_err(|e| ScanError::Channel(e.to_string()))?;
    stdin
        .shutdown()
        .await
        .map_err(|e| ScanError::Channel(e.to_string()))
}

/// Drain stdout and stderr line by line until both close, then reap the
/// child. Arrival order within each stream is preserved.
async fn drive(child: &mut Child, tx: &Sender<Action>, id: u64) -> Result<ExitKind, ScanError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| ScanError::Channel(String::from("stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| ScanError::Channel(String::from("stderr not captured")))?;
    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            line = out_lines.next_line(), if out_open => match line {
                Ok(Some(line)) => forward_line(tx, id, line).await,
                Ok(None) => out_open = false,
                Err(e) => return Err(ScanError::Channel(e.to_string())),
            },
            line = err_lines.next_line(), if err_open => match line {
                Ok(Some(line)) => forward_line(tx, id, line).await,
                Ok(None) => err_open = false,
                Err(e) => return Err(ScanError::Channel(e.to_string())),
            },
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| ScanError::Channel(e.to_string()))?;
    Ok(classify_exit(status))
}

async fn forward_line(tx: &Sender<Action>, id: u64, raw: String) {
    let line = strip_ansi_escapes::strip_str(&raw);
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return;
    }
    if tx.send(Action::SessionOutput(id, line.to_string())).await.is_err() {
        log::debug!("action channel closed while forwarding scan output");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn fake_tool(body: &str) -> (tempfile::TempDir, PathBuf) {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-netdiscover");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        (dir, path)
    }

    #[test]
    fn resolves_a_path_binary() {
        assert!(resolve_tool("sh").is_ok());
    }

    #[test]
    fn reports_missing_binaries() {
        let err = resolve_tool("definitely-not-a-scan-tool").unwrap_err();
        assert_eq!(
            err,
            ScanError::ToolNotFound(String::from("definitely-not-a-scan-tool"))
        );
    }

    #[tokio::test]
    async fn streams_lines_in_order_and_completes() {
        let (_dir, tool) = fake_tool("echo one\necho two\necho '  '\necho three");
        let (tx, mut rx) = mpsc::channel(1000);
        let cancel = CancellationToken::new();
        run_session(7, tool, Vec::new(), Launch::Direct, tx, cancel).await;

        assert_eq!(rx.recv().await, Some(Action::SessionStarted(7)));
        let mut lines = Vec::new();
        while let Some(action) = rx.recv().await {
            match action {
                Action::SessionOutput(7, line) => lines.push(line),
                Action::SessionExited(7, kind) => {
                    assert_eq!(kind, ExitKind::Completed);
                    break;
                }
                other => panic!("unexpected action: {:?}", other),
            }
        }
        // The blank line is dropped, order is preserved.
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn strips_ansi_escapes_from_output() {
        let (_dir, tool) = fake_tool("printf '\\033[1;32mfound\\033[0m host\\n'");
        let (tx, mut rx) = mpsc::channel(1000);
        run_session(1, tool, Vec::new(), Launch::Direct, tx, CancellationToken::new()).await;

        assert_eq!(rx.recv().await, Some(Action::SessionStarted(1)));
        assert_eq!(
            rx.recv().await,
            Some(Action::SessionOutput(1, String::from("found host")))
        );
    }

    #[tokio::test]
    async fn classifies_nonzero_exit() {
        let (_dir, tool) = fake_tool("exit 3");
        let (tx, mut rx) = mpsc::channel(1000);
        run_session(2, tool, Vec::new(), Launch::Direct, tx, CancellationToken::new()).await;

        assert_eq!(rx.recv().await, Some(Action::SessionStarted(2)));
        assert_eq!(rx.recv().await, Some(Action::SessionExited(2, ExitKind::Code(3))));
    }

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let (tx, mut rx) = mpsc::channel(1000);
        run_session(
            3,
            PathBuf::from("/nonexistent/fake-netdiscover"),
            Vec::new(),
            Launch::Direct,
            tx,
            CancellationToken::new(),
        )
        .await;

        match rx.recv().await {
            Some(Action::SessionFailed(3, ScanError::ProcessStart(_))) => {}
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[tokio::test]
    async fn cancellation_kills_the_child_within_the_bound() {
        let (_dir, tool) = fake_tool("sleep 30");
        let (tx, mut rx) = mpsc::channel(1000);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_session(
            4,
            tool,
            Vec::new(),
            Launch::Direct,
            tx,
            cancel.clone(),
        ));

        assert_eq!(rx.recv().await, Some(Action::SessionStarted(4)));
        cancel.cancel();
        let exited = timeout(STOP_KILL_WAIT + Duration::from_secs(1), rx.recv())
            .await
            .expect("stop did not complete within the bounded wait");
        assert_eq!(exited, Some(Action::SessionExited(4, ExitKind::Stopped)));
        task.await.unwrap();
    }
}
