use std::path::PathBuf;

use chrono::Local;
use color_eyre::eyre::Result;
use ratatui::prelude::Rect;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;

use super::Component;
use crate::{
    action::Action,
    enums::{ExitKind, ScanState},
    privilege,
    runner::{self, Launch},
    scan::{is_prompt_noise, ScanConfig, ScanError},
    tui::Frame,
};

const STOP_MARKER: &str = "=== Scan Stopped ===";

/// One run of the external tool. Replaced wholesale on every start so no
/// state from a previous run leaks into the next; subprocess events carry
/// the id and are ignored once the session is superseded.
#[derive(Debug)]
struct ScanSession {
    id: u64,
    config: ScanConfig,
    tool: PathBuf,
    elevated: bool,
    state: ScanState,
    transcript: Vec<String>,
    cancel: CancellationToken,
}

/// The scan-session controller. Owns the lifecycle state machine and the
/// session transcript; turns start/stop/clear requests and runner events
/// into presentation actions. Draws nothing itself.
pub struct Session {
    action_tx: Option<Sender<Action>>,
    tool: String,
    force_direct: bool,
    config: ScanConfig,
    session: Option<ScanSession>,
    next_id: u64,
    pending_start: bool,
}

impl Session {
    pub fn new(tool: String, force_direct: bool) -> Self {
        Self {
            action_tx: None,
            tool,
            force_direct,
            config: ScanConfig::default(),
            session: None,
            next_id: 1,
            pending_start: false,
        }
    }

    fn state(&self) -> ScanState {
        self.session.as_ref().map(|s| s.state).unwrap_or_default()
    }

    fn send(&self, action: Action) {
        if let Some(tx) = &self.action_tx {
            if let Err(e) = tx.try_send(action) {
                log::error!("failed to send action from scan controller: {e:?}");
            }
        }
    }

    /// Append a line to the current session's transcript and the view.
    fn append_line(&mut self, line: String) {
        if let Some(session) = self.session.as_mut() {
            session.transcript.push(line.clone());
        }
        self.send(Action::TranscriptLine(line));
    }

    fn set_state(&mut self, state: ScanState) {
        if let Some(session) = self.session.as_mut() {
            session.state = state;
        }
        self.send(Action::ScanStateChanged(state));
        self.send(Action::StatusChange(state.to_string()));
    }

    fn is_current(&self, id: u64) -> bool {
        self.session.as_ref().map(|s| s.id == id).unwrap_or(false)
    }

    fn request_start(&mut self) {
        match self.state() {
            // Popup open, nothing spawned yet; discard and restart.
            ScanState::AwaitingAuth => {
                self.session = None;
                self.send(Action::ScanStateChanged(ScanState::Idle));
            }
            // A subprocess is (or is about to be) alive. Stop it and defer
            // the new start until its exit event arrives; the runner's
            // bounded kill-wait guarantees that event, so two children are
            // never alive at once.
            ScanState::Authenticating | ScanState::Running => {
                if let Some(session) = self.session.as_ref() {
                    log::info!("scan {} still active; stopping it before restart", session.id);
                    session.cancel.cancel();
                }
                self.pending_start = true;
                return;
            }
            _ => {}
        }
        self.launch_new();
    }

    fn launch_new(&mut self) {
        if let Err(err) = self.config.validate() {
            self.append_line(format!("Error: {}", err));
            self.send(Action::StatusChange(String::from("Invalid target")));
            return;
        }
        let tool = match runner::resolve_tool(&self.tool) {
            Ok(tool) => tool,
            Err(err) => {
                self.append_line(format!("Error: {}", err));
                self.send(Action::StatusChange(String::from("Scanner not found")));
                return;
            }
        };

        let elevated = !self.force_direct && !privilege::is_root();
        let id = self.next_id;
        self.next_id += 1;
        self.session = Some(ScanSession {
            id,
            config: self.config.clone(),
            tool,
            elevated,
            state: ScanState::Idle,
            transcript: Vec::new(),
            cancel: CancellationToken::new(),
        });

        if elevated {
            self.set_state(ScanState::AwaitingAuth);
        } else {
            self.append_header();
            self.set_state(ScanState::Running);
            self.spawn(Launch::Direct);
        }
    }

    /// Scan parameters echoed at the top of each session's transcript.
    fn append_header(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let config = &session.config;
        let mut lines = vec![
            format!("=== Starting {} ===", config.mode),
            format!("Started: {}", Local::now().format("%Y-%m-%d %H:%M:%S")),
        ];
        match config.range() {
            Some(range) => {
                let addresses = 1u64 << (32 - u32::from(range.network_length()));
                lines.push(format!("Target: {} ({} addresses)", config.full_target(), addresses));
            }
            None => lines.push(format!("Target: {}", config.full_target())),
        }
        lines.push(format!("Timeout: {} ms", config.timeout_ms));
        lines.push(format!(
            "No DNS Resolution: {}",
            if config.no_resolve { "Yes" } else { "No" }
        ));
        if let Some(path) = &config.output_path {
            lines.push(format!("Output File: {}", path));
        }
        lines.push(format!(
            "Command: {}",
            config.display_command(&self.tool, session.elevated)
        ));
        lines.push(String::from("Scanning in progress..."));
        for line in lines {
            self.append_line(line);
        }
    }

    fn spawn(&mut self, launch: Launch) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(tx) = self.action_tx.clone() else {
            return;
        };
        tokio::spawn(runner::run_session(
            session.id,
            session.tool.clone(),
            session.config.scan_args(),
            launch,
            tx,
            session.cancel.clone(),
        ));
    }

    fn request_stop(&mut self) {
        self.append_line(String::from(STOP_MARKER));
        match self.state() {
            ScanState::AwaitingAuth => self.set_state(ScanState::Stopped),
            ScanState::Authenticating | ScanState::Running => {
                if let Some(session) = self.session.as_ref() {
                    session.cancel.cancel();
                }
                self.set_state(ScanState::Stopped);
            }
            _ => self.send(Action::StatusChange(ScanState::Stopped.to_string())),
        }
    }

    fn on_started(&mut self, id: u64) {
        if !self.is_current(id) {
            return;
        }
        if self.state() != ScanState::Running {
            self.set_state(ScanState::Running);
        }
    }

    fn on_output(&mut self, id: u64, line: String) {
        if !self.is_current(id) {
            log::debug!("dropping output from superseded session {id}");
            return;
        }
        // Password-prompt chatter belongs to the elevation handshake only;
        // identical text later in the run is real output.
        if self.state() == ScanState::Authenticating && is_prompt_noise(&line) {
            log::debug!("filtered elevation prompt noise");
            return;
        }
        self.append_line(line);
    }

    fn on_failed(&mut self, id: u64, err: ScanError) {
        if !self.is_current(id) {
            return;
        }
        self.append_line(format!("Error: {}", err));
        if err == ScanError::AuthenticationFailed {
            self.append_line(privilege::elevation_hint(&self.tool));
        }
        self.set_state(ScanState::Failed);
        self.start_pending();
    }

    fn on_exited(&mut self, id: u64, kind: ExitKind) {
        if !self.is_current(id) {
            return;
        }
        match kind {
            ExitKind::Completed => {
                self.write_output();
                self.set_state(ScanState::Completed);
            }
            ExitKind::Code(code) => {
                self.append_line(format!("Error: {}", ScanError::ExitedNonZero(code)));
                self.set_state(ScanState::Failed);
            }
            ExitKind::Crashed => {
                self.append_line(format!("Error: {}", ScanError::Crashed));
                self.set_state(ScanState::Failed);
            }
            // An explicit stop already moved the state machine on; this is
            // the runner confirming the child is gone.
            ExitKind::Stopped => {
                if self.state().is_active() {
                    self.set_state(ScanState::Stopped);
                }
            }
        }
        self.start_pending();
    }

    fn start_pending(&mut self) {
        if self.pending_start {
            self.pending_start = false;
            self.launch_new();
        }
    }

    /// Persist the transcript after a clean exit. A write failure is a
    /// transcript note, not a session failure.
    fn write_output(&mut self) {
        let Some(path) = self
            .session
            .as_ref()
            .and_then(|s| s.config.output_path.clone())
        else {
            return;
        };
        let text = self
            .session
            .as_ref()
            .map(|s| s.transcript.join("\n") + "\n")
            .unwrap_or_default();
        match std::fs::write(&path, text) {
            Ok(()) => self.append_line(format!("Results written to {}", path)),
            Err(e) => {
                let err = ScanError::OutputWrite(e.to_string());
                self.append_line(format!("Warning: {}", err));
            }
        }
    }
}

impl Component for Session {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.action_tx = Some(tx);
        Ok(())
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::ConfigChanged(config) => self.config = config,
            Action::StartScan => self.request_start(),
            Action::StopScan => self.request_stop(),
            Action::ClearResults => {
                if let Some(session) = self.session.as_mut() {
                    session.transcript.clear();
                }
                self.send(Action::StatusChange(ScanState::Idle.to_string()));
            }
            Action::CredentialSubmit(secret) => {
                if self.state() == ScanState::AwaitingAuth {
                    self.set_state(ScanState::Authenticating);
                    self.append_header();
                    self.spawn(Launch::Sudo(secret));
                }
                // A stale secret is wiped when it drops here.
            }
            Action::CredentialCancel => {
                if self.state() == ScanState::AwaitingAuth {
                    // Back to idle with no side effects.
                    self.session = None;
                    self.send(Action::ScanStateChanged(ScanState::Idle));
                    self.send(Action::StatusChange(ScanState::Idle.to_string()));
                }
            }
            Action::SessionStarted(id) => self.on_started(id),
            Action::SessionOutput(id, line) => self.on_output(id, line),
            Action::SessionFailed(id, err) => self.on_failed(id, err),
            Action::SessionExited(id, kind) => self.on_exited(id, kind),
            Action::Quit | Action::Shutdown => {
                if let Some(session) = self.session.as_ref() {
                    session.cancel.cancel();
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, _f: &mut Frame<'_>, _area: Rect) -> Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        if let Some(session) = self.session.as_ref() {
            session.cancel.cancel();
        }
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::secret::Secret;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::{self, Receiver};

    fn controller(tool: &str) -> (Session, Receiver<Action>) {
        let (tx, rx) = mpsc::channel(1000);
        let mut session = Session::new(tool.to_string(), true);
        session.register_action_handler(tx).unwrap();
        (session, rx)
    }

    fn forged(session: &mut Session, id: u64, state: ScanState) {
        session.session = Some(ScanSession {
            id,
            config: session.config.clone(),
            tool: PathBuf::from("/bin/true"),
            elevated: true,
            state,
            transcript: Vec::new(),
            cancel: CancellationToken::new(),
        });
    }

    fn fake_tool(body: &str) -> (tempfile::TempDir, String) {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake-netdiscover");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        let tool = path.to_string_lossy().to_string();
        (dir, tool)
    }

    fn transcript_lines(rx: &mut Receiver<Action>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(action) = rx.try_recv() {
            if let Action::TranscriptLine(line) = action {
                lines.push(line);
            }
        }
        lines
    }

    #[tokio::test]
    async fn blank_target_reports_once_and_stays_idle() {
        let (mut session, mut rx) = controller("echo");
        let mut config = ScanConfig::default();
        config.target = String::from("   ");
        session.update(Action::ConfigChanged(config)).unwrap();
        session.update(Action::StartScan).unwrap();

        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.session.is_none());
        let errors: Vec<String> = transcript_lines(&mut rx)
            .into_iter()
            .filter(|l| l.starts_with("Error:"))
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("no target"));
    }

    #[tokio::test]
    async fn missing_tool_is_reported_and_leaves_idle() {
        let (mut session, mut rx) = controller("definitely-not-a-scan-tool");
        session.update(Action::StartScan).unwrap();

        assert_eq!(session.state(), ScanState::Idle);
        let lines = transcript_lines(&mut rx);
        assert!(lines.iter().any(|l| l.contains("not found")));
    }

    #[tokio::test]
    async fn direct_scan_completes_and_writes_the_transcript() {
        let (_dir, tool) = fake_tool("echo 192.168.1.17 aa:bb:cc:dd:ee:ff");
        let out = tempfile::NamedTempFile::new().unwrap();
        let out_path = out.path().to_string_lossy().to_string();

        let (mut session, mut rx) = controller(&tool);
        let mut config = ScanConfig::default();
        config.output_path = Some(out_path.clone());
        session.update(Action::ConfigChanged(config)).unwrap();
        session.update(Action::StartScan).unwrap();
        assert_eq!(session.state(), ScanState::Running);

        // Feed the runner's events back through the controller, the way the
        // app loop routes them.
        while session.state() != ScanState::Completed {
            match rx.recv().await.expect("runner hung up") {
                action @ (Action::SessionStarted(_)
                | Action::SessionOutput(..)
                | Action::SessionExited(..)
                | Action::SessionFailed(..)) => {
                    session.update(action).unwrap();
                }
                _ => {}
            }
        }

        let written = std::fs::read_to_string(&out_path).unwrap();
        assert!(written.starts_with("=== Starting ARP Scan ==="));
        assert!(written.contains("192.168.1.17 aa:bb:cc:dd:ee:ff"));
        assert!(written.ends_with('\n'));
        // The post-write note is not part of the file.
        assert!(!written.contains("Results written"));
    }

    #[tokio::test]
    async fn nonzero_exit_fails_and_skips_the_file_write() {
        let (_dir, tool) = fake_tool("exit 3");
        let out_dir = tempfile::tempdir().unwrap();
        let out_path = out_dir.path().join("results.txt").to_string_lossy().to_string();

        let (mut session, mut rx) = controller(&tool);
        let mut config = ScanConfig::default();
        config.output_path = Some(out_path.clone());
        session.update(Action::ConfigChanged(config)).unwrap();
        session.update(Action::StartScan).unwrap();

        while session.state() != ScanState::Failed {
            match rx.recv().await.expect("runner hung up") {
                action @ (Action::SessionStarted(_)
                | Action::SessionOutput(..)
                | Action::SessionExited(..)
                | Action::SessionFailed(..)) => {
                    session.update(action).unwrap();
                }
                _ => {}
            }
        }

        assert!(!std::path::Path::new(&out_path).exists());
        let lines = transcript_lines(&mut rx);
        assert!(lines.iter().any(|l| l.contains("exited with code 3")));
    }

    #[tokio::test]
    async fn stop_appends_the_marker_exactly_once() {
        let (_dir, tool) = fake_tool("sleep 30");
        let (mut session, mut rx) = controller(&tool);
        session.update(Action::StartScan).unwrap();
        assert_eq!(session.state(), ScanState::Running);

        session.update(Action::StopScan).unwrap();
        assert_eq!(session.state(), ScanState::Stopped);

        // The runner confirms the kill within the bounded wait.
        let confirmed = tokio::time::timeout(runner::STOP_KILL_WAIT * 2, async {
            loop {
                match rx.recv().await.expect("runner hung up") {
                    action @ Action::SessionExited(..) => {
                        session.update(action).unwrap();
                        break;
                    }
                    _ => {}
                }
            }
        })
        .await;
        assert!(confirmed.is_ok(), "stop did not confirm within the bound");
        assert_eq!(session.state(), ScanState::Stopped);

        let markers = session
            .session
            .as_ref()
            .unwrap()
            .transcript
            .iter()
            .filter(|l| l.as_str() == STOP_MARKER)
            .count();
        assert_eq!(markers, 1);
    }

    #[tokio::test]
    async fn restart_waits_for_the_previous_session_to_die() {
        let (_dir, tool) = fake_tool("sleep 30");
        let (mut session, mut rx) = controller(&tool);
        session.update(Action::StartScan).unwrap();
        let first_id = session.session.as_ref().unwrap().id;

        session.update(Action::StartScan).unwrap();
        // Still the first session; the new one is deferred.
        assert_eq!(session.session.as_ref().unwrap().id, first_id);
        assert!(session.pending_start);

        loop {
            match rx.recv().await.expect("runner hung up") {
                Action::SessionExited(id, kind) if id == first_id => {
                    assert_eq!(kind, ExitKind::Stopped);
                    session.update(Action::SessionExited(id, kind)).unwrap();
                    break;
                }
                _ => {}
            }
        }

        let second = session.session.as_ref().unwrap();
        assert!(second.id > first_id);
        assert_eq!(second.state, ScanState::Running);
        assert!(!session.pending_start);
    }

    #[tokio::test]
    async fn prompt_noise_is_filtered_only_while_authenticating() {
        let (mut session, _rx) = controller("echo");
        forged(&mut session, 9, ScanState::Authenticating);

        session
            .update(Action::SessionOutput(9, String::from("[sudo] password for chleba:")))
            .unwrap();
        session
            .update(Action::SessionOutput(9, String::from("scan line one")))
            .unwrap();
        assert_eq!(
            session.session.as_ref().unwrap().transcript,
            vec![String::from("scan line one")]
        );

        session.session.as_mut().unwrap().state = ScanState::Running;
        session
            .update(Action::SessionOutput(9, String::from("[sudo] password for chleba:")))
            .unwrap();
        assert_eq!(session.session.as_ref().unwrap().transcript.len(), 2);
    }

    #[tokio::test]
    async fn credential_cancel_returns_to_idle() {
        let (mut session, mut rx) = controller("echo");
        forged(&mut session, 3, ScanState::AwaitingAuth);

        session.update(Action::CredentialCancel).unwrap();
        assert_eq!(session.state(), ScanState::Idle);
        assert!(session.session.is_none());
        assert!(transcript_lines(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn stale_credential_submit_is_dropped() {
        let (mut session, _rx) = controller("echo");
        forged(&mut session, 3, ScanState::Running);

        session
            .update(Action::CredentialSubmit(Secret::new(String::from("pw"))))
            .unwrap();
        assert_eq!(session.state(), ScanState::Running);
    }

    #[tokio::test]
    async fn superseded_session_events_are_ignored() {
        let (mut session, _rx) = controller("echo");
        forged(&mut session, 5, ScanState::Running);

        session
            .update(Action::SessionOutput(4, String::from("late line")))
            .unwrap();
        assert!(session.session.as_ref().unwrap().transcript.is_empty());

        session.update(Action::SessionExited(4, ExitKind::Crashed)).unwrap();
        assert_eq!(session.state(), ScanState::Running);
    }
}
