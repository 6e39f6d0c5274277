//! Action-based messaging for component communication.
//!
//! Every state change in the application flows through the [`Action`] enum:
//! user requests (start/stop/clear), configuration updates from the form,
//! credential hand-off from the password prompt, and the session events
//! reported by the subprocess runner task. Actions are processed in the main
//! event loop and routed to every component's `update()` method, so
//! components never call each other directly.
//!
//! Session events carry the id of the session that produced them; the
//! controller ignores ids that do not match the current session, which keeps
//! a superseded scan from writing into its successor's transcript.
//!
//! Actions can be deserialized from strings for use in the keybindings
//! configuration file, e.g. `"StartScan"` -> `Action::StartScan`.

use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use std::fmt;

use crate::{
    enums::{ExitKind, ScanState},
    mode::Mode,
    scan::{ScanConfig, ScanError},
    secret::Secret,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Logic update tick - sent at tick_rate Hz
    Tick,
    /// Render frame - sent at frame_rate Hz
    Render,
    /// Terminal resized to new dimensions (width, height)
    Resize(u16, u16),
    /// Suspend application (Unix SIGTSTP)
    Suspend,
    /// Resume after suspension
    Resume,
    /// Request graceful shutdown
    Quit,
    /// Begin shutdown sequence for all components
    Shutdown,
    /// Refresh UI
    Refresh,
    /// Fatal error occurred, display message and quit
    Error(String),
    /// Show help information
    Help,

    // -- navigation
    /// Move form focus up
    Up,
    /// Move form focus down
    Down,
    /// Adjust the focused form field towards its previous value
    Left,
    /// Adjust the focused form field towards its next value
    Right,
    /// Focus the next form field
    NextField,
    /// Focus the previous form field
    PrevField,
    /// Scroll the transcript up one page
    ScrollUp,
    /// Scroll the transcript down one page
    ScrollDown,
    /// Change the input mode (normal / field editing / password prompt)
    ModeChange(Mode),

    // -- scan lifecycle requests
    /// Begin a scan with the current configuration
    StartScan,
    /// Terminate the running scan
    StopScan,
    /// Reset the transcript to its placeholder
    ClearResults,

    // -- configuration and credentials
    /// The form's current values changed
    ConfigChanged(ScanConfig),
    /// Password entered in the prompt
    CredentialSubmit(Secret),
    /// Password prompt dismissed
    CredentialCancel,

    // -- session events from the runner task
    /// Subprocess spawned, credential written, input closed
    SessionStarted(u64),
    /// One line of subprocess output (id, line)
    SessionOutput(u64, String),
    /// Subprocess exited (id, classification)
    SessionExited(u64, ExitKind),
    /// Session could not run to an exit (id, reason)
    SessionFailed(u64, ScanError),

    // -- presentation
    /// Lifecycle state changed; drives control enablement and the throbber
    ScanStateChanged(ScanState),
    /// Append one line to the transcript view
    TranscriptLine(String),
    /// Replace the status line
    StatusChange(String),
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ActionVisitor;

        impl<'de> Visitor<'de> for ActionVisitor {
            type Value = Action;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a valid string representation of Action")
            }

            fn visit_str<E>(self, value: &str) -> Result<Action, E>
            where
                E: de::Error,
            {
                match value {
                    // -- custom actions
                    "StartScan" => Ok(Action::StartScan),
                    "StopScan" => Ok(Action::StopScan),
                    "ClearResults" => Ok(Action::ClearResults),
                    "InputMode" => Ok(Action::ModeChange(Mode::Input)),
                    "NormalMode" => Ok(Action::ModeChange(Mode::Normal)),
                    "NextField" => Ok(Action::NextField),
                    "PrevField" => Ok(Action::PrevField),
                    "ScrollUp" => Ok(Action::ScrollUp),
                    "ScrollDown" => Ok(Action::ScrollDown),
                    "Up" => Ok(Action::Up),
                    "Down" => Ok(Action::Down),
                    "Left" => Ok(Action::Left),
                    "Right" => Ok(Action::Right),

                    // -- default actions
                    "Tick" => Ok(Action::Tick),
                    "Render" => Ok(Action::Render),
                    "Suspend" => Ok(Action::Suspend),
                    "Resume" => Ok(Action::Resume),
                    "Quit" => Ok(Action::Quit),
                    "Refresh" => Ok(Action::Refresh),
                    "Help" => Ok(Action::Help),
                    data if data.starts_with("Error(") => {
                        let error_msg = data.trim_start_matches("Error(").trim_end_matches(')');
                        Ok(Action::Error(error_msg.to_string()))
                    }
                    data if data.starts_with("Resize(") => {
                        let parts: Vec<&str> = data
                            .trim_start_matches("Resize(")
                            .trim_end_matches(')')
                            .split(',')
                            .collect();
                        if parts.len() == 2 {
                            let width: u16 = parts[0].trim().parse().map_err(E::custom)?;
                            let height: u16 = parts[1].trim().parse().map_err(E::custom)?;
                            Ok(Action::Resize(width, height))
                        } else {
                            Err(E::custom(format!("Invalid Resize format: {}", value)))
                        }
                    }
                    _ => Err(E::custom(format!("Unknown Action variant: {}", value))),
                }
            }
        }

        deserializer.deserialize_str(ActionVisitor)
    }
}
