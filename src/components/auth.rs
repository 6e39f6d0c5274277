use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{prelude::*, widgets::*};
use tokio::sync::mpsc::Sender;

use super::Component;
use crate::{
    action::Action,
    config::DEFAULT_BORDER_STYLE,
    enums::ScanState,
    layout::get_popup_rect,
    mode::Mode,
    secret::Secret,
    tui::Frame,
};

const POPUP_WIDTH: u16 = 44;
const POPUP_HEIGHT: u16 = 3;

/// Password prompt for the elevation wrapper. Shown while the controller
/// waits for a credential; the typed characters are kept in a buffer that is
/// zeroed before release, and the display only ever shows mask characters.
#[derive(Default)]
pub struct Auth {
    action_tx: Option<Sender<Action>>,
    buf: String,
    active: bool,
}

impl Auth {
    pub fn new() -> Self {
        Self::default()
    }

    fn send(&self, action: Action) {
        if let Some(tx) = &self.action_tx {
            if let Err(e) = tx.try_send(action) {
                log::error!("failed to send action from auth prompt: {e:?}");
            }
        }
    }

    /// Zero the typed characters before dropping them.
    fn wipe_buf(&mut self) {
        unsafe {
            for b in self.buf.as_bytes_mut() {
                *b = 0;
            }
        }
        self.buf.clear();
    }
}

impl Component for Auth {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.action_tx = Some(tx);
        Ok(())
    }

    fn handle_key_events(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if !self.active {
            return Ok(None);
        }
        match key.code {
            KeyCode::Enter => {
                let secret = Secret::new(std::mem::take(&mut self.buf));
                self.active = false;
                self.send(Action::CredentialSubmit(secret));
                Ok(Some(Action::ModeChange(Mode::Normal)))
            }
            KeyCode::Esc => {
                self.wipe_buf();
                self.active = false;
                self.send(Action::CredentialCancel);
                Ok(Some(Action::ModeChange(Mode::Normal)))
            }
            KeyCode::Backspace => {
                self.buf.pop();
                Ok(None)
            }
            KeyCode::Char(c) => {
                self.buf.push(c);
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        if let Action::ScanStateChanged(state) = action {
            match state {
                ScanState::AwaitingAuth => {
                    self.wipe_buf();
                    self.active = true;
                    return Ok(Some(Action::ModeChange(Mode::Auth)));
                }
                // The session moved on without us (stop or restart).
                _ if self.active => {
                    self.wipe_buf();
                    self.active = false;
                    return Ok(Some(Action::ModeChange(Mode::Normal)));
                }
                _ => {}
            }
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, area: Rect) -> Result<()> {
        if !self.active {
            return Ok(());
        }
        let rect = get_popup_rect(area, POPUP_WIDTH, POPUP_HEIGHT);
        f.render_widget(Clear, rect);

        let masked = "\u{2022}".repeat(self.buf.chars().count());
        let prompt = Paragraph::new(masked)
            .style(Style::default().fg(Color::Yellow))
            .block(
                Block::default()
                    .title("|sudo password|".yellow())
                    .title(
                        block::Title::from(Line::from(vec![
                            "|".yellow(),
                            "Enter".red().bold(),
                            "|run |".yellow(),
                            "Esc".red().bold(),
                            "|cancel|".yellow(),
                        ]))
                        .alignment(Alignment::Right)
                        .position(block::Position::Bottom),
                    )
                    .borders(Borders::ALL)
                    .border_type(DEFAULT_BORDER_STYLE)
                    .border_style(Style::default().fg(Color::Green))
                    .padding(Padding::new(1, 1, 0, 0)),
            );
        f.render_widget(prompt, rect);
        f.set_cursor(
            rect.x + 2 + self.buf.chars().count() as u16,
            rect.y + 1,
        );
        Ok(())
    }

    fn shutdown(&mut self) -> Result<()> {
        self.wipe_buf();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awaiting_auth_activates_the_prompt() {
        let mut auth = Auth::new();
        let action = auth
            .update(Action::ScanStateChanged(ScanState::AwaitingAuth))
            .unwrap();
        assert!(auth.active);
        assert_eq!(action, Some(Action::ModeChange(Mode::Auth)));
    }

    #[test]
    fn submit_hands_off_and_clears_the_buffer() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let mut auth = Auth::new();
        auth.register_action_handler(tx).unwrap();
        auth.update(Action::ScanStateChanged(ScanState::AwaitingAuth)).unwrap();

        for c in "hunter2".chars() {
            auth.handle_key_events(KeyEvent::from(KeyCode::Char(c))).unwrap();
        }
        let action = auth.handle_key_events(KeyEvent::from(KeyCode::Enter)).unwrap();

        assert_eq!(action, Some(Action::ModeChange(Mode::Normal)));
        assert!(auth.buf.is_empty());
        assert!(!auth.active);
        match rx.try_recv() {
            Ok(Action::CredentialSubmit(secret)) => assert_eq!(secret.expose(), "hunter2"),
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn escape_cancels_without_leaking() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let mut auth = Auth::new();
        auth.register_action_handler(tx).unwrap();
        auth.update(Action::ScanStateChanged(ScanState::AwaitingAuth)).unwrap();

        auth.handle_key_events(KeyEvent::from(KeyCode::Char('x'))).unwrap();
        auth.handle_key_events(KeyEvent::from(KeyCode::Esc)).unwrap();

        assert!(auth.buf.is_empty());
        match rx.try_recv() {
            Ok(Action::CredentialCancel) => {}
            other => panic!("unexpected action: {:?}", other),
        }
    }
}
