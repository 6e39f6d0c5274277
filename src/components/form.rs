use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{prelude::*, widgets::*};
use strum::{Display, EnumCount, FromRepr};
use tokio::sync::mpsc::Sender;
use tui_input::backend::crossterm::EventHandler;
use tui_input::Input;

use super::Component;
use crate::{
    action::Action,
    config::DEFAULT_BORDER_STYLE,
    enums::{CidrSuffix, ScanMode, ScanState},
    layout::get_app_layout,
    mode::Mode,
    scan::ScanConfig,
    tui::Frame,
};

const TIMEOUT_STEP: u64 = 100;
const TIMEOUT_MIN: u64 = 100;
const TIMEOUT_MAX: u64 = 10000;

#[derive(Default, Clone, Copy, Display, FromRepr, EnumCount, PartialEq, Debug)]
enum Field {
    #[default]
    #[strum(to_string = "Target Network/IP")]
    Target,
    #[strum(to_string = "CIDR")]
    Cidr,
    #[strum(to_string = "Scan Type")]
    ScanType,
    #[strum(to_string = "Timeout")]
    Timeout,
    #[strum(to_string = "No DNS resolution (-n)")]
    NoResolve,
    #[strum(to_string = "Output File")]
    OutputFile,
}

impl Field {
    fn previous(&self) -> Self {
        let current_index: usize = *self as usize;
        let previous_index = current_index.saturating_sub(1);
        Self::from_repr(previous_index).unwrap_or(*self)
    }

    fn next(&self) -> Self {
        let current_index = *self as usize;
        let next_index = (current_index + 1) % Field::COUNT;
        Self::from_repr(next_index).unwrap_or(*self)
    }

    fn is_text(&self) -> bool {
        matches!(self, Field::Target | Field::OutputFile)
    }
}

/// The configuration form. Keeps the editable scan parameters and tells the
/// controller about every change, so a start request always uses current
/// values.
pub struct Form {
    action_tx: Option<Sender<Action>>,
    target: Input,
    output_file: Input,
    cidr: CidrSuffix,
    scan_mode: ScanMode,
    timeout_ms: u64,
    no_resolve: bool,
    focus: Field,
    mode: Mode,
    scan_state: ScanState,
}

impl Default for Form {
    fn default() -> Self {
        Self::new()
    }
}

impl Form {
    pub fn new() -> Self {
        Self {
            action_tx: None,
            target: Input::default().with_value(String::from("192.168.1.0")),
            output_file: Input::default(),
            cidr: CidrSuffix::default(),
            scan_mode: ScanMode::default(),
            timeout_ms: 1000,
            no_resolve: true,
            focus: Field::default(),
            mode: Mode::Normal,
            scan_state: ScanState::Idle,
        }
    }

    fn config(&self) -> ScanConfig {
        let output = self.output_file.value().trim();
        ScanConfig {
            target: self.target.value().to_string(),
            cidr: self.cidr,
            mode: self.scan_mode,
            no_resolve: self.no_resolve,
            timeout_ms: self.timeout_ms,
            output_path: if output.is_empty() {
                None
            } else {
                Some(output.to_string())
            },
        }
    }

    fn emit_config(&self) {
        if let Some(tx) = &self.action_tx {
            if let Err(e) = tx.try_send(Action::ConfigChanged(self.config())) {
                log::error!("failed to send form configuration: {e:?}");
            }
        }
    }

    /// Left/Right adjust the focused field in place.
    fn adjust(&mut self, forward: bool) {
        match self.focus {
            Field::Cidr => {
                self.cidr = if forward {
                    self.cidr.next()
                } else {
                    self.cidr.previous()
                }
            }
            Field::ScanType => {
                self.scan_mode = if forward {
                    self.scan_mode.next()
                } else {
                    self.scan_mode.previous()
                }
            }
            Field::Timeout => {
                self.timeout_ms = if forward {
                    (self.timeout_ms + TIMEOUT_STEP).min(TIMEOUT_MAX)
                } else {
                    self.timeout_ms.saturating_sub(TIMEOUT_STEP).max(TIMEOUT_MIN)
                }
            }
            Field::NoResolve => self.no_resolve = !self.no_resolve,
            Field::Target | Field::OutputFile => return,
        }
        self.emit_config();
    }

    fn focused_input(&mut self) -> Option<&mut Input> {
        match self.focus {
            Field::Target => Some(&mut self.target),
            Field::OutputFile => Some(&mut self.output_file),
            _ => None,
        }
    }

    fn field_style(&self, field: Field) -> Style {
        if self.focus == field {
            match self.mode {
                Mode::Input => Style::default().fg(Color::Green).bold(),
                _ => Style::default().fg(Color::Green),
            }
        } else {
            Style::default().fg(Color::Yellow)
        }
    }

    fn label_style(&self) -> Style {
        Style::default().fg(Color::Gray)
    }

    fn make_form(&self) -> Paragraph {
        let label = self.label_style();
        let lines = vec![
            Line::from(vec![
                Span::styled("Target Network/IP: ", label),
                Span::styled(format!("{:<24}", self.target.value()), self.field_style(Field::Target)),
                Span::styled("  CIDR: ", label),
                Span::styled(self.cidr.to_string(), self.field_style(Field::Cidr)),
            ]),
            Line::from(vec![
                Span::styled("Scan Type: ", label),
                Span::styled(format!("{:<24}", self.scan_mode.to_string()), self.field_style(Field::ScanType)),
                Span::styled("  Timeout: ", label),
                Span::styled(format!("{} ms", self.timeout_ms), self.field_style(Field::Timeout)),
            ]),
            Line::from(vec![
                Span::styled(
                    if self.no_resolve { "[x] " } else { "[ ] " },
                    self.field_style(Field::NoResolve),
                ),
                Span::styled("No DNS resolution (-n)", self.field_style(Field::NoResolve)),
            ]),
            Line::from(vec![
                Span::styled("Output File: ", label),
                Span::styled(
                    if self.output_file.value().is_empty() && self.focus != Field::OutputFile {
                        String::from("(optional: /path/to/output.txt)")
                    } else {
                        self.output_file.value().to_string()
                    },
                    self.field_style(Field::OutputFile),
                ),
            ]),
        ];

        let hint = block::Title::from(Line::from(vec![
            "|".yellow(),
            "Tab".red().bold(),
            "|fields |".yellow(),
            "\u{2190}\u{2192}".red().bold(),
            "|adjust |".yellow(),
            "i".red().bold(),
            "|edit|".yellow(),
        ]))
        .alignment(Alignment::Right);

        // Green border while a session is live, mirroring the progress bar
        // of the desktop original.
        let border = if self.scan_state.is_active() {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Rgb(100, 100, 100))
        };

        Paragraph::new(lines).block(
            Block::default()
                .title("|Target Configuration|".yellow())
                .title(hint)
                .borders(Borders::ALL)
                .border_type(DEFAULT_BORDER_STYLE)
                .border_style(border)
                .padding(Padding::new(1, 1, 1, 0)),
        )
    }
}

impl Component for Form {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.action_tx = Some(tx);
        Ok(())
    }

    fn init(&mut self, _area: Rect) -> Result<()> {
        // Seed the controller with the defaults before any editing happens.
        self.emit_config();
        Ok(())
    }

    fn handle_key_events(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.mode != Mode::Input {
            return Ok(None);
        }
        match key.code {
            KeyCode::Enter | KeyCode::Esc => {
                self.emit_config();
                Ok(Some(Action::ModeChange(Mode::Normal)))
            }
            _ => {
                if let Some(input) = self.focused_input() {
                    input.handle_event(&crossterm::event::Event::Key(key));
                }
                self.emit_config();
                Ok(None)
            }
        }
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::ModeChange(mode) => {
                if mode == Mode::Input && !self.focus.is_text() {
                    // Selector fields have nothing to type into; treat the
                    // edit request as "cycle to the next value".
                    self.adjust(true);
                    self.mode = Mode::Normal;
                    return Ok(Some(Action::ModeChange(Mode::Normal)));
                }
                self.mode = mode;
            }
            Action::NextField | Action::Down => {
                if self.mode == Mode::Normal {
                    self.focus = self.focus.next();
                }
            }
            Action::PrevField | Action::Up => {
                if self.mode == Mode::Normal {
                    self.focus = self.focus.previous();
                }
            }
            Action::Left => {
                if self.mode == Mode::Normal {
                    self.adjust(false);
                }
            }
            Action::Right => {
                if self.mode == Mode::Normal {
                    self.adjust(true);
                }
            }
            Action::ScanStateChanged(state) => self.scan_state = state,
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, area: Rect) -> Result<()> {
        let layout = get_app_layout(area);
        let rect = layout.form;
        f.render_widget(self.make_form(), rect);

        // Cursor while editing a text field.
        if self.mode == Mode::Input {
            let (row, prefix, value_len) = match self.focus {
                Field::Target => (1u16, "Target Network/IP: ".len() as u16, self.target.visual_cursor() as u16),
                Field::OutputFile => (4u16, "Output File: ".len() as u16, self.output_file.visual_cursor() as u16),
                _ => return Ok(()),
            };
            f.set_cursor(rect.x + 2 + prefix + value_len, rect.y + row + 1);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_matches_the_original_defaults() {
        let form = Form::new();
        let config = form.config();
        assert_eq!(config.target, "192.168.1.0");
        assert_eq!(config.cidr, CidrSuffix::Slash24);
        assert_eq!(config.mode, ScanMode::Arp);
        assert!(config.no_resolve);
        assert_eq!(config.timeout_ms, 1000);
        assert_eq!(config.output_path, None);
    }

    #[test]
    fn timeout_adjustment_clamps_to_range() {
        let mut form = Form::new();
        form.focus = Field::Timeout;
        form.timeout_ms = TIMEOUT_MIN;
        form.adjust(false);
        assert_eq!(form.timeout_ms, TIMEOUT_MIN);
        form.timeout_ms = TIMEOUT_MAX;
        form.adjust(true);
        assert_eq!(form.timeout_ms, TIMEOUT_MAX);
    }

    #[test]
    fn focus_cycles_through_every_field() {
        let mut form = Form::new();
        for _ in 0..Field::COUNT {
            form.focus = form.focus.next();
        }
        assert_eq!(form.focus, Field::Target);
    }

    #[test]
    fn blank_output_path_is_none() {
        let mut form = Form::new();
        form.output_file = Input::default().with_value(String::from("   "));
        assert_eq!(form.config().output_path, None);
    }
}
