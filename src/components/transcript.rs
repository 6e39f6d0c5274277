use color_eyre::eyre::Result;
use ratatui::{prelude::*, widgets::*};
use tokio::sync::mpsc::Sender;

use super::Component;
use crate::{
    action::Action,
    config::DEFAULT_BORDER_STYLE,
    enums::ScanState,
    layout::get_app_layout,
    tui::Frame,
};

const PLACEHOLDER: &str = "Ready to scan. Configure your target and press 's' to start.";
const THROBBER: [&str; 4] = ["|", "/", "-", "\\"];

/// The scan results view: accumulated transcript lines, a status line, and
/// an activity indicator while a session is live.
pub struct Transcript {
    action_tx: Option<Sender<Action>>,
    lines: Vec<String>,
    status: String,
    scan_state: ScanState,
    offset: usize,
    follow: bool,
    viewport: usize,
    throbber_idx: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            action_tx: None,
            lines: vec![String::from(PLACEHOLDER)],
            status: ScanState::Idle.to_string(),
            scan_state: ScanState::Idle,
            offset: 0,
            follow: true,
            viewport: 0,
            throbber_idx: 0,
        }
    }

    fn max_offset(&self) -> usize {
        self.lines.len().saturating_sub(self.viewport.max(1))
    }

    fn scroll_page(&mut self, up: bool) {
        let page = self.viewport.max(1);
        if up {
            self.offset = self.offset.saturating_sub(page);
            self.follow = false;
        } else {
            self.offset = (self.offset + page).min(self.max_offset());
            self.follow = self.offset >= self.max_offset();
        }
    }

    fn make_view(&self) -> Paragraph {
        let text: Vec<Line> = self
            .lines
            .iter()
            .map(|l| Line::from(l.as_str()))
            .collect();

        let mut status_title = vec![
            Span::styled("|", Style::default().fg(Color::Yellow)),
            Span::styled(self.status.clone(), Style::default().fg(Color::Green)),
            Span::styled("|", Style::default().fg(Color::Yellow)),
        ];
        if self.scan_state.is_active() {
            status_title.push(Span::styled(
                format!(" {} ", THROBBER[self.throbber_idx % THROBBER.len()]),
                Style::default().fg(Color::Green),
            ));
        }

        let start_hint = if self.scan_state.is_active() {
            Span::styled("s", Style::default().fg(Color::DarkGray))
        } else {
            Span::styled("s", Style::default().add_modifier(Modifier::BOLD).fg(Color::Red))
        };
        let stop_hint = if self.scan_state.is_active() {
            Span::styled("x", Style::default().add_modifier(Modifier::BOLD).fg(Color::Red))
        } else {
            Span::styled("x", Style::default().fg(Color::DarkGray))
        };
        let hint = block::Title::from(Line::from(vec![
            "|".yellow(),
            start_hint,
            "can |".yellow(),
            stop_hint,
            " stop |".yellow(),
            "c".red().bold(),
            "lear |".yellow(),
            "q".red().bold(),
            "uit|".yellow(),
        ]))
        .alignment(Alignment::Right)
        .position(block::Position::Bottom);

        Paragraph::new(text)
            .scroll((self.offset as u16, 0))
            .block(
                Block::default()
                    .title(
                        block::Title::from("|Scan Results|".yellow())
                            .position(block::Position::Top)
                            .alignment(Alignment::Right),
                    )
                    .title(
                        block::Title::from(Line::from(status_title))
                            .position(block::Position::Top)
                            .alignment(Alignment::Left),
                    )
                    .title(hint)
                    .borders(Borders::ALL)
                    .border_type(DEFAULT_BORDER_STYLE)
                    .border_style(Style::default().fg(Color::Rgb(100, 100, 100)))
                    .padding(Padding::new(1, 1, 0, 0)),
            )
    }
}

impl Component for Transcript {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.action_tx = Some(tx);
        Ok(())
    }

    fn update(&mut self, action: Action) -> Result<Option<Action>> {
        match action {
            Action::Tick => {
                if self.scan_state.is_active() {
                    self.throbber_idx = self.throbber_idx.wrapping_add(1);
                }
            }
            Action::TranscriptLine(line) => {
                self.lines.push(line);
                if self.follow {
                    self.offset = self.max_offset();
                }
            }
            Action::StatusChange(status) => self.status = status,
            Action::ScanStateChanged(state) => self.scan_state = state,
            Action::ClearResults => {
                self.lines = vec![String::from(PLACEHOLDER)];
                self.offset = 0;
                self.follow = true;
            }
            Action::ScrollUp => self.scroll_page(true),
            Action::ScrollDown => self.scroll_page(false),
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, area: Rect) -> Result<()> {
        let layout = get_app_layout(area);
        let rect = layout.results;
        self.viewport = rect.height.saturating_sub(2) as usize;
        if self.follow {
            self.offset = self.max_offset();
        }

        f.render_widget(self.make_view(), rect);

        let mut scrollbar_state =
            ScrollbarState::new(self.max_offset()).position(self.offset);
        f.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            rect.inner(&Margin {
                vertical: 1,
                horizontal: 0,
            }),
            &mut scrollbar_state,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn clear_restores_the_placeholder() {
        let mut view = Transcript::new();
        view.update(Action::TranscriptLine(String::from("a line"))).unwrap();
        view.update(Action::TranscriptLine(String::from("another"))).unwrap();
        assert_eq!(view.lines.len(), 3);

        view.update(Action::ClearResults).unwrap();
        assert_eq!(view.lines, vec![String::from(PLACEHOLDER)]);
        assert_eq!(view.offset, 0);
    }

    #[test]
    fn appended_lines_keep_arrival_order() {
        let mut view = Transcript::new();
        for i in 0..5 {
            view.update(Action::TranscriptLine(format!("line {i}"))).unwrap();
        }
        assert_eq!(view.lines[1..], (0..5).map(|i| format!("line {i}")).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn scrolling_up_stops_following() {
        let mut view = Transcript::new();
        view.viewport = 2;
        for i in 0..10 {
            view.update(Action::TranscriptLine(format!("line {i}"))).unwrap();
        }
        assert!(view.follow);
        assert_eq!(view.offset, view.max_offset());

        view.update(Action::ScrollUp).unwrap();
        assert!(!view.follow);

        view.update(Action::ScrollDown).unwrap();
        assert!(view.follow);
    }
}
