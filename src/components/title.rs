use color_eyre::eyre::Result;
use ratatui::{prelude::*, widgets::*};
use tokio::sync::mpsc::Sender;

use super::Component;
use crate::{action::Action, config::Config, layout::get_app_layout, tui::Frame};

#[derive(Default)]
pub struct Title {
    action_tx: Option<Sender<Action>>,
    config: Config,
}

impl Title {
    pub fn new() -> Self {
        Self {
            action_tx: None,
            config: Config::default(),
        }
    }
}

impl Component for Title {
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.action_tx = Some(tx);
        Ok(())
    }

    fn register_config_handler(&mut self, config: Config) -> Result<()> {
        self.config = config;
        Ok(())
    }

    fn draw(&mut self, f: &mut Frame<'_>, area: Rect) -> Result<()> {
        let layout = get_app_layout(area);
        let version: &str = env!("CARGO_PKG_VERSION");
        let title = format!(" NetDiscover Buddy (v{}) - Network Discovery Tool", version);
        f.render_widget(Paragraph::new(title), layout.title);
        Ok(())
    }
}
