use color_eyre::eyre::Result;
use crossterm::event::KeyEvent;
use ratatui::prelude::Rect;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::{
    action::Action,
    components::{
        auth::Auth, form::Form, session::Session, title::Title, transcript::Transcript, Component,
    },
    config::Config,
    mode::Mode,
    tui,
};

pub struct App {
    pub config: Config,
    pub tick_rate: f64,
    pub frame_rate: f64,
    pub components: Vec<Box<dyn Component>>,
    pub should_quit: bool,
    pub should_suspend: bool,
    pub mode: Mode,
    pub last_tick_key_events: Vec<KeyEvent>,
    pub action_tx: Sender<Action>,
    pub action_rx: Receiver<Action>,
    pub post_exit_msg: Option<String>,
}

impl App {
    pub fn new(tick_rate: f64, frame_rate: f64, tool: String, direct: bool) -> Result<Self> {
        let title = Title::new();
        let form = Form::new();
        let transcript = Transcript::new();
        let auth = Auth::new();
        let session = Session::new(tool, direct);
        let config = Config::new()?;

        let mode = Mode::Normal;
        // Bounded channel so a stalled consumer cannot exhaust memory.
        let (action_tx, action_rx) = mpsc::channel(1000);

        Ok(Self {
            tick_rate,
            frame_rate,
            components: vec![
                Box::new(title),
                Box::new(form),
                Box::new(transcript),
                Box::new(auth),
                Box::new(session),
            ],
            should_quit: false,
            should_suspend: false,
            config,
            mode,
            last_tick_key_events: Vec::new(),
            action_tx,
            action_rx,
            post_exit_msg: None,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        let action_tx = &self.action_tx;
        let action_rx = &mut self.action_rx;

        let mut tui = tui::Tui::new()?
            .tick_rate(self.tick_rate)
            .frame_rate(self.frame_rate);
        tui.enter()?;

        for component in self.components.iter_mut() {
            component.register_action_handler(action_tx.clone())?;
        }

        for component in self.components.iter_mut() {
            component.register_config_handler(self.config.clone())?;
        }

        for component in self.components.iter_mut() {
            component.init(tui.size()?)?;
        }

        loop {
            if let Some(e) = tui.next().await {
                match e {
                    tui::Event::Quit => action_tx.try_send(Action::Quit)?,
                    tui::Event::Tick => action_tx.try_send(Action::Tick)?,
                    tui::Event::Render => action_tx.try_send(Action::Render)?,
                    tui::Event::Resize(x, y) => action_tx.try_send(Action::Resize(x, y))?,
                    tui::Event::Key(key) => {
                        if let Some(keymap) = self.config.keybindings.get(&self.mode) {
                            if let Some(action) = keymap.get(&vec![key]) {
                                log::info!("Got action: {action:?}");
                                action_tx.try_send(action.clone())?;
                            } else {
                                // If the key was not handled as a single key action,
                                // then consider it for multi-key combinations.
                                self.last_tick_key_events.push(key);

                                // Check for multi-key combinations
                                if let Some(action) = keymap.get(&self.last_tick_key_events) {
                                    log::info!("Got action: {action:?}");
                                    action_tx.try_send(action.clone())?;
                                }
                            }
                        };
                    }
                    _ => {}
                }
                for component in self.components.iter_mut() {
                    if let Some(action) = component.handle_events(Some(e.clone()))? {
                        action_tx.try_send(action)?;
                    }
                }
            }

            while let Ok(action) = action_rx.try_recv() {
                if action != Action::Tick && action != Action::Render {
                    log::debug!("{action:?}");
                }
                match action {
                    Action::ModeChange(mode) => {
                        self.mode = mode;
                    }

                    Action::Error(ref err_msg) => {
                        self.post_exit_msg = Some(err_msg.to_string());
                        self.should_quit = true;
                    }

                    Action::Tick => {
                        self.last_tick_key_events.drain(..);
                    }
                    Action::Quit => self.should_quit = true,
                    Action::Suspend => self.should_suspend = true,
                    Action::Resume => self.should_suspend = false,
                    Action::Resize(w, h) => {
                        tui.resize(Rect::new(0, 0, w, h))?;
                        tui.draw(|f| {
                            for (idx, component) in self.components.iter_mut().enumerate() {
                                let r = component.draw(f, f.size());
                                if let Err(e) = r {
                                    action_tx
                                        .try_send(Action::Error(format!(
                                            "Failed to render component {} during terminal resize ({}x{}): {:?}",
                                            idx, w, h, e
                                        )))
                                        .unwrap_or_default();
                                }
                            }
                        })?;
                    }
                    Action::Render => {
                        tui.draw(|f| {
                            for (idx, component) in self.components.iter_mut().enumerate() {
                                let r = component.draw(f, f.size());
                                if let Err(e) = r {
                                    action_tx
                                        .try_send(Action::Error(format!(
                                            "Failed to render component {} during frame update: {:?}",
                                            idx, e
                                        )))
                                        .unwrap_or_default();
                                }
                            }
                        })?;
                    }
                    _ => {}
                }
                for component in self.components.iter_mut() {
                    if let Some(action) = component.update(action.clone())? {
                        action_tx.try_send(action)?
                    };
                }
            }
            if self.should_suspend {
                tui.suspend()?;
                action_tx.try_send(Action::Resume)?;
                tui = tui::Tui::new()?
                    .tick_rate(self.tick_rate)
                    .frame_rate(self.frame_rate);
                tui.enter()?;
            } else if self.should_quit {
                log::info!("Application shutting down, stopping any running scan first");

                // Give every component the chance to cancel its work.
                action_tx.try_send(Action::Shutdown)?;
                while let Ok(action) = action_rx.try_recv() {
                    for component in self.components.iter_mut() {
                        if let Some(action) = component.update(action.clone())? {
                            action_tx.try_send(action)?;
                        }
                    }
                }

                for (idx, component) in self.components.iter_mut().enumerate() {
                    if let Err(e) = component.shutdown() {
                        log::error!("Component {} shutdown failed: {:?}", idx, e);
                    }
                }

                tui.stop()?;
                break;
            }
        }
        tui.exit()?;

        if let Some(ref s) = self.post_exit_msg {
            println!("`{}` failed with Error:", env!("CARGO_PKG_NAME"));
            println!("{}", s);
        }

        Ok(())
    }
}
