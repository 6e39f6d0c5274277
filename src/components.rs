//! Component system for the application's UI elements.
//!
//! Components are self-contained pieces that receive terminal events, react
//! to [`Action`] messages, and render themselves. They communicate
//! exclusively through actions sent over the bounded channel registered in
//! [`Component::register_action_handler`]; the main loop routes every action
//! to every component's `update()`.

use color_eyre::eyre::Result;
use crossterm::event::{KeyEvent, MouseEvent};
use ratatui::layout::Rect;
use tokio::sync::mpsc::Sender;

use crate::{
    action::Action,
    config::Config,
    tui::{Event, Frame},
};

pub mod auth;
pub mod form;
pub mod session;
pub mod title;
pub mod transcript;

/// `Component` is a trait that represents a visual and interactive element of
/// the user interface. Implementors can be registered with the main
/// application loop and will be able to receive events, update state, and be
/// rendered on the screen.
pub trait Component {
    /// Register an action handler that can send actions for processing if necessary.
    /// # Arguments
    /// * `action_tx` - A bounded sender that can send actions.
    /// # Returns
    /// * `Result<()>` - An Ok result or an error.
    fn register_action_handler(&mut self, _action_tx: Sender<Action>) -> Result<()> {
        Ok(())
    }

    /// Register a configuration handler that provides configuration settings if necessary.
    /// # Arguments
    /// * `config` - Configuration settings.
    /// # Returns
    /// * `Result<()>` - An Ok result or an error.
    fn register_config_handler(&mut self, _config: Config) -> Result<()> {
        Ok(())
    }

    /// Initialize the component with a specified area if necessary.
    /// # Arguments
    /// * `area` - Rectangular area to initialize the component within.
    /// # Returns
    /// * `Result<()>` - An Ok result or an error.
    fn init(&mut self, _area: Rect) -> Result<()> {
        Ok(())
    }

    /// Handle incoming events and produce actions if necessary.
    /// # Arguments
    /// * `event` - An optional event to be processed.
    /// # Returns
    /// * `Result<Option<Action>>` - An action to be processed or none.
    fn handle_events(&mut self, event: Option<Event>) -> Result<Option<Action>> {
        let r = match event {
            Some(Event::Key(key_event)) => self.handle_key_events(key_event)?,
            Some(Event::Mouse(mouse_event)) => self.handle_mouse_events(mouse_event)?,
            _ => None,
        };
        Ok(r)
    }

    /// Handle key events and produce actions if necessary.
    /// # Arguments
    /// * `key` - A key event to be processed.
    /// # Returns
    /// * `Result<Option<Action>>` - An action to be processed or none.
    fn handle_key_events(&mut self, _key: KeyEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    /// Handle mouse events and produce actions if necessary.
    /// # Arguments
    /// * `mouse` - A mouse event to be processed.
    /// # Returns
    /// * `Result<Option<Action>>` - An action to be processed or none.
    fn handle_mouse_events(&mut self, _mouse: MouseEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    /// Update the state of the component based on a received action.
    /// # Arguments
    /// * `action` - An action that may modify the state of the component.
    /// # Returns
    /// * `Result<Option<Action>>` - An action to be processed or none.
    fn update(&mut self, _action: Action) -> Result<Option<Action>> {
        Ok(None)
    }

    /// Render the component on the screen. (REQUIRED)
    /// # Arguments
    /// * `f` - A frame used for rendering.
    /// * `area` - The area in which the component should be drawn.
    /// # Returns
    /// * `Result<()>` - An Ok result or an error.
    fn draw(&mut self, f: &mut Frame<'_>, area: Rect) -> Result<()>;

    /// Gracefully shutdown the component and clean up resources.
    /// This is called before the application exits to ensure proper cleanup.
    /// # Returns
    /// * `Result<()>` - An Ok result or an error.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }
}
