use glam::DVec2;
use std::collections::HashMap;

use crate::event::{InputEvent, Key, KeyAction, MouseButton};

/// Input and GUI state for one viewer session.
///
/// Owned by the frame driver and handed by reference to the scene callbacks
/// and queued tasks. Lives as long as the process.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// Last action seen for each key.
    pub keys: HashMap<Key, KeyAction>,
    /// Cursor position in window pixels.
    pub mouse_position: DVec2,
    /// Held mouse buttons, one bit per [`MouseButton::bit`].
    pub mouse_buttons: u32,
    /// Whether the overlay panels are shown. Flipped by the toggle control.
    pub show_gui: bool,
    /// Whether the performance panel is shown while the GUI is visible.
    pub show_perf_graph: bool,
    close_requested: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            keys: HashMap::new(),
            mouse_position: DVec2::ZERO,
            mouse_buttons: 0,
            show_gui: true,
            show_perf_graph: true,
            close_requested: false,
        }
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a raw event into the session. Escape presses request close.
    pub fn apply(&mut self, event: &InputEvent) {
        match event {
            InputEvent::Key { key, action, .. } => {
                self.keys.insert(*key, *action);
                if *key == Key::Escape && *action == KeyAction::Press {
                    self.request_close();
                }
            }
            InputEvent::MouseMove { position } => {
                self.mouse_position = *position;
            }
            InputEvent::MouseButton { button, action, .. } => {
                if let Some(bit) = button.bit() {
                    match action {
                        KeyAction::Press => self.mouse_buttons |= 1 << bit,
                        KeyAction::Release => self.mouse_buttons &= !(1 << bit),
                        KeyAction::Repeat => {}
                    }
                }
            }
            InputEvent::Scroll { .. } | InputEvent::Drop { .. } => {}
        }
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys.get(&key).is_some_and(|a| a.is_down())
    }

    pub fn button_down(&self, button: MouseButton) -> bool {
        button
            .bit()
            .is_some_and(|bit| self.mouse_buttons & (1 << bit) != 0)
    }

    pub fn toggle_gui(&mut self) {
        self.show_gui = !self.show_gui;
    }

    /// Ask the frame loop to shut down after the current frame.
    pub fn request_close(&mut self) {
        if !self.close_requested {
            tracing::info!("close requested");
        }
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}
