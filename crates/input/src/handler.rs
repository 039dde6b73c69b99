use glam::DVec2;
use std::path::PathBuf;

use crate::event::{InputEvent, Key, KeyAction, Modifiers, MouseButton};

/// Capability set a window adapter calls into.
///
/// The adapter translates toolkit callbacks into these calls instead of
/// capturing a pointer to the driver. Every method defaults to a no-op.
pub trait EventHandler {
    fn on_key(&mut self, _key: Key, _action: KeyAction, _modifiers: Modifiers) {}

    fn on_mouse_move(&mut self, _position: DVec2) {}

    fn on_mouse_button(&mut self, _button: MouseButton, _action: KeyAction, _modifiers: Modifiers) {}

    fn on_scroll(&mut self, _delta: DVec2) {}

    /// One drop batch, paths in the order the toolkit reported them.
    fn on_drop(&mut self, _paths: &[PathBuf]) {}

    /// Route a raw event to the matching method.
    fn dispatch(&mut self, event: InputEvent) {
        match event {
            InputEvent::Key {
                key,
                action,
                modifiers,
            } => self.on_key(key, action, modifiers),
            InputEvent::MouseMove { position } => self.on_mouse_move(position),
            InputEvent::MouseButton {
                button,
                action,
                modifiers,
            } => self.on_mouse_button(button, action, modifiers),
            InputEvent::Scroll { delta } => self.on_scroll(delta),
            InputEvent::Drop { paths } => self.on_drop(&paths),
        }
    }
}

/// Handle returned by [`DropListeners::add`], used to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DropListenerId(u64);

type DropListener = Box<dyn FnMut(&[PathBuf])>;

/// Registry of file-drop listeners.
#[derive(Default)]
pub struct DropListeners {
    listeners: Vec<(DropListenerId, DropListener)>,
    next_id: u64,
}

impl DropListeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, listener: F) -> DropListenerId
    where
        F: FnMut(&[PathBuf]) + 'static,
    {
        let id = DropListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if `id` was not registered.
    pub fn remove(&mut self, id: DropListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Hand the full batch to every listener, in registration order.
    pub fn dispatch(&mut self, paths: &[PathBuf]) {
        tracing::debug!(
            files = paths.len(),
            listeners = self.listeners.len(),
            "dispatching file drop"
        );
        for (_, listener) in &mut self.listeners {
            listener(paths);
        }
    }
}

impl std::fmt::Debug for DropListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropListeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}
