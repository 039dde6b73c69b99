use glam::DVec2;
use std::path::PathBuf;

/// Keyboard key identifier.
///
/// Window adapters map toolkit key codes into these variants. Keys without a
/// variant arrive as `Unknown`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,
    Delete,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    Shift,
    Control,
    Alt,
    Meta,

    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    F1, F2, F3, F4, F5, F6,
    F7, F8, F9, F10, F11, F12,

    Unknown,
}

/// What happened to a key or button.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum KeyAction {
    Release,
    Press,
    Repeat,
}

impl KeyAction {
    pub fn is_down(self) -> bool {
        !matches!(self, KeyAction::Release)
    }
}

/// Mouse button identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

impl MouseButton {
    /// Bit position of this button in the session's button mask.
    ///
    /// `None` for buttons that do not fit the 32-bit mask.
    pub fn bit(self) -> Option<u32> {
        match self {
            MouseButton::Left => Some(0),
            MouseButton::Right => Some(1),
            MouseButton::Middle => Some(2),
            MouseButton::Back => Some(3),
            MouseButton::Forward => Some(4),
            MouseButton::Other(n) if u32::from(n) < 27 => Some(5 + u32::from(n)),
            MouseButton::Other(_) => None,
        }
    }
}

/// Modifier keys held during an event.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Raw input forwarded from the window toolkit.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Key {
        key: Key,
        action: KeyAction,
        modifiers: Modifiers,
    },
    /// Cursor position in window pixels.
    MouseMove { position: DVec2 },
    MouseButton {
        button: MouseButton,
        action: KeyAction,
        modifiers: Modifiers,
    },
    Scroll { delta: DVec2 },
    /// One drop batch: every path dropped in a single gesture, in order.
    Drop { paths: Vec<PathBuf> },
}
