//! Hotkey module for global keyboard event listening
//!
//! Uses an OS-wide input hook to observe key presses outside the
//! application and a fixed name table to bind and simulate keys.

mod keys;
mod listener;

pub use keys::{display_name, is_action_key, parse_key, CANCEL_KEY, DEFAULT_ACTION_KEY, DEFAULT_TOGGLE_KEY};
pub use listener::{HotkeyEvent, HotkeyListener};
