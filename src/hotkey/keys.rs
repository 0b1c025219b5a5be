//! Key name table
//!
//! Maps the human-readable key names stored in the settings file to the
//! native key identifiers used by the input hook and the simulator.
//! Lookup is case-insensitive; the first entry for a key is its canonical name.

use rdev::Key;

/// Key that always terminates the application while not capturing
pub const CANCEL_KEY: Key = Key::Escape;

/// Default toggle hotkey name
pub const DEFAULT_TOGGLE_KEY: &str = "F6";

/// Default key tapped in keyboard mode
pub const DEFAULT_ACTION_KEY: &str = "enter";

/// Keys that may be tapped in keyboard mode
///
/// Excludes the cancel key, function keys and modifiers, which the global
/// hook would see as hotkeys when the engine injects them.
const ACTION_KEYS: &[&str] = &[
    "enter", "space", "tab", "backspace", "up", "down", "left", "right", "a", "b", "c", "d",
    "e", "f", "g", "h", "i", "j", "k", "l", "m", "n", "o", "p", "q", "r", "s", "t", "u", "v",
    "w", "x", "y", "z", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9",
];

const KEY_NAMES: &[(&str, Key)] = &[
    ("enter", Key::Return),
    ("return", Key::Return),
    ("space", Key::Space),
    ("tab", Key::Tab),
    ("backspace", Key::Backspace),
    ("delete", Key::Delete),
    ("esc", Key::Escape),
    ("escape", Key::Escape),
    ("insert", Key::Insert),
    ("home", Key::Home),
    ("end", Key::End),
    ("page_up", Key::PageUp),
    ("pageup", Key::PageUp),
    ("page_down", Key::PageDown),
    ("pagedown", Key::PageDown),
    ("up", Key::UpArrow),
    ("down", Key::DownArrow),
    ("left", Key::LeftArrow),
    ("right", Key::RightArrow),
    ("caps_lock", Key::CapsLock),
    ("shift", Key::ShiftLeft),
    ("shift_r", Key::ShiftRight),
    ("ctrl", Key::ControlLeft),
    ("ctrl_r", Key::ControlRight),
    ("alt", Key::Alt),
    ("alt_gr", Key::AltGr),
    ("cmd", Key::MetaLeft),
    ("cmd_r", Key::MetaRight),
    ("print_screen", Key::PrintScreen),
    ("scroll_lock", Key::ScrollLock),
    ("pause", Key::Pause),
    ("num_lock", Key::NumLock),
    ("f1", Key::F1),
    ("f2", Key::F2),
    ("f3", Key::F3),
    ("f4", Key::F4),
    ("f5", Key::F5),
    ("f6", Key::F6),
    ("f7", Key::F7),
    ("f8", Key::F8),
    ("f9", Key::F9),
    ("f10", Key::F10),
    ("f11", Key::F11),
    ("f12", Key::F12),
    ("a", Key::KeyA),
    ("b", Key::KeyB),
    ("c", Key::KeyC),
    ("d", Key::KeyD),
    ("e", Key::KeyE),
    ("f", Key::KeyF),
    ("g", Key::KeyG),
    ("h", Key::KeyH),
    ("i", Key::KeyI),
    ("j", Key::KeyJ),
    ("k", Key::KeyK),
    ("l", Key::KeyL),
    ("m", Key::KeyM),
    ("n", Key::KeyN),
    ("o", Key::KeyO),
    ("p", Key::KeyP),
    ("q", Key::KeyQ),
    ("r", Key::KeyR),
    ("s", Key::KeyS),
    ("t", Key::KeyT),
    ("u", Key::KeyU),
    ("v", Key::KeyV),
    ("w", Key::KeyW),
    ("x", Key::KeyX),
    ("y", Key::KeyY),
    ("z", Key::KeyZ),
    ("0", Key::Num0),
    ("1", Key::Num1),
    ("2", Key::Num2),
    ("3", Key::Num3),
    ("4", Key::Num4),
    ("5", Key::Num5),
    ("6", Key::Num6),
    ("7", Key::Num7),
    ("8", Key::Num8),
    ("9", Key::Num9),
    ("`", Key::BackQuote),
    ("-", Key::Minus),
    ("=", Key::Equal),
    ("[", Key::LeftBracket),
    ("]", Key::RightBracket),
    (";", Key::SemiColon),
    ("'", Key::Quote),
    ("\\", Key::BackSlash),
    (",", Key::Comma),
    (".", Key::Dot),
    ("/", Key::Slash),
];

/// Resolve a key name (any case) to its native key
pub fn parse_key(name: &str) -> Option<Key> {
    let name = name.trim();
    KEY_NAMES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
        .map(|(_, key)| *key)
}

/// Whether `name` (any case) may be tapped in keyboard mode
pub fn is_action_key(name: &str) -> bool {
    let name = name.trim();
    ACTION_KEYS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// Canonical lowercase name of a native key, if it has one
pub fn key_name(key: Key) -> Option<&'static str> {
    KEY_NAMES
        .iter()
        .find(|(_, candidate)| *candidate == key)
        .map(|(name, _)| *name)
}

/// Name as shown on the hotkey label and stored for the toggle binding
pub fn display_name(key: Key) -> Option<String> {
    key_name(key).map(str::to_uppercase)
}
