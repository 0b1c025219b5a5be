//! What the engine repeats and how fast

use serde::{Deserialize, Serialize};

use crate::hotkey::DEFAULT_ACTION_KEY;

/// Default repetition rate in actions per second
pub const DEFAULT_RATE: f64 = 1000.0;

/// Whether each iteration clicks or taps a key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    #[default]
    Mouse,
    Keyboard,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

/// Where mouse clicks land
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickLocation {
    /// Wherever the pointer currently is
    #[default]
    Current,
    /// The pointer position captured when the run started
    Fixed,
}

macro_rules! impl_word {
    ($ty:ty { $($variant:ident => $word:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $word,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($word => Ok(Self::$variant),)+
                    other => Err(other.to_string()),
                }
            }
        }
    };
}

impl_word!(ActionKind { Mouse => "mouse", Keyboard => "keyboard" });
impl_word!(MouseButton { Left => "left", Right => "right", Middle => "middle" });
impl_word!(ClickLocation { Current => "current", Fixed => "fixed" });

/// Configuration of one repetition run
#[derive(Debug, Clone, PartialEq)]
pub struct ActionConfig {
    pub action_kind: ActionKind,
    pub mouse_button: MouseButton,
    /// Key name from the key table, used in keyboard mode
    pub key_symbol: String,
    /// Actions per second; conventionally 1 to 10000, not enforced
    pub rate_per_second: f64,
    /// Jitter each delay by up to 20% either way
    pub randomize: bool,
    pub click_location: ClickLocation,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            action_kind: ActionKind::default(),
            mouse_button: MouseButton::default(),
            key_symbol: DEFAULT_ACTION_KEY.to_string(),
            rate_per_second: DEFAULT_RATE,
            randomize: false,
            click_location: ClickLocation::default(),
        }
    }
}

impl std::fmt::Display for ActionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.action_kind {
            ActionKind::Mouse => write!(
                f,
                "{} click at {} position",
                self.mouse_button, self.click_location
            )?,
            ActionKind::Keyboard => write!(f, "key '{}'", self.key_symbol)?,
        }
        write!(f, ", {} per second", self.rate_per_second)?;
        if self.randomize {
            write!(f, " (randomized)")?;
        }
        Ok(())
    }
}

/// Parse a rate typed by the user or read from settings
///
/// Returns `None` when the text is not a number at all; non-positive
/// numbers are passed through and handled by the delay calculation.
pub fn parse_rate(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|rate| !rate.is_nan())
}
