//! Action engine
//!
//! Repeats one mouse click or key tap on a dedicated thread at a configured
//! rate, optionally jittered, until stopped.

mod action;
mod runner;
mod timing;

pub use action::{parse_rate, ActionConfig, ActionKind, ClickLocation, MouseButton, DEFAULT_RATE};
pub use runner::ActionEngine;
