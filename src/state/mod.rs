//! State machine module for hotkey handling
//!
//! Provides an explicit state machine with two states:
//! - Idle: the toggle key starts/stops the engine, Escape exits
//! - Capturing: the next key press becomes the toggle key

mod machine;

pub use machine::StateMachine;
