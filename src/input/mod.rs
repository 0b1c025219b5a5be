//! Input simulation adapter
//!
//! The action engine only talks to an [`InputBackend`]. The production
//! implementation drives the OS through `rdev`; tests substitute a recorder.

mod rdev_backend;

pub use rdev_backend::{PointerTracker, RdevBackend};

use rdev::Key;

use crate::engine::MouseButton;

/// Screen coordinates of the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Errors raised while injecting input
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to simulate {0}")]
    Simulate(String),
}

/// Something that can move the pointer, click and tap keys
pub trait InputBackend: Send + Sync {
    /// Last known pointer position, if any has been observed
    fn pointer_position(&self) -> Option<Point>;

    fn move_pointer(&self, to: Point) -> Result<(), InputError>;

    /// Press and release a mouse button
    fn click(&self, button: MouseButton) -> Result<(), InputError>;

    /// Press and release a key
    fn tap_key(&self, key: Key) -> Result<(), InputError>;
}
