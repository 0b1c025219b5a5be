//! `rdev`-backed input simulation
//!
//! `rdev` cannot query the pointer position, so the hotkey listener feeds
//! every observed mouse move into a shared [`PointerTracker`].

use std::sync::{Arc, Mutex, PoisonError};

use rdev::{simulate, Button, EventType, Key};
use tracing::trace;

use super::{InputBackend, InputError, Point};
use crate::engine::MouseButton;

/// Last pointer position seen by the global hook
#[derive(Debug, Clone, Default)]
pub struct PointerTracker {
    last: Arc<Mutex<Option<Point>>>,
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, x: f64, y: f64) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Point::new(x, y));
    }

    pub fn last(&self) -> Option<Point> {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Injects input through the OS via `rdev::simulate`
pub struct RdevBackend {
    pointer: PointerTracker,
}

impl RdevBackend {
    pub fn new(pointer: PointerTracker) -> Self {
        Self { pointer }
    }

    fn send(&self, event: EventType) -> Result<(), InputError> {
        trace!(?event, "simulating");
        simulate(&event).map_err(|_| InputError::Simulate(format!("{:?}", event)))
    }
}

fn native_button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
        MouseButton::Middle => Button::Middle,
    }
}

impl InputBackend for RdevBackend {
    fn pointer_position(&self) -> Option<Point> {
        self.pointer.last()
    }

    fn move_pointer(&self, to: Point) -> Result<(), InputError> {
        self.send(EventType::MouseMove { x: to.x, y: to.y })?;
        self.pointer.record(to.x, to.y);
        Ok(())
    }

    fn click(&self, button: MouseButton) -> Result<(), InputError> {
        let button = native_button(button);
        self.send(EventType::ButtonPress(button))?;
        self.send(EventType::ButtonRelease(button))
    }

    fn tap_key(&self, key: Key) -> Result<(), InputError> {
        self.send(EventType::KeyPress(key))?;
        self.send(EventType::KeyRelease(key))
    }
}
