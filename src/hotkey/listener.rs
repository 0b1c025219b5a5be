//! Global hotkey listener using an OS-wide input hook
//!
//! Monitors system-wide key presses and pointer moves.
//! Runs on a dedicated thread that owns the hook for its whole life.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use rdev::{listen, Event, EventType, Key};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::input::PointerTracker;

/// Events sent from the hotkey listener to the state machine
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotkeyEvent {
    /// A key went down somewhere on the system
    KeyPressed(Key),
}

/// Global hotkey listener that forwards key presses
pub struct HotkeyListener {
    event_tx: mpsc::Sender<HotkeyEvent>,
    pointer: PointerTracker,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    /// Create a new hotkey listener
    pub fn new(event_tx: mpsc::Sender<HotkeyEvent>, pointer: PointerTracker) -> Self {
        Self {
            event_tx,
            pointer,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the hotkey listener
    ///
    /// This spawns a dedicated thread that installs the global hook and
    /// blocks inside it. Events are forwarded until `stop()` is called.
    pub fn start(&self) -> Result<(), HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let pointer = self.pointer.clone();
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                let callback = gated(Arc::clone(&running), event_tx, pointer);
                if let Err(e) = listen(callback) {
                    error!(error = ?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                HotkeyError::ThreadSpawn(e.to_string())
            })?;

        Ok(())
    }

    /// Stop forwarding events
    ///
    /// This does not uninstall the OS hook: `rdev::listen` never returns and
    /// offers no way to unregister its callback. The hook stays installed,
    /// ignoring every event, until the process exits and the OS releases it
    /// together with the listener thread. Callers that need the hook gone
    /// must exit the process after calling this.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("hotkey listener stopped");
        }
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),
}

/// Hook callback that forwards events only while `running` is set
fn gated(
    running: Arc<AtomicBool>,
    event_tx: mpsc::Sender<HotkeyEvent>,
    pointer: PointerTracker,
) -> impl FnMut(Event) {
    move |event: Event| {
        if running.load(Ordering::SeqCst) {
            forward(&event, &event_tx, &pointer);
        }
    }
}

/// Translate one raw hook event; must be fast and never block
fn forward(event: &Event, event_tx: &mpsc::Sender<HotkeyEvent>, pointer: &PointerTracker) {
    match event.event_type {
        EventType::KeyPress(key) => {
            debug!(?key, "key pressed");
            match event_tx.try_send(HotkeyEvent::KeyPressed(key)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(?key, "hotkey channel full, dropping key press");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("hotkey channel closed");
                }
            }
        }
        EventType::MouseMove { x, y } => pointer.record(x, y),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::input::Point;

    fn raw(event_type: EventType) -> Event {
        Event {
            time: SystemTime::now(),
            name: None,
            event_type,
        }
    }

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = HotkeyListener::new(tx, PointerTracker::new());
        assert!(!listener.is_running());
    }

    #[test]
    fn test_stopped_hook_ignores_everything() {
        let (tx, mut rx) = mpsc::channel(32);
        let pointer = PointerTracker::new();
        let listener = HotkeyListener::new(tx.clone(), pointer.clone());
        let mut callback = gated(Arc::clone(&listener.running), tx, pointer.clone());

        listener.running.store(true, Ordering::SeqCst);
        callback(raw(EventType::KeyPress(Key::F6)));
        assert_eq!(rx.try_recv().ok(), Some(HotkeyEvent::KeyPressed(Key::F6)));

        listener.stop();
        assert!(!listener.is_running());
        callback(raw(EventType::KeyPress(Key::Escape)));
        callback(raw(EventType::MouseMove { x: 3.0, y: 4.0 }));
        assert!(rx.try_recv().is_err());
        assert_eq!(pointer.last(), None);
    }

    #[test]
    fn test_forwards_key_presses_only() {
        let (tx, mut rx) = mpsc::channel(32);
        let pointer = PointerTracker::new();

        forward(&raw(EventType::KeyRelease(Key::F6)), &tx, &pointer);
        forward(&raw(EventType::KeyPress(Key::F6)), &tx, &pointer);

        assert_eq!(rx.try_recv().ok(), Some(HotkeyEvent::KeyPressed(Key::F6)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unknown_keys_are_still_forwarded() {
        let (tx, mut rx) = mpsc::channel(32);
        forward(&raw(EventType::KeyPress(Key::Unknown(999))), &tx, &PointerTracker::new());
        assert_eq!(
            rx.try_recv().ok(),
            Some(HotkeyEvent::KeyPressed(Key::Unknown(999)))
        );
    }

    #[test]
    fn test_pointer_moves_update_tracker() {
        let (tx, mut rx) = mpsc::channel(32);
        let pointer = PointerTracker::new();

        forward(&raw(EventType::MouseMove { x: 5.0, y: 7.5 }), &tx, &pointer);

        assert_eq!(pointer.last(), Some(Point::new(5.0, 7.5)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_full_channel_drops_event() {
        let (tx, mut rx) = mpsc::channel(1);
        let pointer = PointerTracker::new();

        forward(&raw(EventType::KeyPress(Key::KeyA)), &tx, &pointer);
        forward(&raw(EventType::KeyPress(Key::KeyB)), &tx, &pointer);

        assert_eq!(rx.try_recv().ok(), Some(HotkeyEvent::KeyPressed(Key::KeyA)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_channel_is_tolerated() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        forward(&raw(EventType::KeyPress(Key::KeyA)), &tx, &PointerTracker::new());
    }
}
