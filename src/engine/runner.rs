//! The repetition loop
//!
//! Each successful `start` creates a fresh [`RunState`] shared only between
//! the engine handle and the loop thread it spawns. `stop` clears the running
//! flag and wakes the loop from its delay; an action already in progress is
//! finished first. A new run only starts once the previous loop has exited.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rdev::Key;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::action::{ActionConfig, ActionKind, ClickLocation, MouseButton};
use super::timing::compute_delay;
use crate::events::ClickerEvent;
use crate::hotkey::{is_action_key, parse_key, DEFAULT_ACTION_KEY};
use crate::input::{InputBackend, Point};

/// Counters and timestamps of a single run
#[derive(Debug)]
pub struct RunState {
    running: AtomicBool,
    action_count: AtomicU64,
    started_at: Instant,
    stopped_at: Mutex<Option<Instant>>,
    wake: Condvar,
}

impl RunState {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
            action_count: AtomicU64::new(0),
            started_at: Instant::now(),
            stopped_at: Mutex::new(None),
            wake: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn action_count(&self) -> u64 {
        self.action_count.load(Ordering::SeqCst)
    }

    /// Time since start, frozen once the run is stopped
    pub fn elapsed(&self) -> Duration {
        match *self.stopped_at.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(stopped) => stopped.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    /// Returns false if the run was already stopped
    fn halt(&self) -> bool {
        if !self.running.swap(false, Ordering::SeqCst) {
            return false;
        }
        *self.stopped_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        self.wake.notify_all();
        true
    }

    /// Sleep for `delay` or until the run is halted, whichever comes first
    fn pause(&self, delay: Duration) {
        let stopped = self.stopped_at.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .wake
            .wait_timeout_while(stopped, delay, |stopped| stopped.is_none());
    }
}

struct ActiveRun {
    state: Arc<RunState>,
    worker: Option<JoinHandle<()>>,
}

/// The resolved, immutable description of what a loop repeats
#[derive(Debug, Clone, Copy)]
enum Action {
    Click {
        button: MouseButton,
        pin_to: Option<Point>,
    },
    Tap(Key),
}

/// Repeats one input action until stopped
pub struct ActionEngine {
    backend: Arc<dyn InputBackend>,
    event_tx: broadcast::Sender<ClickerEvent>,
    current: Mutex<Option<ActiveRun>>,
}

impl ActionEngine {
    /// Create an idle engine
    pub fn new(backend: Arc<dyn InputBackend>, event_tx: broadcast::Sender<ClickerEvent>) -> Self {
        Self {
            backend,
            event_tx,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start repeating `config` on a dedicated thread
    ///
    /// Returns false without touching the current run if already running.
    pub fn start(&self, config: &ActionConfig) -> bool {
        let mut current = self.current();
        if current.as_ref().is_some_and(|run| run.state.is_running()) {
            debug!("start ignored, engine already running");
            return false;
        }

        if let Some(previous) = current.take() {
            join_worker(previous.worker);
        }

        let action = self.resolve_action(config);
        let state = Arc::new(RunState::new());
        let loop_state = Arc::clone(&state);
        let backend = Arc::clone(&self.backend);
        let event_tx = self.event_tx.clone();
        let loop_config = config.clone();

        info!(%config, "engine started");
        let _ = self.event_tx.send(ClickerEvent::EngineStarted);

        let worker = thread::Builder::new()
            .name("action-engine".to_string())
            .spawn(move || run_loop(action, loop_config, backend, loop_state, event_tx));

        let worker = match worker {
            Ok(handle) => handle,
            Err(e) => {
                error!(?e, "failed to spawn action loop thread");
                state.halt();
                let _ = self.event_tx.send(ClickerEvent::EngineStopped {
                    count: 0,
                    elapsed_ms: 0,
                });
                return false;
            }
        };

        *current = Some(ActiveRun {
            state,
            worker: Some(worker),
        });
        true
    }

    /// Ask the running loop to finish; returns false if nothing was running
    pub fn stop(&self) -> bool {
        let current = self.current();
        let Some(run) = current.as_ref() else {
            return false;
        };
        if !run.state.halt() {
            return false;
        }
        info!(
            count = run.state.action_count(),
            elapsed_ms = run.state.elapsed().as_millis() as u64,
            "engine stopped"
        );
        true
    }

    /// Stop and wait for the loop thread to exit
    pub fn shutdown(&self) {
        self.stop();
        let worker = self.current().as_mut().and_then(|run| run.worker.take());
        join_worker(worker);
    }

    pub fn is_running(&self) -> bool {
        self.current()
            .as_ref()
            .is_some_and(|run| run.state.is_running())
    }

    /// Actions performed in the current or most recent run
    pub fn count(&self) -> u64 {
        self.current()
            .as_ref()
            .map_or(0, |run| run.state.action_count())
    }

    /// Duration of the current or most recent run
    pub fn elapsed(&self) -> Duration {
        self.current()
            .as_ref()
            .map_or(Duration::ZERO, |run| run.state.elapsed())
    }

    fn resolve_action(&self, config: &ActionConfig) -> Action {
        match config.action_kind {
            ActionKind::Mouse => {
                let pin_to = match config.click_location {
                    ClickLocation::Current => None,
                    ClickLocation::Fixed => {
                        let position = self.backend.pointer_position();
                        if position.is_none() {
                            warn!("pointer position unknown, clicking at current position");
                        }
                        position
                    }
                };
                Action::Click {
                    button: config.mouse_button,
                    pin_to,
                }
            }
            ActionKind::Keyboard => {
                let key = Some(config.key_symbol.as_str())
                    .filter(|name| is_action_key(name))
                    .and_then(parse_key)
                    .unwrap_or_else(|| {
                        warn!(key = %config.key_symbol, "unknown key, using {}", DEFAULT_ACTION_KEY);
                        Key::Return
                    });
                Action::Tap(key)
            }
        }
    }
}

fn join_worker(worker: Option<JoinHandle<()>>) {
    if let Some(worker) = worker {
        if worker.join().is_err() {
            warn!("action loop thread panicked");
        }
    }
}

fn run_loop(
    action: Action,
    config: ActionConfig,
    backend: Arc<dyn InputBackend>,
    state: Arc<RunState>,
    event_tx: broadcast::Sender<ClickerEvent>,
) {
    debug!(?action, "action loop started");

    while state.is_running() {
        let result = match action {
            Action::Click { button, pin_to } => {
                if let Some(point) = pin_to {
                    if let Err(e) = backend.move_pointer(point) {
                        warn!(%e, "failed to reposition pointer");
                    }
                }
                backend.click(button)
            }
            Action::Tap(key) => backend.tap_key(key),
        };
        if let Err(e) = result {
            warn!(%e, "action failed");
        }

        let count = state.action_count.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = event_tx.send(ClickerEvent::ActionPerformed { count });

        state.pause(compute_delay(&config));
    }

    let count = state.action_count();
    let elapsed_ms = state.elapsed().as_millis() as u64;
    debug!(count, elapsed_ms, "action loop finished");
    let _ = event_tx.send(ClickerEvent::EngineStopped { count, elapsed_ms });
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::input::testing::{RecordedAction, RecordingBackend};

    fn engine_with(backend: Arc<RecordingBackend>) -> (Arc<ActionEngine>, broadcast::Receiver<ClickerEvent>) {
        let (tx, rx) = broadcast::channel(4096);
        (Arc::new(ActionEngine::new(backend, tx)), rx)
    }

    fn keyboard(key: &str, rate: f64) -> ActionConfig {
        ActionConfig {
            action_kind: ActionKind::Keyboard,
            key_symbol: key.to_string(),
            rate_per_second: rate,
            ..Default::default()
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_new_engine_is_idle() {
        let (engine, _) = engine_with(Arc::new(RecordingBackend::default()));
        assert!(!engine.is_running());
        assert_eq!(engine.count(), 0);
        assert_eq!(engine.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (engine, _) = engine_with(Arc::new(RecordingBackend::default()));
        assert!(!engine.stop());
        assert!(!engine.is_running());
    }

    #[test]
    fn test_ten_keyboard_actions_then_stop() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, _) = engine_with(Arc::clone(&backend));

        // Hold the loop inside the 10th action until the test has stopped the engine.
        let (reached_tx, reached_rx) = mpsc::channel();
        let (resume_tx, resume_rx) = mpsc::channel::<()>();
        let resume_rx = Mutex::new(resume_rx);
        backend.on_action(move |n| {
            if n == 10 {
                reached_tx.send(()).unwrap();
                resume_rx.lock().unwrap().recv().unwrap();
            }
        });

        assert!(engine.start(&keyboard("a", 1000.0)));
        reached_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(engine.stop());
        resume_tx.send(()).unwrap();
        engine.shutdown();

        assert_eq!(engine.count(), 10);
        assert_eq!(backend.action_count(), 10);
        assert!(backend
            .recorded()
            .iter()
            .all(|action| *action == RecordedAction::Tap(Key::KeyA)));

        let elapsed = engine.elapsed();
        assert!(elapsed >= Duration::from_millis(9), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(2), "elapsed {elapsed:?}");
    }

    #[test]
    fn test_second_start_is_noop() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, _) = engine_with(Arc::clone(&backend));
        let config = keyboard("a", 200.0);

        assert!(engine.start(&config));
        wait_until(|| engine.count() >= 3);
        assert!(!engine.start(&config));
        assert!(engine.count() >= 3, "count must not reset");
        engine.shutdown();

        // A single loop taps at most once per delay.
        let elapsed = engine.elapsed().as_secs_f64();
        assert!((engine.count() as f64) <= elapsed * 200.0 + 2.0);
    }

    #[test]
    fn test_restart_resets_count() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, _) = engine_with(Arc::clone(&backend));
        let config = keyboard("b", 1000.0);

        assert!(engine.start(&config));
        wait_until(|| engine.count() >= 5);
        assert!(engine.stop());
        assert!(!engine.is_running());

        // Count stays readable after stopping.
        assert!(engine.count() >= 5);

        backend.on_action(|_| thread::sleep(Duration::from_millis(50)));
        assert!(engine.start(&config));
        assert!(engine.is_running());
        assert!(engine.count() <= 1, "count restarts at zero");
        engine.shutdown();
    }

    #[test]
    fn test_fixed_location_repins_pointer() {
        let origin = Point::new(100.0, 200.0);
        let backend = Arc::new(RecordingBackend::with_position(origin));
        let (engine, _) = engine_with(Arc::clone(&backend));

        // Something else moves the pointer between clicks.
        let mover = Arc::clone(&backend);
        backend.on_action(move |n| {
            *mover.position.lock().unwrap() = Some(Point::new(n as f64, n as f64));
        });

        let config = ActionConfig {
            mouse_button: MouseButton::Right,
            click_location: ClickLocation::Fixed,
            ..Default::default()
        };
        assert!(engine.start(&config));
        wait_until(|| engine.count() >= 5);
        engine.shutdown();

        let recorded = backend.recorded();
        let moves: Vec<_> = recorded
            .iter()
            .filter_map(|r| match r {
                RecordedAction::Move(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(moves.len() >= 5);
        assert!(moves.iter().all(|p| *p == origin));

        // Every click is preceded by a move back to the origin.
        for pair in recorded.chunks(2) {
            assert_eq!(pair[0], RecordedAction::Move(origin));
            if let Some(second) = pair.get(1) {
                assert_eq!(*second, RecordedAction::Click(MouseButton::Right));
            }
        }
    }

    #[test]
    fn test_current_location_never_moves_pointer() {
        let backend = Arc::new(RecordingBackend::with_position(Point::new(1.0, 1.0)));
        let (engine, _) = engine_with(Arc::clone(&backend));

        assert!(engine.start(&ActionConfig::default()));
        wait_until(|| engine.count() >= 3);
        engine.shutdown();

        assert!(backend
            .recorded()
            .iter()
            .all(|r| *r == RecordedAction::Click(MouseButton::Left)));
    }

    #[test]
    fn test_fixed_location_without_known_pointer_clicks_in_place() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, _) = engine_with(Arc::clone(&backend));
        let config = ActionConfig {
            click_location: ClickLocation::Fixed,
            ..Default::default()
        };

        assert!(engine.start(&config));
        wait_until(|| engine.count() >= 2);
        engine.shutdown();
        assert!(backend
            .recorded()
            .iter()
            .all(|r| matches!(r, RecordedAction::Click(_))));
    }

    #[test]
    fn test_unknown_key_falls_back_to_enter() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, _) = engine_with(Arc::clone(&backend));

        assert!(engine.start(&keyboard("not-a-key", 1000.0)));
        wait_until(|| engine.count() >= 1);
        engine.shutdown();
        assert_eq!(backend.recorded()[0], RecordedAction::Tap(Key::Return));
    }

    #[test]
    fn test_cancel_key_is_never_tapped() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, _) = engine_with(Arc::clone(&backend));

        assert!(engine.start(&keyboard("esc", 1000.0)));
        wait_until(|| engine.count() >= 1);
        engine.shutdown();
        assert!(backend
            .recorded()
            .iter()
            .all(|action| *action == RecordedAction::Tap(Key::Return)));
    }

    #[test]
    fn test_shutdown_interrupts_long_delay() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, mut rx) = engine_with(Arc::clone(&backend));

        // One action every 100 s.
        assert!(engine.start(&keyboard("a", 0.01)));
        wait_until(|| engine.count() >= 1);

        let began = Instant::now();
        engine.shutdown();
        assert!(began.elapsed() < Duration::from_secs(1), "shutdown took {:?}", began.elapsed());
        assert_eq!(backend.action_count(), 1);

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(events.last(), Some(ClickerEvent::EngineStopped { count: 1, .. })));
    }

    #[test]
    fn test_restart_waits_for_previous_loop() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, mut rx) = engine_with(Arc::clone(&backend));
        let slow = keyboard("a", 1.0);

        assert!(engine.start(&slow));
        wait_until(|| engine.count() >= 1);
        assert!(engine.stop());

        let began = Instant::now();
        assert!(engine.start(&keyboard("b", 1.0)));
        assert!(began.elapsed() < Duration::from_millis(500), "restart took {:?}", began.elapsed());
        wait_until(|| engine.count() >= 1);
        engine.shutdown();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        // The first run's stop notice lands before the second run starts.
        assert_eq!(events.len(), 6, "{events:?}");
        for run in events.chunks(3) {
            assert_eq!(run[0], ClickerEvent::EngineStarted);
            assert_eq!(run[1], ClickerEvent::ActionPerformed { count: 1 });
            assert!(matches!(run[2], ClickerEvent::EngineStopped { count: 1, .. }));
        }
        assert_eq!(
            backend.recorded(),
            vec![RecordedAction::Tap(Key::KeyA), RecordedAction::Tap(Key::KeyB)]
        );
    }

    #[test]
    fn test_unsleepable_rate_keeps_running() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, mut rx) = engine_with(Arc::clone(&backend));

        assert!(engine.start(&keyboard("a", 1e-20)));
        wait_until(|| engine.count() >= 3);
        assert!(engine.is_running());
        engine.shutdown();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(events.last(), Some(ClickerEvent::EngineStopped { .. })));
    }

    #[test]
    fn test_notifies_progress_and_stop() {
        let backend = Arc::new(RecordingBackend::default());
        let (engine, mut rx) = engine_with(Arc::clone(&backend));

        assert!(engine.start(&keyboard("c", 1000.0)));
        wait_until(|| engine.count() >= 3);
        engine.shutdown();

        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(matches!(events.first(), Some(ClickerEvent::EngineStarted)));
        assert!(matches!(
            events.get(1),
            Some(ClickerEvent::ActionPerformed { count: 1 })
        ));
        match events.last() {
            Some(ClickerEvent::EngineStopped { count, .. }) => assert_eq!(*count, engine.count()),
            other => panic!("expected EngineStopped, got {other:?}"),
        }
    }
}
