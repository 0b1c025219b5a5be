//! Core state machine implementation
//!
//! Owns the action configuration and the toggle binding, and turns hotkey
//! presses and presentation commands into engine starts and stops.

use std::sync::Arc;

use rdev::Key;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::console::Command;
use crate::engine::{ActionConfig, ActionEngine};
use crate::events::{ClickerEvent, StatusSnapshot};
use crate::hotkey::{display_name, parse_key, HotkeyEvent, CANCEL_KEY, DEFAULT_TOGGLE_KEY};
use crate::settings::{SettingsRecord, SettingsStore};

/// The two listening states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum State {
    /// Normal listening: toggle and cancel keys are live
    #[default]
    Idle,
    /// The next key press becomes the toggle key
    Capturing,
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Idle => write!(f, "Idle"),
            State::Capturing => write!(f, "Capturing"),
        }
    }
}

/// Why the state machine stopped running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The cancel key was pressed
    CancelKey,
    /// The presentation layer asked to quit
    Quit,
    /// Every input channel closed
    InputClosed,
}

/// Outcome of handling one input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit(ExitReason),
}

/// The key that toggles the engine
#[derive(Debug, Clone, PartialEq)]
pub struct HotkeyBinding {
    toggle_key: String,
    key: Key,
}

impl HotkeyBinding {
    /// Bind by name; unknown names fall back to the default toggle key
    pub fn new(name: &str) -> Self {
        match parse_key(name) {
            Some(key) => Self {
                toggle_key: name.to_string(),
                key,
            },
            None => {
                warn!(key = name, "unknown toggle key, using {}", DEFAULT_TOGGLE_KEY);
                Self::default()
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.toggle_key
    }

    pub fn matches(&self, key: Key) -> bool {
        self.key == key
    }
}

impl Default for HotkeyBinding {
    fn default() -> Self {
        Self {
            toggle_key: DEFAULT_TOGGLE_KEY.to_string(),
            key: Key::F6,
        }
    }
}

/// The state machine that drives the engine
pub struct StateMachine {
    state: State,
    binding: HotkeyBinding,
    config: ActionConfig,
    /// Informational delay carried through to the settings file
    delay: String,
    engine: Arc<ActionEngine>,
    store: SettingsStore,
    event_tx: broadcast::Sender<ClickerEvent>,
}

impl StateMachine {
    /// Create a state machine from loaded settings
    pub fn new(
        engine: Arc<ActionEngine>,
        store: SettingsStore,
        settings: SettingsRecord,
        event_tx: broadcast::Sender<ClickerEvent>,
    ) -> Self {
        Self {
            state: State::Idle,
            binding: HotkeyBinding::new(&settings.toggle_key),
            config: settings.action_config(),
            delay: settings.delay,
            engine,
            store,
            event_tx,
        }
    }

    /// Get the current state
    pub fn state(&self) -> State {
        self.state
    }

    pub fn binding(&self) -> &HotkeyBinding {
        &self.binding
    }

    pub fn config(&self) -> &ActionConfig {
        &self.config
    }

    /// Snapshot of everything that gets persisted
    pub fn settings(&self) -> SettingsRecord {
        SettingsRecord::snapshot(&self.config, self.binding.name(), &self.delay)
    }

    /// Run the state machine until shutdown is requested
    pub async fn run(
        &mut self,
        mut hotkey_rx: mpsc::Receiver<HotkeyEvent>,
        mut command_rx: mpsc::Receiver<Command>,
    ) -> ExitReason {
        info!(toggle_key = self.binding.name(), "state machine started in Idle state");

        loop {
            let flow = tokio::select! {
                Some(event) = hotkey_rx.recv() => self.handle_hotkey(event),
                Some(command) = command_rx.recv() => self.handle_command(command),
                else => Flow::Exit(ExitReason::InputClosed),
            };

            if let Flow::Exit(reason) = flow {
                info!(?reason, "state machine stopped");
                return reason;
            }
        }
    }

    /// Handle a key press from the global listener
    pub fn handle_hotkey(&mut self, event: HotkeyEvent) -> Flow {
        let HotkeyEvent::KeyPressed(key) = event;
        let state = self.state;
        match state {
            State::Capturing => {
                self.capture(key);
                Flow::Continue
            }
            State::Idle if self.binding.matches(key) => {
                self.toggle();
                Flow::Continue
            }
            State::Idle if key == CANCEL_KEY => {
                info!("cancel key pressed");
                self.request_shutdown(ExitReason::CancelKey)
            }
            State::Idle => Flow::Continue,
        }
    }

    /// Handle a request from the presentation layer
    pub fn handle_command(&mut self, command: Command) -> Flow {
        debug!(?command, "command received");
        match command {
            Command::Toggle => self.toggle(),
            Command::Start => {
                self.engine.start(&self.config);
            }
            Command::Stop => {
                self.engine.stop();
            }
            Command::Capture => self.begin_capture(),
            Command::Status => {
                let _ = self.event_tx.send(ClickerEvent::Status(self.status()));
            }
            Command::SetMode(kind) => {
                // The loop captured its action at start; switching kinds needs a fresh run.
                if kind != self.config.action_kind && self.engine.stop() {
                    info!("engine stopped to switch action type");
                }
                self.config.action_kind = kind;
                self.config_changed("action_type", kind.to_string());
            }
            Command::SetButton(button) => {
                self.config.mouse_button = button;
                self.config_changed("mouse_button", button.to_string());
            }
            Command::SetKey(key) => {
                // A tap of the toggle key would be seen by the hook and stop the run.
                if parse_key(&key).is_some_and(|k| self.binding.matches(k)) {
                    warn!(%key, "key is bound as the toggle key, ignoring");
                } else {
                    self.config.key_symbol = key.clone();
                    self.config_changed("keyboard_key", key);
                }
            }
            Command::SetRate(rate) => {
                self.config.rate_per_second = rate;
                self.config_changed("cps", rate.to_string());
            }
            Command::SetRandomize(randomize) => {
                self.config.randomize = randomize;
                self.config_changed("randomize", randomize.to_string());
            }
            Command::SetLocation(location) => {
                self.config.click_location = location;
                self.config_changed("click_location", location.to_string());
            }
            Command::Save => self.persist(),
            Command::Quit => return self.request_shutdown(ExitReason::Quit),
        }
        Flow::Continue
    }

    /// Start the engine if stopped, stop it if running
    pub fn toggle(&mut self) {
        if self.engine.is_running() {
            self.engine.stop();
        } else {
            self.engine.start(&self.config);
        }
    }

    /// Bind the next key press as the toggle key
    pub fn begin_capture(&mut self) {
        if self.state == State::Capturing {
            return;
        }
        info!(from = %self.state, to = %State::Capturing, "state transition");
        self.state = State::Capturing;
        let _ = self.event_tx.send(ClickerEvent::CaptureStarted);
    }

    /// Stop the engine, wait for its loop and save settings
    pub fn shutdown(&mut self) {
        self.engine.shutdown();
        self.persist();
    }

    fn capture(&mut self, key: Key) {
        let Some(name) = display_name(key) else {
            debug!(?key, "ignoring unnamed key while capturing");
            return;
        };

        info!(key = %name, "toggle key captured");
        self.binding = HotkeyBinding { toggle_key: name.clone(), key };
        self.state = State::Idle;
        self.persist();
        let _ = self.event_tx.send(ClickerEvent::ToggleKeyChanged { key: name });
    }

    fn request_shutdown(&mut self, reason: ExitReason) -> Flow {
        let _ = self.event_tx.send(ClickerEvent::ShutdownRequested);
        Flow::Exit(reason)
    }

    fn config_changed(&self, field: &str, value: String) {
        debug!(field, %value, "configuration changed");
        let _ = self.event_tx.send(ClickerEvent::ConfigChanged {
            field: field.to_string(),
            value,
        });
    }

    fn persist(&self) {
        if let Err(e) = self.store.save(&self.settings()) {
            warn!(%e, "failed to save settings");
        }
    }

    fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.engine.is_running(),
            count: self.engine.count(),
            elapsed_ms: self.engine.elapsed().as_millis() as u64,
            toggle_key: self.binding.name().to_string(),
            capturing: self.state == State::Capturing,
            action: self.config.to_string(),
        }
    }
}
