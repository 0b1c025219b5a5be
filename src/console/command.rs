//! Console command definitions
//!
//! One command per line: a verb optionally followed by a single argument.

use crate::engine::{parse_rate, ActionKind, ClickLocation, MouseButton};
use crate::hotkey::is_action_key;

/// Requests from the presentation layer to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Start if stopped, stop if running
    Toggle,
    Start,
    Stop,
    /// Bind the next key press as the toggle key
    Capture,
    /// Report the engine and binding state
    Status,
    SetMode(ActionKind),
    SetButton(MouseButton),
    SetKey(String),
    SetRate(f64),
    SetRandomize(bool),
    SetLocation(ClickLocation),
    /// Persist settings now
    Save,
    Quit,
}

/// Errors produced while parsing a command line
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("'{0}' needs a value")]
    MissingArgument(&'static str),

    #[error("invalid value '{value}' for '{command}'")]
    InvalidArgument {
        command: &'static str,
        value: String,
    },
}

/// Help text listing every command
pub const HELP: &str = "\
commands:
  toggle                      start or stop
  start | stop
  capture                     bind the next key press as the toggle key
  status
  mode mouse|keyboard
  button left|right|middle
  key <name>                  key tapped in keyboard mode:
                              a-z, 0-9, enter, space, tab, backspace,
                              up, down, left, right
  cps <rate>                  actions per second
  randomize on|off            jitter delays by up to 20%
  location current|fixed
  save
  quit";

impl Command {
    /// Parse one input line
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let verb = words.next().ok_or(CommandError::Empty)?.to_ascii_lowercase();
        let arg = words.next();

        let command = match verb.as_str() {
            "toggle" | "t" => Command::Toggle,
            "start" => Command::Start,
            "stop" => Command::Stop,
            "capture" => Command::Capture,
            "status" | "s" => Command::Status,
            "save" => Command::Save,
            "quit" | "exit" | "q" => Command::Quit,
            "mode" => Command::SetMode(word("mode", arg)?),
            "button" => Command::SetButton(word("button", arg)?),
            "location" => Command::SetLocation(word("location", arg)?),
            "key" => {
                let name = required("key", arg)?;
                if !is_action_key(name) {
                    return Err(invalid("key", name));
                }
                Command::SetKey(name.to_ascii_lowercase())
            }
            "cps" | "rate" => {
                let text = required("cps", arg)?;
                Command::SetRate(parse_rate(text).ok_or_else(|| invalid("cps", text))?)
            }
            "randomize" => {
                let text = required("randomize", arg)?;
                Command::SetRandomize(switch(text).ok_or_else(|| invalid("randomize", text))?)
            }
            _ => return Err(CommandError::Unknown(verb)),
        };
        Ok(command)
    }
}

fn required<'a>(command: &'static str, arg: Option<&'a str>) -> Result<&'a str, CommandError> {
    arg.ok_or(CommandError::MissingArgument(command))
}

fn invalid(command: &'static str, value: &str) -> CommandError {
    CommandError::InvalidArgument {
        command,
        value: value.to_string(),
    }
}

fn word<T: std::str::FromStr>(command: &'static str, arg: Option<&str>) -> Result<T, CommandError> {
    let text = required(command, arg)?;
    text.parse().map_err(|_| invalid(command, text))
}

fn switch(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
