//! Console presentation layer
//!
//! Reads commands from a line-oriented input and prints engine and hotkey
//! notifications. Everything goes through the command channel and the event
//! broadcast; nothing here touches the engine directly.

mod command;
mod stats;

pub use command::{Command, HELP};
pub use stats::format_stats;

use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::events::ClickerEvent;

/// How often a running engine's statistics line is printed
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Turns events into display lines, throttling progress output
#[derive(Debug, Default)]
pub struct StatusPrinter {
    started_at: Option<Instant>,
    last_report: Option<Instant>,
}

impl StatusPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line to print for an event, if any
    pub fn render(&mut self, event: &ClickerEvent, now: Instant) -> Option<String> {
        match event {
            ClickerEvent::EngineStarted => {
                self.started_at = Some(now);
                self.last_report = Some(now);
                Some("RUNNING".to_string())
            }
            ClickerEvent::ActionPerformed { count } => {
                let started = self.started_at?;
                let due = self
                    .last_report
                    .map_or(true, |last| now.duration_since(last) >= REPORT_INTERVAL);
                if !due {
                    return None;
                }
                self.last_report = Some(now);
                Some(format_stats(true, *count, now.duration_since(started)))
            }
            ClickerEvent::EngineStopped { count, elapsed_ms } => {
                self.started_at = None;
                Some(format!(
                    "STOPPED | {}",
                    format_stats(false, *count, Duration::from_millis(*elapsed_ms))
                ))
            }
            ClickerEvent::CaptureStarted => Some("Press any key...".to_string()),
            ClickerEvent::ToggleKeyChanged { key } => Some(format!("Toggle hotkey: {}", key)),
            ClickerEvent::ConfigChanged { field, value } => Some(format!("{} = {}", field, value)),
            ClickerEvent::Status(status) => Some(format!(
                "{} | {}\n{}\nToggle hotkey: {}{} | ESC to exit",
                if status.running { "RUNNING" } else { "STOPPED" },
                format_stats(
                    status.running,
                    status.count,
                    Duration::from_millis(status.elapsed_ms)
                ),
                status.action,
                status.toggle_key,
                if status.capturing { " (capturing)" } else { "" },
            )),
            ClickerEvent::ShutdownRequested => Some("Exiting...".to_string()),
        }
    }
}

/// Line-oriented front end
pub struct Console {
    command_tx: mpsc::Sender<Command>,
    event_rx: broadcast::Receiver<ClickerEvent>,
    printer: StatusPrinter,
}

impl Console {
    pub fn new(
        command_tx: mpsc::Sender<Command>,
        event_rx: broadcast::Receiver<ClickerEvent>,
    ) -> Self {
        Self {
            command_tx,
            event_rx,
            printer: StatusPrinter::new(),
        }
    }

    /// Serve until shutdown is announced or the event bus closes
    ///
    /// End of input is not a shutdown; hotkeys keep working without it.
    pub async fn run<W>(&mut self, mut lines: mpsc::Receiver<String>, mut output: W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut input_open = true;

        write_line(&mut output, "type 'help' for commands").await?;

        loop {
            tokio::select! {
                biased;

                line = lines.recv(), if input_open => match line {
                    Some(line) => {
                        if !self.handle_line(&line, &mut output).await? {
                            return Ok(());
                        }
                    }
                    None => {
                        debug!("console input closed");
                        input_open = false;
                    }
                },

                event = self.event_rx.recv() => match event {
                    Ok(event) => {
                        if let Some(text) = self.printer.render(&event, Instant::now()) {
                            write_line(&mut output, &text).await?;
                        }
                        if event == ClickerEvent::ShutdownRequested {
                            return Ok(());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(skipped = n, "console event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
            }
        }
    }

    /// Returns false once the command channel is gone
    async fn handle_line<W: AsyncWrite + Unpin>(&self, line: &str, output: &mut W) -> Result<bool> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }
        if line.eq_ignore_ascii_case("help") {
            write_line(output, HELP).await?;
            return Ok(true);
        }

        match Command::parse(line) {
            Ok(command) => {
                if self.command_tx.send(command).await.is_err() {
                    debug!("command channel closed");
                    return Ok(false);
                }
            }
            Err(e) => write_line(output, &format!("error: {}", e)).await?,
        }
        Ok(true)
    }
}

/// Read stdin on a dedicated thread and forward each line
///
/// A blocked stdin read must not hold up runtime shutdown, so this is a
/// plain thread rather than a tokio task.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    let spawned = std::thread::Builder::new()
        .name("console-input".to_string())
        .spawn(move || {
            for line in std::io::stdin().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(%e, "console input error");
                        break;
                    }
                }
            }
            debug!("console input thread finished");
        });
    if let Err(e) = spawned {
        warn!(%e, "failed to spawn console input thread");
    }
    rx
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await?;
    Ok(())
}
