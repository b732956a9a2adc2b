use std::sync::LazyLock;

use domain::diagnostics::{WHITESPACE, split, trim};
use domain::dome::AxisSetting;
use domain::protocol::Target;
use domain::{DomainError, DomainEvent};
use regex::Regex;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::dome::{DomeCommand, DomeHandle};

static WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Line-oriented command surface for a [`DomeHandle`].
///
/// Each line is either a JSON [`DomeCommand`] (`{"type":"Park"}`) or a
/// shorthand such as `move 120.5`, `open` or `set rotator velocity 900`.
/// Every line gets exactly one JSON response line. When an event stream is
/// attached, notifications are interleaved on the same writer as
/// `{"event": ...}` lines.
pub struct CommandListener {
    handle: DomeHandle,
    events: Option<broadcast::Receiver<DomainEvent>>,
}

impl CommandListener {
    pub fn new(handle: DomeHandle) -> Self {
        Self {
            handle,
            events: None,
        }
    }

    pub fn with_events(mut self, events: broadcast::Receiver<DomainEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Serve until the reader is exhausted or the actor stops
    pub async fn run<R, W>(&mut self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!("Listening for commands");
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => line,
                    None => break,
                },
                event = next_event(&mut self.events) => {
                    match event {
                        Ok(event) => write_line(&mut writer, &json!({ "event": event })).await?,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event forwarding lagged");
                        }
                        Err(RecvError::Closed) => self.events = None,
                    }
                    continue;
                }
            };

            let line = trim(&line, WHITESPACE);
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if !self.handle.is_running() {
                warn!("Dome actor is not running, closing command listener");
                break;
            }

            let response = match parse_command(line) {
                Ok(command) => {
                    debug!(command = command.name(), "Received command");
                    match self.handle.send(command).await {
                        Ok(reply) => json!({ "ok": true, "reply": reply }),
                        Err(e) => json!({ "ok": false, "error": e.to_string() }),
                    }
                }
                Err(e) => {
                    warn!(line, error = %e, "Unparseable command");
                    json!({ "ok": false, "error": e.to_string() })
                }
            };

            write_line(&mut writer, &response).await?;
        }

        info!("Command input closed");
        Ok(())
    }
}

async fn next_event(
    events: &mut Option<broadcast::Receiver<DomainEvent>>,
) -> Result<DomainEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    value: &serde_json::Value,
) -> std::io::Result<()> {
    writer.write_all(value.to_string().as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await
}

/// Parse one JSON or shorthand command line
pub fn parse_command(line: &str) -> Result<DomeCommand, DomainError> {
    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map_err(|e| DomainError::InvalidArgument(format!("bad command JSON: {e}")));
    }

    let words = split(&line.to_lowercase(), &WORDS);
    let args: Vec<&str> = words.iter().map(String::as_str).collect();

    let command = match args.as_slice() {
        ["move" | "goto", azimuth] => DomeCommand::MoveAbsolute {
            azimuth: degrees(azimuth)?,
        },
        ["sync", azimuth] => DomeCommand::Sync {
            azimuth: degrees(azimuth)?,
        },
        ["home"] => DomeCommand::Home,
        ["calibrate"] => DomeCommand::Calibrate,
        ["open"] => DomeCommand::OpenShutter,
        ["close"] => DomeCommand::CloseShutter,
        ["abort" | "stop"] => DomeCommand::Abort,
        ["park"] => DomeCommand::Park,
        ["unpark"] => DomeCommand::Unpark,
        ["park-here"] => DomeCommand::SetCurrentPark,
        ["park-default"] => DomeCommand::SetDefaultPark,
        ["home-position"] => DomeCommand::GetHomePosition,
        ["home-position", azimuth] => DomeCommand::SetHomePosition {
            azimuth: degrees(azimuth)?,
        },
        ["set", target, setting, value] => DomeCommand::SetAxisSetting {
            target: axis(target)?,
            setting: axis_setting(setting)?,
            value: value
                .parse()
                .map_err(|_| DomainError::InvalidArgument(format!("not an integer: {value}")))?,
        },
        ["get", target, setting] => DomeCommand::GetAxisSetting {
            target: axis(target)?,
            setting: axis_setting(setting)?,
        },
        ["battery"] => DomeCommand::ReadBattery,
        ["version"] => DomeCommand::ReadFirmwareVersion,
        ["connect"] => DomeCommand::Connect,
        ["disconnect"] => DomeCommand::Disconnect,
        ["status"] => DomeCommand::Status,
        _ => {
            return Err(DomainError::InvalidArgument(format!(
                "unknown command: {line}"
            )));
        }
    };
    Ok(command)
}

fn degrees(text: &str) -> Result<f64, DomainError> {
    text.parse()
        .map_err(|_| DomainError::InvalidArgument(format!("not a number: {text}")))
}

fn axis(text: &str) -> Result<Target, DomainError> {
    [Target::Rotator, Target::Shutter]
        .into_iter()
        .find(|t| t.as_str() == text)
        .ok_or_else(|| DomainError::InvalidArgument(format!("unknown axis: {text}")))
}

fn axis_setting(text: &str) -> Result<AxisSetting, DomainError> {
    let key = text.replace('-', "_");
    AxisSetting::ALL
        .into_iter()
        .find(|s| s.key() == key)
        .ok_or_else(|| DomainError::InvalidArgument(format!("unknown setting: {text}")))
}
