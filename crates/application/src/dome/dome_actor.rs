use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use domain::dome::{AxisSetting, BatteryReading, DeviceState, ShutterOperation};
use domain::protocol::{FirmwareVersion, Target};
use domain::{Azimuth, DomainError, DomainEvent, EventPublisher, StateStore, TransportFactory};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::controller::{DomeController, OperationStatus};

/// Host request, as accepted on any command surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomeCommand {
    MoveAbsolute { azimuth: f64 },
    Sync { azimuth: f64 },
    Home,
    Calibrate,
    OpenShutter,
    CloseShutter,
    Abort,
    Park,
    Unpark,
    SetCurrentPark,
    SetDefaultPark,
    SetAxisSetting {
        target: Target,
        setting: AxisSetting,
        value: i32,
    },
    GetAxisSetting {
        target: Target,
        setting: AxisSetting,
    },
    SetHomePosition { azimuth: f64 },
    GetHomePosition,
    ReadBattery,
    ReadFirmwareVersion,
    Connect,
    Disconnect,
    Status,
}

impl DomeCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::MoveAbsolute { .. } => "move_absolute",
            Self::Sync { .. } => "sync",
            Self::Home => "home",
            Self::Calibrate => "calibrate",
            Self::OpenShutter => "open_shutter",
            Self::CloseShutter => "close_shutter",
            Self::Abort => "abort",
            Self::Park => "park",
            Self::Unpark => "unpark",
            Self::SetCurrentPark => "set_current_park",
            Self::SetDefaultPark => "set_default_park",
            Self::SetAxisSetting { .. } => "set_axis_setting",
            Self::GetAxisSetting { .. } => "get_axis_setting",
            Self::SetHomePosition { .. } => "set_home_position",
            Self::GetHomePosition => "get_home_position",
            Self::ReadBattery => "read_battery",
            Self::ReadFirmwareVersion => "read_firmware_version",
            Self::Connect => "connect",
            Self::Disconnect => "disconnect",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CommandReply {
    Status { status: OperationStatus },
    Azimuth { azimuth: Azimuth },
    Value { value: i32 },
    Battery { reading: BatteryReading },
    Firmware { version: FirmwareVersion },
    State { state: Box<DeviceState> },
    Done,
}

pub struct DomeRequest {
    pub command: DomeCommand,
    pub reply: oneshot::Sender<Result<CommandReply, DomainError>>,
}

/// Cloneable front door to a running [`DomeActor`]
#[derive(Clone)]
pub struct DomeHandle {
    tx: mpsc::Sender<DomeRequest>,
    cancel_token: CancellationToken,
}

impl DomeHandle {
    pub async fn send(&self, command: DomeCommand) -> Result<CommandReply, DomainError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(DomeRequest { command, reply })
            .await
            .map_err(|_| DomainError::NotConnected)?;
        rx.await.map_err(|_| DomainError::NotConnected)?
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_running(&self) -> bool {
        !self.cancel_token.is_cancelled() && !self.tx.is_closed()
    }
}

/// Owns the controller and serializes host commands with the poll loop
pub struct DomeActor {
    name: String,
    controller: DomeController,
    factory: Arc<dyn TransportFactory>,
    store: Arc<dyn StateStore>,
    publisher: Arc<dyn EventPublisher>,
    poll_interval: Duration,
    commands: mpsc::Receiver<DomeRequest>,
    cancel_token: CancellationToken,
    wants_connection: bool,
}

impl DomeActor {
    pub fn new(
        name: impl Into<String>,
        controller: DomeController,
        factory: Arc<dyn TransportFactory>,
        store: Arc<dyn StateStore>,
        publisher: Arc<dyn EventPublisher>,
        poll_interval: Duration,
    ) -> (Self, DomeHandle) {
        let (tx, commands) = mpsc::channel(32);
        let cancel_token = CancellationToken::new();
        let handle = DomeHandle {
            tx,
            cancel_token: cancel_token.clone(),
        };
        let actor = Self {
            name: name.into(),
            controller,
            factory,
            store,
            publisher,
            poll_interval,
            commands,
            cancel_token,
            wants_connection: true,
        };
        (actor, handle)
    }

    pub async fn run(mut self) -> DomeController {
        info!(device = %self.name, "Starting dome actor");

        match self.store.load().await {
            Ok(pairs) if !pairs.is_empty() => {
                if let Err(e) = self.controller.load_state(&pairs) {
                    warn!(device = %self.name, error = %e, "Ignoring persisted state");
                }
            }
            Ok(_) => debug!(device = %self.name, "No persisted state"),
            Err(e) => warn!(device = %self.name, error = %e, "Could not load persisted state"),
        }
        let mut saved = self.controller.save_state();

        let before = self.controller.snapshot();
        if let Err(e) = self.open_link().await {
            error!(device = %self.name, error = %e, "Failed initial connection");
        }
        self.publish(self.controller.changes_since(&before)).await;

        info!(device = %self.name, interval_ms = self.poll_interval.as_millis() as u64, "Starting poll loop");
        let mut timer = tokio::time::interval(self.poll_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!(device = %self.name, "Shutdown signal received");
                    break;
                }
                request = self.commands.recv() => {
                    let Some(request) = request else {
                        info!(device = %self.name, "Command channel closed");
                        break;
                    };
                    self.handle_request(request).await;
                }
                _ = timer.tick() => {
                    self.tick().await;
                }
            }
            self.persist(&mut saved).await;
        }

        let before = self.controller.snapshot();
        if let Err(e) = self.controller.disconnect().await {
            warn!(device = %self.name, error = %e, "Error while disconnecting");
        }
        self.publish(self.controller.changes_since(&before)).await;
        self.persist(&mut saved).await;
        info!(device = %self.name, "Dome actor stopped");
        self.controller
    }

    async fn tick(&mut self) {
        if !self.controller.is_connected() {
            if !self.wants_connection {
                return;
            }
            let before = self.controller.snapshot();
            self.controller.mark_reconnecting();
            match self.open_link().await {
                Ok(_) => info!(device = %self.name, "Reconnected"),
                Err(e) => warn!(device = %self.name, error = %e, "Failed to reconnect"),
            }
            self.publish(self.controller.changes_since(&before)).await;
            return;
        }

        let outcome = self.controller.on_poll_tick().await;
        if let Some(e) = &outcome.error {
            warn!(device = %self.name, error = %e, "Poll tick failed");
        }
        self.publish(outcome.changes).await;
    }

    async fn handle_request(&mut self, request: DomeRequest) {
        let DomeRequest { command, reply } = request;
        let name = command.name();
        debug!(device = %self.name, command = name, "Handling command");

        let before = self.controller.snapshot();
        let result = self.execute(command).await;
        let mut changes = self.controller.changes_since(&before);
        if let Err(e) = &result {
            warn!(device = %self.name, command = name, error = %e, "Command rejected");
            changes.push(DomainEvent::operation_failed(name, e.to_string()));
        }
        self.publish(changes).await;

        if reply.send(result).is_err() {
            debug!(device = %self.name, command = name, "Requester went away");
        }
    }

    async fn execute(&mut self, command: DomeCommand) -> Result<CommandReply, DomainError> {
        let controller = &mut self.controller;
        let reply = match command {
            DomeCommand::MoveAbsolute { azimuth } => status(controller.move_absolute(azimuth).await?),
            DomeCommand::Sync { azimuth } => status(controller.sync(azimuth).await?),
            DomeCommand::Home => status(controller.home().await?),
            DomeCommand::Calibrate => status(controller.calibrate().await?),
            DomeCommand::OpenShutter => {
                status(controller.control_shutter(ShutterOperation::Open).await?)
            }
            DomeCommand::CloseShutter => {
                status(controller.control_shutter(ShutterOperation::Close).await?)
            }
            DomeCommand::Abort => status(controller.abort().await?),
            DomeCommand::Park => status(controller.park().await?),
            DomeCommand::Unpark => status(controller.unpark().await?),
            DomeCommand::SetCurrentPark => CommandReply::Azimuth {
                azimuth: controller.set_current_park(),
            },
            DomeCommand::SetDefaultPark => CommandReply::Azimuth {
                azimuth: controller.set_default_park(),
            },
            DomeCommand::SetAxisSetting {
                target,
                setting,
                value,
            } => {
                controller.set_axis_setting(target, setting, value).await?;
                CommandReply::Done
            }
            DomeCommand::GetAxisSetting { target, setting } => CommandReply::Value {
                value: controller.get_axis_setting(target, setting).await?,
            },
            DomeCommand::SetHomePosition { azimuth } => {
                controller.set_home_position(azimuth).await?;
                CommandReply::Done
            }
            DomeCommand::GetHomePosition => CommandReply::Azimuth {
                azimuth: controller.get_home_position().await?,
            },
            DomeCommand::ReadBattery => CommandReply::Battery {
                reading: controller.read_battery().await?,
            },
            DomeCommand::ReadFirmwareVersion => CommandReply::Firmware {
                version: controller.read_firmware_version().await?,
            },
            DomeCommand::Connect => {
                if self.controller.is_connected() {
                    return Err(DomainError::Busy("Already connected".to_string()));
                }
                self.wants_connection = true;
                CommandReply::Firmware {
                    version: self.open_link().await?,
                }
            }
            DomeCommand::Disconnect => {
                self.wants_connection = false;
                self.controller.disconnect().await?;
                CommandReply::Done
            }
            DomeCommand::Status => CommandReply::State {
                state: Box::new(self.controller.snapshot()),
            },
        };
        Ok(reply)
    }

    /// Open a transport, handshake, then read the startup values
    async fn open_link(&mut self) -> Result<FirmwareVersion, DomainError> {
        let transport = self.factory.open()?;
        let version = self.controller.connect(transport).await?;
        if let Err(e) = self.controller.refresh().await {
            warn!(device = %self.name, error = %e, "Startup reads incomplete");
        }
        Ok(version)
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.publisher.publish_batch(events).await {
            warn!(device = %self.name, error = %e, "Failed to publish events");
        }
    }

    async fn persist(&self, saved: &mut BTreeMap<String, String>) {
        let current = self.controller.save_state();
        if current == *saved {
            return;
        }
        match self.store.save(&current).await {
            Ok(()) => {
                debug!(device = %self.name, keys = current.len(), "State persisted");
                *saved = current;
            }
            Err(e) => error!(device = %self.name, error = %e, "Failed to persist state"),
        }
    }
}

fn status(status: OperationStatus) -> CommandReply {
    CommandReply::Status { status }
}
