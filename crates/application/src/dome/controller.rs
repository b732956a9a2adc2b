use std::collections::BTreeMap;

use domain::dome::{
    Azimuth, AxisSetting, BatteryReading, DeviceState, DomePolicy, EventOutcome, ParkPhase,
    ShutterOperation, ShutterPhase, ShutterStatus,
};
use domain::driver::{ConnectionState, Transport};
use domain::error::Result;
use domain::protocol::{Command, DeviceProfile, FirmwareVersion, FrameCodec, Target};
use domain::{DomainError, DomainEvent, DomeSettings};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::dispatch::EventDispatcher;
use crate::protocol::{FramedLink, ParameterProtocol};

/// Result of an accepted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// Accepted by the firmware; completion arrives as an event
    InProgress,
    Completed,
}

/// Summary of one poll tick for the host to publish
#[derive(Debug, Default)]
pub struct PollOutcome {
    pub events_processed: usize,
    pub changes: Vec<DomainEvent>,
    pub error: Option<DomainError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParkOperation {
    Park,
    Unpark,
}

impl ParkOperation {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Park => "park",
            Self::Unpark => "unpark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParkStep {
    /// Shutter close issued; the park motion follows the `SC` event
    AwaitShutterClosed,
    /// Park motion failed and is re-issued on the next tick
    IssueMotion,
    /// The whole request failed and is re-issued on the next tick
    Reissue(ParkOperation),
}

#[derive(Debug, Clone, Copy)]
struct PendingPark {
    step: ParkStep,
    attempts: u32,
}

fn busy(reason: &'static str) -> DomainError {
    DomainError::Busy(reason.to_string())
}

/// Dome state machine and the host's entry points into the core.
///
/// Every operation validates its arguments and the current phase before any
/// wire traffic, and only moves a phase forward once the firmware has echoed
/// the command. Completion of physical work is driven by events drained in
/// [`DomeController::on_poll_tick`].
pub struct DomeController {
    profile: DeviceProfile,
    policy: DomePolicy,
    dispatcher: EventDispatcher,
    protocol: Option<ParameterProtocol>,
    state: DeviceState,
    pending: Option<PendingPark>,
    last_error: Option<DomainError>,
}

impl DomeController {
    pub fn new(profile: DeviceProfile, policy: DomePolicy) -> Self {
        let state = DeviceState::new(DomeSettings::from_policy(&policy));
        Self {
            dispatcher: EventDispatcher::new(&profile),
            profile,
            policy,
            protocol: None,
            state,
            pending: None,
            last_error: None,
        }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn policy(&self) -> &DomePolicy {
        &self.policy
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn snapshot(&self) -> DeviceState {
        self.state.clone()
    }

    /// Most recent link or protocol failure
    pub fn last_error(&self) -> Option<&DomainError> {
        self.last_error.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.protocol.is_some() && self.state.connection().is_connected()
    }

    // ----- connection lifecycle -----

    /// Attach a transport and perform the firmware-version handshake
    pub async fn connect(&mut self, transport: Box<dyn Transport>) -> Result<FirmwareVersion> {
        let connecting = self
            .state
            .connection()
            .to_connecting()
            .map_err(|e| DomainError::Busy(e.to_string()))?;
        self.state.set_connection(connecting);

        let link = FramedLink::new(transport, FrameCodec::new(self.profile.clone()));
        self.protocol = Some(ParameterProtocol::new(link));

        match self.read_firmware_version().await {
            Ok(version) => {
                let connected = self
                    .state
                    .connection()
                    .to_connected()
                    .map_err(|e| DomainError::Busy(e.to_string()))?;
                self.state.set_connection(connected);
                info!(firmware = %version, "Dome controller connected");
                Ok(version)
            }
            Err(e) => {
                warn!(error = %e, "Handshake failed");
                if self.protocol.is_some() {
                    self.teardown(ConnectionState::Failed).await;
                }
                Err(e)
            }
        }
    }

    /// Best-effort read of the values the host displays; failures are logged
    pub async fn refresh(&mut self) -> Result<()> {
        self.ensure_connected()?;

        if let Err(e) = self.read_position().await {
            warn!(error = %e, "Could not read rotator position");
        }
        if let Err(e) = self.get_home_position().await {
            warn!(error = %e, "Could not read home position");
        }
        for target in [Target::Rotator, Target::Shutter] {
            for setting in AxisSetting::ALL {
                if !self.is_connected() {
                    break;
                }
                if let Err(e) = self.get_axis_setting(target, setting).await {
                    warn!(axis = target.as_str(), setting = setting.key(), error = %e, "Could not read setting");
                }
            }
        }
        if self.is_connected() {
            if let Err(e) = self.read_battery().await {
                warn!(error = %e, "Could not read battery level");
            }
        }

        // A fatal error during the reads has already torn the link down
        self.ensure_connected()
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.teardown(ConnectionState::Disconnected).await;
        info!("Dome controller disconnected");
        Ok(())
    }

    /// The host is about to re-open the transport after a failure
    pub fn mark_reconnecting(&mut self) {
        if let Ok(next) = self.state.connection().to_reconnecting() {
            self.state.set_connection(next);
        }
    }

    // ----- poll loop -----

    /// Drain and apply events, then issue at most one deferred command
    pub async fn on_poll_tick(&mut self) -> PollOutcome {
        let before = self.state.clone();
        let mut outcome = PollOutcome::default();
        let mut notices = Vec::new();

        if self.protocol.is_none() {
            return outcome;
        }

        match self.check_events().await {
            Ok(bodies) => {
                for body in bodies {
                    outcome.events_processed += 1;
                    if let EventOutcome::FirmwareError(code) =
                        self.dispatcher.process_event(&body, &mut self.state)
                    {
                        notices.push(DomainEvent::operation_failed(
                            "firmware",
                            format!("firmware error {code}"),
                        ));
                    }
                }
            }
            Err(e) => outcome.error = Some(e),
        }

        if outcome.error.is_none() {
            if let Err(e) = self.advance_pending().await {
                notices.push(DomainEvent::operation_failed("park", e.to_string()));
                outcome.error = Some(e);
            }
        }

        outcome.changes = self.changes_since(&before);
        outcome.changes.append(&mut notices);
        if outcome.events_processed > 0 || !outcome.changes.is_empty() {
            debug!(
                events = outcome.events_processed,
                changes = outcome.changes.len(),
                "Poll tick"
            );
        }
        outcome
    }

    /// Notifications describing how the state moved away from `before`
    pub fn changes_since(&self, before: &DeviceState) -> Vec<DomainEvent> {
        let after = &self.state;
        let mut changes = Vec::new();

        if before.azimuth() != after.azimuth() || before.target_azimuth() != after.target_azimuth()
        {
            changes.push(DomainEvent::azimuth_changed(
                after.azimuth(),
                after.target_azimuth(),
            ));
        }
        if before.motion() != after.motion() {
            changes.push(DomainEvent::motion_phase_changed(before.motion(), after.motion()));
        }
        if before.shutter() != after.shutter() {
            changes.push(DomainEvent::shutter_phase_changed(
                before.shutter(),
                after.shutter(),
            ));
        }
        if before.shutter_status() != after.shutter_status() {
            changes.push(DomainEvent::shutter_status_changed(after.shutter_status()));
        }
        if before.park() != after.park() {
            changes.push(DomainEvent::park_phase_changed(before.park(), after.park()));
        }
        if before.calibration() != after.calibration() {
            changes.push(DomainEvent::calibration_phase_changed(after.calibration()));
        }
        if let Some(home) = after.home_position().filter(|h| before.home_position() != Some(*h)) {
            changes.push(DomainEvent::home_position_changed(home));
        }
        if let (Some(reading), Some(status)) = (after.battery(), after.battery_status()) {
            if before.battery() != Some(reading) {
                changes.push(DomainEvent::battery_updated(reading, status));
            }
        }
        if let Some(version) = after
            .firmware_version()
            .filter(|v| before.firmware_version() != Some(*v))
        {
            changes.push(DomainEvent::firmware_version_changed(version));
        }
        if before.connection() != after.connection() {
            let reason = match after.connection() {
                ConnectionState::Failed => self.last_error.as_ref().map(|e| e.to_string()),
                _ => None,
            };
            changes.push(DomainEvent::connection_changed(after.connection(), reason));
        }
        changes
    }

    // ----- motion -----

    /// Start a slew; completion is confirmed by a motion-complete event
    pub async fn move_absolute(&mut self, degrees: f64) -> Result<OperationStatus> {
        let target = Azimuth::new(degrees)?;
        self.ensure_connected()?;
        if self.state.park() != ParkPhase::Unparked {
            return Err(busy("Dome is parked or parking"));
        }
        self.state.motion().to_moving().map_err(busy)?;

        let units = target.to_wire(self.profile.azimuth_scale);
        let result = self
            .protocol()?
            .set_parameter(Command::GotoAzimuth, Target::Rotator, units)
            .await;
        self.check("move", result).await?;

        self.state.begin_move(target);
        info!(azimuth = target.degrees(), "Slewing");
        Ok(OperationStatus::InProgress)
    }

    /// Rewrite the position register without moving
    pub async fn sync(&mut self, degrees: f64) -> Result<OperationStatus> {
        let azimuth = Azimuth::new(degrees)?;
        self.ensure_connected()?;
        self.state.motion().to_syncing().map_err(busy)?;

        let units = azimuth.to_wire(self.profile.azimuth_scale);
        let result = self
            .protocol()?
            .set_parameter(Command::Position, Target::Rotator, units)
            .await;
        self.check("sync", result).await?;

        self.state.record_sync(azimuth);
        info!(azimuth = azimuth.degrees(), "Synced");
        Ok(OperationStatus::Completed)
    }

    pub async fn home(&mut self) -> Result<OperationStatus> {
        self.ensure_connected()?;
        if self.state.park() != ParkPhase::Unparked {
            return Err(busy("Dome is parked or parking"));
        }
        self.state.motion().to_homing().map_err(busy)?;

        let result = self
            .protocol()?
            .execute(Command::GotoHome, Target::Rotator)
            .await;
        self.check("home", result).await?;

        self.state.begin_homing();
        info!("Homing");
        Ok(OperationStatus::InProgress)
    }

    pub async fn calibrate(&mut self) -> Result<OperationStatus> {
        self.ensure_connected()?;
        if self.state.park() != ParkPhase::Unparked {
            return Err(busy("Dome is parked or parking"));
        }
        self.state.motion().to_calibrating().map_err(busy)?;

        let result = self
            .protocol()?
            .execute(Command::Calibrate, Target::Rotator)
            .await;
        self.check("calibrate", result).await?;

        self.state.begin_calibration();
        info!("Calibrating");
        Ok(OperationStatus::InProgress)
    }

    /// Open or close the shutter; rejected without I/O while it is busy
    pub async fn control_shutter(&mut self, operation: ShutterOperation) -> Result<OperationStatus> {
        self.ensure_connected()?;
        if self.state.park().is_busy() {
            return Err(busy("Park or unpark in progress"));
        }
        self.state.shutter().to_operating(operation).map_err(busy)?;

        let command = match operation {
            ShutterOperation::Open => Command::Open,
            ShutterOperation::Close => Command::Close,
        };
        let result = self.protocol()?.execute(command, Target::Shutter).await;
        self.check("shutter", result).await?;

        self.state.begin_shutter(operation);
        info!(operation = ?operation, "Shutter moving");
        Ok(OperationStatus::InProgress)
    }

    /// Always legal; active phases settle once the firmware confirms
    pub async fn abort(&mut self) -> Result<OperationStatus> {
        self.ensure_connected()?;
        let result = self
            .protocol()?
            .execute(Command::Abort, Target::Controller)
            .await;
        self.check("abort", result).await?;

        self.pending = None;
        self.state.record_abort_ack();
        info!("Abort acknowledged");
        if self.state.motion().is_busy() || self.state.shutter().is_busy() {
            Ok(OperationStatus::InProgress)
        } else {
            Ok(OperationStatus::Completed)
        }
    }

    // ----- parking -----

    pub async fn park(&mut self) -> Result<OperationStatus> {
        self.ensure_connected()?;
        self.state.park().to_parking().map_err(busy)?;
        if self.state.motion().is_busy() {
            return Err(busy("Rotator is busy"));
        }

        match self.start_park().await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.schedule_retry(ParkOperation::Park, &e);
                Err(e)
            }
        }
    }

    pub async fn unpark(&mut self) -> Result<OperationStatus> {
        self.ensure_connected()?;
        self.state.park().to_unparking().map_err(busy)?;

        match self.start_unpark().await {
            Ok(status) => Ok(status),
            Err(e) => {
                self.schedule_retry(ParkOperation::Unpark, &e);
                Err(e)
            }
        }
    }

    /// Use the current heading as the park position
    pub fn set_current_park(&mut self) -> Azimuth {
        let azimuth = self.state.azimuth();
        self.state.set_park_azimuth(azimuth);
        info!(park = azimuth.degrees(), "Park position set to current azimuth");
        azimuth
    }

    pub fn set_default_park(&mut self) -> Azimuth {
        let azimuth = self.policy.default_park_azimuth;
        self.state.set_park_azimuth(azimuth);
        info!(park = azimuth.degrees(), "Park position reset to default");
        azimuth
    }

    pub fn set_close_shutter_on_park(&mut self, enabled: bool) {
        self.state.set_close_shutter_on_park(enabled);
    }

    async fn start_park(&mut self) -> Result<OperationStatus> {
        let settings = self.state.settings();
        if settings.close_shutter_on_park && self.state.shutter_status() != ShutterStatus::Closed {
            if self.state.shutter() != ShutterPhase::Closing {
                self.state
                    .shutter()
                    .to_operating(ShutterOperation::Close)
                    .map_err(busy)?;
                let result = self
                    .protocol()?
                    .execute(Command::Close, Target::Shutter)
                    .await;
                self.check("park", result).await?;
                self.state.begin_shutter(ShutterOperation::Close);
            }
            self.state.set_park(ParkPhase::Parking);
            self.pending = Some(PendingPark {
                step: ParkStep::AwaitShutterClosed,
                attempts: 0,
            });
            info!("Closing shutter before parking");
            return Ok(OperationStatus::InProgress);
        }

        self.issue_park_motion().await?;
        self.pending = None;
        Ok(OperationStatus::InProgress)
    }

    async fn issue_park_motion(&mut self) -> Result<()> {
        let park = self.state.settings().park_azimuth;
        let units = park.to_wire(self.profile.azimuth_scale);
        let result = self
            .protocol()?
            .set_parameter(Command::Park, Target::Rotator, units)
            .await;
        self.check("park", result).await?;

        self.state.begin_move(park);
        self.state.set_park(ParkPhase::Parking);
        info!(park = park.degrees(), "Parking");
        Ok(())
    }

    async fn start_unpark(&mut self) -> Result<OperationStatus> {
        if self.state.settings().close_shutter_on_park
            && self.state.shutter_status() != ShutterStatus::Open
        {
            self.ensure_connected()?;
            self.state
                .shutter()
                .to_operating(ShutterOperation::Open)
                .map_err(busy)?;
            let result = self
                .protocol()?
                .execute(Command::Open, Target::Shutter)
                .await;
            self.check("unpark", result).await?;

            self.state.begin_shutter(ShutterOperation::Open);
            self.state.set_park(ParkPhase::Unparking);
            self.pending = None;
            info!("Opening shutter to unpark");
            return Ok(OperationStatus::InProgress);
        }

        self.state.set_park(ParkPhase::Unparked);
        self.pending = None;
        info!("Unparked");
        Ok(OperationStatus::Completed)
    }

    fn schedule_retry(&mut self, operation: ParkOperation, error: &DomainError) {
        if error.is_retryable() && self.policy.max_operation_retries > 0 {
            warn!(operation = operation.as_str(), error = %error, "Will retry on next poll tick");
            self.pending = Some(PendingPark {
                step: ParkStep::Reissue(operation),
                attempts: 0,
            });
        }
    }

    /// Run the deferred park/unpark step, if any
    async fn advance_pending(&mut self) -> Result<()> {
        let Some(pending) = self.pending else {
            return Ok(());
        };

        let result = match pending.step {
            ParkStep::AwaitShutterClosed => {
                if self.state.park() != ParkPhase::Parking {
                    self.pending = None;
                    return Ok(());
                }
                if self.state.shutter_status() != ShutterStatus::Closed
                    || self.state.shutter().is_busy()
                {
                    return Ok(());
                }
                info!("Shutter closed, starting park motion");
                self.issue_park_motion().await.map(|_| {
                    self.pending = None;
                })
            }
            ParkStep::IssueMotion => self.issue_park_motion().await.map(|_| {
                self.pending = None;
            }),
            ParkStep::Reissue(ParkOperation::Park) => {
                if self.state.park().to_parking().is_err() || self.state.motion().is_busy() {
                    self.pending = None;
                    return Ok(());
                }
                self.start_park().await.map(|_| ())
            }
            ParkStep::Reissue(ParkOperation::Unpark) => {
                if self.state.park().to_unparking().is_err() {
                    self.pending = None;
                    return Ok(());
                }
                self.start_unpark().await.map(|_| ())
            }
        };

        if let Err(e) = &result {
            let attempts = pending.attempts + 1;
            if e.is_retryable() && attempts < self.policy.max_operation_retries {
                warn!(attempt = attempts, error = %e, "Park step failed, retrying on next tick");
                let step = match pending.step {
                    ParkStep::AwaitShutterClosed | ParkStep::IssueMotion => ParkStep::IssueMotion,
                    other => other,
                };
                self.pending = Some(PendingPark { step, attempts });
            } else {
                error!(attempts, error = %e, "Giving up on park operation");
                self.pending = None;
                match self.state.park() {
                    ParkPhase::Parking => self.state.set_park(ParkPhase::Unparked),
                    ParkPhase::Unparking => self.state.set_park(ParkPhase::Parked),
                    _ => {}
                }
            }
        }
        result
    }

    // ----- parameters -----

    pub async fn set_axis_setting(
        &mut self,
        target: Target,
        setting: AxisSetting,
        value: i32,
    ) -> Result<()> {
        self.state.settings().axis(target)?;
        setting.validate(value)?;
        self.ensure_connected()?;

        let result = self
            .protocol()?
            .set_parameter(setting.command(), target, value)
            .await;
        self.check("set setting", result).await?;

        self.state.record_axis_setting(target, setting, value)?;
        debug!(axis = target.as_str(), setting = setting.key(), value, "Setting written");
        Ok(())
    }

    pub async fn get_axis_setting(&mut self, target: Target, setting: AxisSetting) -> Result<i32> {
        self.state.settings().axis(target)?;
        self.ensure_connected()?;

        let result = self.protocol()?.get_integer(setting.command(), target).await;
        let value = self.check("get setting", result).await?;

        self.state.record_axis_setting(target, setting, value)?;
        Ok(value)
    }

    pub async fn set_home_position(&mut self, degrees: f64) -> Result<()> {
        let azimuth = Azimuth::new(degrees)?;
        self.ensure_connected()?;

        let units = azimuth.to_wire(self.profile.azimuth_scale);
        let result = self
            .protocol()?
            .set_parameter(Command::HomePosition, Target::Rotator, units)
            .await;
        self.check("set home", result).await?;

        self.state.record_home_position(azimuth);
        Ok(())
    }

    pub async fn get_home_position(&mut self) -> Result<Azimuth> {
        self.ensure_connected()?;
        let result = self
            .protocol()?
            .get_integer(Command::HomePosition, Target::Rotator)
            .await;
        let units = self.check("get home", result).await?;

        let azimuth = Azimuth::from_wire(units, self.profile.azimuth_scale);
        self.state.record_home_position(azimuth);
        Ok(azimuth)
    }

    pub async fn read_position(&mut self) -> Result<Azimuth> {
        self.ensure_connected()?;
        let result = self
            .protocol()?
            .get_integer(Command::Position, Target::Rotator)
            .await;
        let units = self.check("get position", result).await?;

        let azimuth = Azimuth::from_wire(units, self.profile.azimuth_scale);
        self.state.record_azimuth(azimuth);
        Ok(azimuth)
    }

    pub async fn read_battery(&mut self) -> Result<BatteryReading> {
        self.ensure_connected()?;
        let result = self
            .protocol()?
            .get_parameter(Command::BatteryLevel, Target::Shutter)
            .await;
        let payload = self.check("battery", result).await?;
        let reading = self.check("battery", BatteryReading::parse(&payload)).await?;

        self.state.record_battery(reading);
        Ok(reading)
    }

    pub async fn read_firmware_version(&mut self) -> Result<FirmwareVersion> {
        let result = self
            .protocol()?
            .get_parameter(Command::FirmwareVersion, Target::Controller)
            .await;
        let payload = self.check("firmware version", result).await?;
        let version = self
            .check("firmware version", FirmwareVersion::parse(&payload))
            .await?;

        self.state.record_firmware_version(version);
        Ok(version)
    }

    // ----- persistence -----

    pub fn save_state(&self) -> BTreeMap<String, String> {
        self.state.settings().to_key_values()
    }

    /// Restore persisted values; nothing changes unless every value parses
    pub fn load_state(&mut self, pairs: &BTreeMap<String, String>) -> Result<()> {
        let settings = self.state.settings().with_key_values(pairs)?;
        self.state.restore_settings(settings);
        debug!(keys = pairs.len(), "Dome state loaded");
        Ok(())
    }

    // ----- internals -----

    async fn check_events(&mut self) -> Result<Vec<String>> {
        let result = self.protocol()?.check_events().await;
        self.check("check events", result).await
    }

    fn protocol(&mut self) -> Result<&mut ParameterProtocol> {
        self.protocol.as_mut().ok_or(DomainError::NotConnected)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(DomainError::NotConnected)
        }
    }

    /// Record a failure; a fatal one drops the link
    async fn check<T>(&mut self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.last_error = Some(e.clone());
            if e.is_fatal() {
                error!(operation, error = %e, "Link failure, dropping connection");
                self.teardown(ConnectionState::Failed).await;
            } else {
                warn!(operation, error = %e, "Operation failed");
            }
        }
        result
    }

    async fn teardown(&mut self, next: ConnectionState) {
        if let Some(mut protocol) = self.protocol.take() {
            if let Err(e) = protocol.close().await {
                warn!(error = %e, "Error closing transport");
            }
        }
        self.pending = None;
        self.state.reset_activity();
        self.state.set_connection(next);
    }
}
