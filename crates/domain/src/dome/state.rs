use serde::{Deserialize, Serialize};

use super::azimuth::Azimuth;
use super::firmware_event::{BatteryReading, BatteryStatus, FirmwareEvent};
use super::phase::{
    CalibrationPhase, MotionPhase, ParkPhase, ShutterOperation, ShutterPhase, ShutterStatus,
};
use super::settings::{AxisSetting, DomeSettings};
use crate::driver::ConnectionState;
use crate::error::Result;
use crate::protocol::{FirmwareVersion, Target};

/// What applying one firmware event did to the device state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Well-formed but meaningless in the current phase
    Ignored(&'static str),
    Unknown(String),
    /// Firmware reported a fault; phases are left untouched
    FirmwareError(String),
}

/// Canonical view of the dome.
///
/// Firmware progress only enters through [`DeviceState::apply_event`]; the
/// `begin_*`/`record_*` methods are called by the controller after the
/// matching command has been acknowledged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceState {
    azimuth: Azimuth,
    target_azimuth: Azimuth,
    motion: MotionPhase,
    shutter: ShutterPhase,
    shutter_status: ShutterStatus,
    park: ParkPhase,
    calibration: CalibrationPhase,
    battery: Option<BatteryReading>,
    firmware_version: Option<FirmwareVersion>,
    connection: ConnectionState,
    settings: DomeSettings,
}

impl DeviceState {
    pub fn new(settings: DomeSettings) -> Self {
        let park = if settings.parked {
            ParkPhase::Parked
        } else {
            ParkPhase::Unparked
        };
        Self {
            park,
            settings,
            ..Self::default()
        }
    }

    pub fn azimuth(&self) -> Azimuth {
        self.azimuth
    }

    pub fn target_azimuth(&self) -> Azimuth {
        self.target_azimuth
    }

    pub fn motion(&self) -> MotionPhase {
        self.motion
    }

    pub fn shutter(&self) -> ShutterPhase {
        self.shutter
    }

    pub fn shutter_status(&self) -> ShutterStatus {
        self.shutter_status
    }

    pub fn park(&self) -> ParkPhase {
        self.park
    }

    pub fn calibration(&self) -> CalibrationPhase {
        self.calibration
    }

    pub fn home_position(&self) -> Option<Azimuth> {
        self.settings.home_position
    }

    pub fn battery(&self) -> Option<BatteryReading> {
        self.battery
    }

    pub fn battery_status(&self) -> Option<BatteryStatus> {
        self.battery
            .map(|reading| reading.status(&self.settings.battery))
    }

    pub fn firmware_version(&self) -> Option<FirmwareVersion> {
        self.firmware_version
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn settings(&self) -> &DomeSettings {
        &self.settings
    }

    /// Nothing is moving and no composite operation is pending
    pub fn is_idle(&self) -> bool {
        !self.motion.is_busy() && !self.shutter.is_busy() && !self.park.is_busy()
    }

    pub fn begin_move(&mut self, target: Azimuth) {
        self.target_azimuth = target;
        self.motion = MotionPhase::Moving;
    }

    /// Sync rewrites the position register; nothing physically moves
    pub fn record_sync(&mut self, azimuth: Azimuth) {
        self.azimuth = azimuth;
        self.target_azimuth = azimuth;
        self.motion = MotionPhase::Idle;
    }

    pub fn begin_homing(&mut self) {
        self.motion = MotionPhase::Homing;
    }

    pub fn begin_calibration(&mut self) {
        self.motion = MotionPhase::Calibrating;
        self.calibration = CalibrationPhase::Calibrating;
    }

    pub fn begin_shutter(&mut self, operation: ShutterOperation) {
        self.shutter = match operation {
            ShutterOperation::Open => ShutterPhase::Opening,
            ShutterOperation::Close => ShutterPhase::Closing,
        };
    }

    /// Abort acknowledged: active phases wait for confirmation, pending
    /// park/unpark operations are cancelled right away
    pub fn record_abort_ack(&mut self) {
        self.motion = self.motion.to_aborting();
        self.shutter = self.shutter.to_aborting();
        match self.park {
            ParkPhase::Parking => self.set_park(ParkPhase::Unparked),
            ParkPhase::Unparking => self.set_park(ParkPhase::Parked),
            _ => {}
        }
    }

    /// The link is gone, so no completion event can arrive for work in
    /// progress
    pub fn reset_activity(&mut self) {
        self.motion = MotionPhase::Idle;
        self.shutter = ShutterPhase::Idle;
        self.target_azimuth = self.azimuth;
        if self.calibration == CalibrationPhase::Calibrating {
            self.calibration = CalibrationPhase::Uncalibrated;
        }
        match self.park {
            ParkPhase::Parking => self.set_park(ParkPhase::Unparked),
            ParkPhase::Unparking => self.set_park(ParkPhase::Parked),
            _ => {}
        }
    }

    pub fn set_park(&mut self, phase: ParkPhase) {
        self.park = phase;
        match phase {
            ParkPhase::Parked => self.settings.parked = true,
            ParkPhase::Unparked => self.settings.parked = false,
            _ => {}
        }
    }

    pub fn set_park_azimuth(&mut self, azimuth: Azimuth) {
        self.settings.park_azimuth = azimuth;
    }

    pub fn record_azimuth(&mut self, azimuth: Azimuth) {
        self.azimuth = azimuth;
    }

    pub fn record_home_position(&mut self, azimuth: Azimuth) {
        self.settings.home_position = Some(azimuth);
    }

    pub fn record_battery(&mut self, reading: BatteryReading) {
        self.battery = Some(reading);
    }

    pub fn record_firmware_version(&mut self, version: FirmwareVersion) {
        self.firmware_version = Some(version);
    }

    pub fn record_axis_setting(
        &mut self,
        target: Target,
        setting: AxisSetting,
        value: i32,
    ) -> Result<()> {
        self.settings.axis_mut(target)?.set(setting, value);
        Ok(())
    }

    pub fn set_close_shutter_on_park(&mut self, enabled: bool) {
        self.settings.close_shutter_on_park = enabled;
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        self.connection = connection;
    }

    /// Replace the persisted part of the state, e.g. after a restart
    pub fn restore_settings(&mut self, settings: DomeSettings) {
        if !self.park.is_busy() {
            self.park = if settings.parked {
                ParkPhase::Parked
            } else {
                ParkPhase::Unparked
            };
        }
        self.settings = settings;
    }

    /// Apply one unsolicited firmware notification
    pub fn apply_event(&mut self, event: &FirmwareEvent) -> EventOutcome {
        match event {
            FirmwareEvent::PositionUpdate { position } => {
                self.azimuth = *position;
                EventOutcome::Applied
            }
            FirmwareEvent::MotionComplete { position } => self.motion_complete(*position),
            FirmwareEvent::ShutterOpened => self.shutter_complete(ShutterStatus::Open),
            FirmwareEvent::ShutterClosed => self.shutter_complete(ShutterStatus::Closed),
            FirmwareEvent::HomeFound { position } => {
                self.settings.home_position = Some(*position);
                self.azimuth = *position;
                if self.motion == MotionPhase::Homing {
                    self.motion = MotionPhase::Idle;
                    self.target_azimuth = *position;
                }
                EventOutcome::Applied
            }
            FirmwareEvent::CalibrationComplete => {
                if self.motion != MotionPhase::Calibrating {
                    return EventOutcome::Ignored("no calibration in progress");
                }
                self.motion = MotionPhase::Idle;
                self.calibration = CalibrationPhase::Calibrated;
                EventOutcome::Applied
            }
            FirmwareEvent::BatteryUpdate(reading) => {
                self.battery = Some(*reading);
                EventOutcome::Applied
            }
            FirmwareEvent::AbortComplete { target } => self.abort_complete(*target),
            FirmwareEvent::Error { code } => EventOutcome::FirmwareError(code.clone()),
            FirmwareEvent::Unknown(body) => EventOutcome::Unknown(body.clone()),
        }
    }

    fn motion_complete(&mut self, position: Option<Azimuth>) -> EventOutcome {
        match self.motion {
            MotionPhase::Moving => {
                self.azimuth = position.unwrap_or(self.target_azimuth);
                self.motion = MotionPhase::Idle;
                if self.park == ParkPhase::Parking {
                    self.set_park(ParkPhase::Parked);
                }
                EventOutcome::Applied
            }
            MotionPhase::Homing | MotionPhase::Aborting => {
                if let Some(position) = position {
                    self.azimuth = position;
                }
                self.target_azimuth = self.azimuth;
                if self.motion == MotionPhase::Aborting
                    && self.calibration == CalibrationPhase::Calibrating
                {
                    self.calibration = CalibrationPhase::Uncalibrated;
                }
                self.motion = MotionPhase::Idle;
                EventOutcome::Applied
            }
            MotionPhase::Calibrating => {
                if let Some(position) = position {
                    self.azimuth = position;
                }
                EventOutcome::Ignored("calibration completes on its own event")
            }
            MotionPhase::Idle | MotionPhase::Syncing => {
                EventOutcome::Ignored("rotator is not moving")
            }
        }
    }

    fn shutter_complete(&mut self, status: ShutterStatus) -> EventOutcome {
        self.shutter_status = status;
        let expected = match status {
            ShutterStatus::Open => ShutterPhase::Opening,
            _ => ShutterPhase::Closing,
        };
        if self.shutter == expected || self.shutter == ShutterPhase::Aborting {
            self.shutter = ShutterPhase::Idle;
        } else if self.shutter.is_busy() {
            return EventOutcome::Ignored("shutter is travelling the other way");
        }
        if status == ShutterStatus::Open && self.park == ParkPhase::Unparking {
            self.set_park(ParkPhase::Unparked);
        }
        EventOutcome::Applied
    }

    fn abort_complete(&mut self, target: Option<Target>) -> EventOutcome {
        let rotator = matches!(target, None | Some(Target::Controller) | Some(Target::Rotator));
        let shutter = matches!(target, None | Some(Target::Controller) | Some(Target::Shutter));
        let mut applied = false;
        if rotator && self.motion == MotionPhase::Aborting {
            self.motion = MotionPhase::Idle;
            self.target_azimuth = self.azimuth;
            if self.calibration == CalibrationPhase::Calibrating {
                self.calibration = CalibrationPhase::Uncalibrated;
            }
            applied = true;
        }
        if shutter && self.shutter == ShutterPhase::Aborting {
            self.shutter = ShutterPhase::Idle;
            applied = true;
        }
        if applied {
            EventOutcome::Applied
        } else {
            EventOutcome::Ignored("nothing was aborting")
        }
    }
}
