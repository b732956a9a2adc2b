//! Dome model: headings, phases, firmware events and the device state they drive

mod azimuth;
mod firmware_event;
mod phase;
mod settings;
mod state;

pub use azimuth::Azimuth;
pub use firmware_event::{BatteryReading, BatteryStatus, BatteryThresholds, FirmwareEvent};
pub use phase::{
    CalibrationPhase, MotionPhase, ParkPhase, ShutterOperation, ShutterPhase, ShutterStatus,
};
pub use settings::{AxisSetting, AxisSettings, DomePolicy, DomeSettings};
pub use state::{DeviceState, EventOutcome};
