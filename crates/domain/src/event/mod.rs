use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod publisher;
pub use publisher::{EventPublisher, PublishError};

use crate::dome::{
    Azimuth, BatteryReading, BatteryStatus, CalibrationPhase, MotionPhase, ParkPhase, ShutterPhase,
    ShutterStatus,
};
use crate::driver::ConnectionState;
use crate::protocol::FirmwareVersion;

/// Notifications the controller emits for the host to render or log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    AzimuthChanged {
        azimuth: Azimuth,
        target: Azimuth,
        timestamp: DateTime<Utc>,
    },

    MotionPhaseChanged {
        from: MotionPhase,
        to: MotionPhase,
        timestamp: DateTime<Utc>,
    },

    ShutterPhaseChanged {
        from: ShutterPhase,
        to: ShutterPhase,
        timestamp: DateTime<Utc>,
    },

    ShutterStatusChanged {
        status: ShutterStatus,
        timestamp: DateTime<Utc>,
    },

    ParkPhaseChanged {
        from: ParkPhase,
        to: ParkPhase,
        timestamp: DateTime<Utc>,
    },

    CalibrationPhaseChanged {
        phase: CalibrationPhase,
        timestamp: DateTime<Utc>,
    },

    HomePositionChanged {
        position: Azimuth,
        timestamp: DateTime<Utc>,
    },

    /// New battery telemetry from the shutter controller
    BatteryUpdated {
        reading: BatteryReading,
        status: BatteryStatus,
        timestamp: DateTime<Utc>,
    },

    FirmwareVersionChanged {
        version: String,
        timestamp: DateTime<Utc>,
    },

    ConnectionChanged {
        state: ConnectionState,
        reason: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A command failed or the firmware reported a fault
    OperationFailed {
        operation: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn azimuth_changed(azimuth: Azimuth, target: Azimuth) -> Self {
        Self::AzimuthChanged {
            azimuth,
            target,
            timestamp: Utc::now(),
        }
    }

    pub fn motion_phase_changed(from: MotionPhase, to: MotionPhase) -> Self {
        Self::MotionPhaseChanged {
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    pub fn shutter_phase_changed(from: ShutterPhase, to: ShutterPhase) -> Self {
        Self::ShutterPhaseChanged {
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    pub fn shutter_status_changed(status: ShutterStatus) -> Self {
        Self::ShutterStatusChanged {
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn park_phase_changed(from: ParkPhase, to: ParkPhase) -> Self {
        Self::ParkPhaseChanged {
            from,
            to,
            timestamp: Utc::now(),
        }
    }

    pub fn calibration_phase_changed(phase: CalibrationPhase) -> Self {
        Self::CalibrationPhaseChanged {
            phase,
            timestamp: Utc::now(),
        }
    }

    pub fn home_position_changed(position: Azimuth) -> Self {
        Self::HomePositionChanged {
            position,
            timestamp: Utc::now(),
        }
    }

    pub fn battery_updated(reading: BatteryReading, status: BatteryStatus) -> Self {
        Self::BatteryUpdated {
            reading,
            status,
            timestamp: Utc::now(),
        }
    }

    pub fn firmware_version_changed(version: FirmwareVersion) -> Self {
        Self::FirmwareVersionChanged {
            version: version.to_string(),
            timestamp: Utc::now(),
        }
    }

    pub fn connection_changed(state: ConnectionState, reason: Option<String>) -> Self {
        Self::ConnectionChanged {
            state,
            reason,
            timestamp: Utc::now(),
        }
    }

    pub fn operation_failed(operation: impl Into<String>, error: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get the timestamp of this event
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::AzimuthChanged { timestamp, .. }
            | Self::MotionPhaseChanged { timestamp, .. }
            | Self::ShutterPhaseChanged { timestamp, .. }
            | Self::ShutterStatusChanged { timestamp, .. }
            | Self::ParkPhaseChanged { timestamp, .. }
            | Self::CalibrationPhaseChanged { timestamp, .. }
            | Self::HomePositionChanged { timestamp, .. }
            | Self::BatteryUpdated { timestamp, .. }
            | Self::FirmwareVersionChanged { timestamp, .. }
            | Self::ConnectionChanged { timestamp, .. }
            | Self::OperationFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &str {
        match self {
            Self::AzimuthChanged { .. } => "AzimuthChanged",
            Self::MotionPhaseChanged { .. } => "MotionPhaseChanged",
            Self::ShutterPhaseChanged { .. } => "ShutterPhaseChanged",
            Self::ShutterStatusChanged { .. } => "ShutterStatusChanged",
            Self::ParkPhaseChanged { .. } => "ParkPhaseChanged",
            Self::CalibrationPhaseChanged { .. } => "CalibrationPhaseChanged",
            Self::HomePositionChanged { .. } => "HomePositionChanged",
            Self::BatteryUpdated { .. } => "BatteryUpdated",
            Self::FirmwareVersionChanged { .. } => "FirmwareVersionChanged",
            Self::ConnectionChanged { .. } => "ConnectionChanged",
            Self::OperationFailed { .. } => "OperationFailed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motion_phase_changed_event() {
        let event = DomainEvent::motion_phase_changed(MotionPhase::Idle, MotionPhase::Moving);

        assert_eq!(event.event_type(), "MotionPhaseChanged");
        match event {
            DomainEvent::MotionPhaseChanged { from, to, .. } => {
                assert_eq!(from, MotionPhase::Idle);
                assert_eq!(to, MotionPhase::Moving);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_firmware_version_is_rendered() {
        let event = DomainEvent::firmware_version_changed(FirmwareVersion { major: 3, minor: 2 });
        match event {
            DomainEvent::FirmwareVersionChanged { version, .. } => assert_eq!(version, "03.02"),
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_serialization() {
        let azimuth = Azimuth::new(42.5).unwrap();
        let event = DomainEvent::azimuth_changed(azimuth, azimuth);

        let json_str = serde_json::to_string(&event).unwrap();
        assert!(json_str.contains("\"type\":\"AzimuthChanged\""));
        assert!(json_str.contains("\"azimuth\":42.5"));

        let deserialized: DomainEvent = serde_json::from_str(&json_str).unwrap();
        assert_eq!(deserialized, event);
    }
}
