use serde::{Deserialize, Serialize};

/// Rotation axis phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotionPhase {
    #[default]
    Idle,
    Moving,
    /// Position register rewrite; completes within the command round trip
    Syncing,
    Homing,
    Calibrating,
    Aborting,
}

impl MotionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Moving => "moving",
            Self::Syncing => "syncing",
            Self::Homing => "homing",
            Self::Calibrating => "calibrating",
            Self::Aborting => "aborting",
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    /// A running move may be re-targeted
    pub fn to_moving(&self) -> Result<Self, &'static str> {
        match self {
            Self::Idle | Self::Moving => Ok(Self::Moving),
            _ => Err("Rotator is busy"),
        }
    }

    pub fn to_syncing(&self) -> Result<Self, &'static str> {
        match self {
            Self::Idle => Ok(Self::Syncing),
            _ => Err("Cannot sync while the rotator is in motion"),
        }
    }

    pub fn to_homing(&self) -> Result<Self, &'static str> {
        match self {
            Self::Idle => Ok(Self::Homing),
            _ => Err("Rotator is busy"),
        }
    }

    pub fn to_calibrating(&self) -> Result<Self, &'static str> {
        match self {
            Self::Idle => Ok(Self::Calibrating),
            _ => Err("Rotator is busy"),
        }
    }

    /// Idle stays idle; anything in progress waits for the firmware to confirm
    pub fn to_aborting(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            _ => Self::Aborting,
        }
    }
}

/// Shutter actuation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShutterPhase {
    #[default]
    Idle,
    Opening,
    Closing,
    Aborting,
}

impl ShutterPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Aborting => "aborting",
        }
    }

    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle)
    }

    pub fn to_operating(&self, operation: ShutterOperation) -> Result<Self, &'static str> {
        match self {
            Self::Idle => Ok(match operation {
                ShutterOperation::Open => Self::Opening,
                ShutterOperation::Close => Self::Closing,
            }),
            _ => Err("Shutter is busy"),
        }
    }

    pub fn to_aborting(&self) -> Self {
        match self {
            Self::Idle => Self::Idle,
            _ => Self::Aborting,
        }
    }
}

/// Last end position reported by the shutter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShutterStatus {
    #[default]
    Unknown,
    Open,
    Closed,
}

impl ShutterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShutterOperation {
    Open,
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ParkPhase {
    #[default]
    Unparked,
    Parking,
    Parked,
    Unparking,
}

impl ParkPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unparked => "unparked",
            Self::Parking => "parking",
            Self::Parked => "parked",
            Self::Unparking => "unparking",
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Parking | Self::Unparking)
    }

    pub fn to_parking(&self) -> Result<Self, &'static str> {
        match self {
            Self::Unparked => Ok(Self::Parking),
            Self::Parking => Err("Park already in progress"),
            Self::Parked => Err("Dome is already parked"),
            Self::Unparking => Err("Unpark in progress"),
        }
    }

    pub fn to_unparking(&self) -> Result<Self, &'static str> {
        match self {
            Self::Parked => Ok(Self::Unparking),
            Self::Unparking => Err("Unpark already in progress"),
            Self::Unparked => Err("Dome is not parked"),
            Self::Parking => Err("Park in progress"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CalibrationPhase {
    #[default]
    Uncalibrated,
    Calibrating,
    Calibrated,
}

impl CalibrationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uncalibrated => "uncalibrated",
            Self::Calibrating => "calibrating",
            Self::Calibrated => "calibrated",
        }
    }
}
