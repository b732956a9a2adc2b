use serde::{Deserialize, Serialize};

use super::azimuth::Azimuth;
use crate::error::{DomainError, Result};
use crate::protocol::Target;

/// Unsolicited notification pushed by the firmware, decoded from an event
/// frame body `<TAG><data>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FirmwareEvent {
    /// `MC[<az>]`: the rotator stopped
    MotionComplete { position: Option<Azimuth> },
    /// `PS<az>`: progress report while rotating
    PositionUpdate { position: Azimuth },
    /// `SO`
    ShutterOpened,
    /// `SC`
    ShutterClosed,
    /// `HF<az>`: home sensor found at the given heading
    HomeFound { position: Azimuth },
    /// `CC`
    CalibrationComplete,
    /// `BV<centivolts>,<centiamps>`
    BatteryUpdate(BatteryReading),
    /// `AB[<target>]`: abort finished on one target, or all when absent
    AbortComplete { target: Option<Target> },
    /// `ER<code>`
    Error { code: String },
    Unknown(String),
}

impl FirmwareEvent {
    /// Decode an event body; `scale` converts wire units to degrees
    pub fn parse(body: &str, scale: u32) -> Result<Self> {
        let (tag, data) = match body.get(..2) {
            Some(tag) => (tag, &body[2..]),
            None => (body, ""),
        };
        let event = match tag {
            "MC" => Self::MotionComplete {
                position: if data.is_empty() {
                    None
                } else {
                    Some(parse_azimuth(body, data, scale)?)
                },
            },
            "PS" => Self::PositionUpdate {
                position: parse_azimuth(body, data, scale)?,
            },
            "SO" => Self::ShutterOpened,
            "SC" => Self::ShutterClosed,
            "HF" => Self::HomeFound {
                position: parse_azimuth(body, data, scale)?,
            },
            "CC" => Self::CalibrationComplete,
            "BV" => Self::BatteryUpdate(BatteryReading::parse(data)?),
            "AB" => Self::AbortComplete {
                target: match data.chars().next() {
                    None => None,
                    Some(token) => Some(Target::from_token(token).ok_or_else(|| {
                        DomainError::MalformedFrame(format!("unknown abort target in '{body}'"))
                    })?),
                },
            },
            "ER" => Self::Error {
                code: data.to_string(),
            },
            _ => Self::Unknown(body.to_string()),
        };
        Ok(event)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::MotionComplete { .. } => "motion_complete",
            Self::PositionUpdate { .. } => "position_update",
            Self::ShutterOpened => "shutter_opened",
            Self::ShutterClosed => "shutter_closed",
            Self::HomeFound { .. } => "home_found",
            Self::CalibrationComplete => "calibration_complete",
            Self::BatteryUpdate(_) => "battery_update",
            Self::AbortComplete { .. } => "abort_complete",
            Self::Error { .. } => "error",
            Self::Unknown(_) => "unknown",
        }
    }
}

fn parse_azimuth(body: &str, data: &str, scale: u32) -> Result<Azimuth> {
    data.parse::<i32>()
        .map(|units| Azimuth::from_wire(units, scale))
        .map_err(|_| DomainError::MalformedFrame(format!("bad position in event '{body}'")))
}

/// Shutter battery telemetry
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryReading {
    pub volts: f64,
    pub amps: f64,
}

impl BatteryReading {
    /// Parse `<centivolts>,<centiamps>`
    pub fn parse(payload: &str) -> Result<Self> {
        let mut parts = payload.split(',').map(str::trim);
        let mut next = |name: &str| -> Result<f64> {
            parts
                .next()
                .and_then(|p| p.parse::<i32>().ok())
                .map(|v| f64::from(v) / 100.0)
                .ok_or_else(|| {
                    DomainError::MalformedFrame(format!("missing {name} in battery '{payload}'"))
                })
        };
        let volts = next("voltage")?;
        let amps = next("current")?;
        Ok(Self { volts, amps })
    }

    pub fn status(&self, thresholds: &BatteryThresholds) -> BatteryStatus {
        if self.volts <= thresholds.critical_volts {
            BatteryStatus::Critical
        } else if self.volts <= thresholds.low_volts {
            BatteryStatus::Low
        } else {
            BatteryStatus::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryThresholds {
    pub low_volts: f64,
    pub critical_volts: f64,
}

impl Default for BatteryThresholds {
    fn default() -> Self {
        Self {
            low_volts: 12.0,
            critical_volts: 11.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatteryStatus {
    Ok,
    Low,
    Critical,
}
