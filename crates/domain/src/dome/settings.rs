use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::azimuth::Azimuth;
use super::firmware_event::BatteryThresholds;
use crate::error::{DomainError, Result};
use crate::protocol::{Command, Target};

/// Per-axis motor parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AxisSetting {
    AccelerationRamp,
    DeadZone,
    TravelRange,
    Velocity,
}

impl AxisSetting {
    pub const ALL: [AxisSetting; 4] = [
        Self::AccelerationRamp,
        Self::DeadZone,
        Self::TravelRange,
        Self::Velocity,
    ];

    pub fn command(&self) -> Command {
        match self {
            Self::AccelerationRamp => Command::AccelerationRamp,
            Self::DeadZone => Command::DeadZone,
            Self::TravelRange => Command::TravelRange,
            Self::Velocity => Command::Velocity,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::AccelerationRamp => "acceleration_ramp",
            Self::DeadZone => "dead_zone",
            Self::TravelRange => "travel_range",
            Self::Velocity => "velocity",
        }
    }

    /// Range check applied before anything is sent
    pub fn validate(&self, value: i32) -> Result<()> {
        let valid = match self {
            Self::DeadZone => value >= 0,
            Self::AccelerationRamp | Self::TravelRange | Self::Velocity => value > 0,
        };
        if valid {
            Ok(())
        } else {
            Err(DomainError::InvalidArgument(format!(
                "{} must be {}, got {}",
                self.key(),
                if matches!(self, Self::DeadZone) {
                    "non-negative"
                } else {
                    "positive"
                },
                value
            )))
        }
    }
}

/// Last known motor parameters of one axis; `None` until read or written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSettings {
    pub acceleration_ramp: Option<i32>,
    pub dead_zone: Option<i32>,
    pub travel_range: Option<i32>,
    pub velocity: Option<i32>,
}

impl AxisSettings {
    pub fn get(&self, setting: AxisSetting) -> Option<i32> {
        match setting {
            AxisSetting::AccelerationRamp => self.acceleration_ramp,
            AxisSetting::DeadZone => self.dead_zone,
            AxisSetting::TravelRange => self.travel_range,
            AxisSetting::Velocity => self.velocity,
        }
    }

    pub fn set(&mut self, setting: AxisSetting, value: i32) {
        let slot = match setting {
            AxisSetting::AccelerationRamp => &mut self.acceleration_ramp,
            AxisSetting::DeadZone => &mut self.dead_zone,
            AxisSetting::TravelRange => &mut self.travel_range,
            AxisSetting::Velocity => &mut self.velocity,
        };
        *slot = Some(value);
    }
}

/// Operating policy supplied by configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomePolicy {
    #[serde(default)]
    pub close_shutter_on_park: bool,
    #[serde(default)]
    pub default_park_azimuth: Azimuth,
    #[serde(default = "default_max_operation_retries")]
    pub max_operation_retries: u32,
    #[serde(default)]
    pub battery: BatteryThresholds,
}

fn default_max_operation_retries() -> u32 {
    3
}

impl Default for DomePolicy {
    fn default() -> Self {
        Self {
            close_shutter_on_park: false,
            default_park_azimuth: Azimuth::default(),
            max_operation_retries: default_max_operation_retries(),
            battery: BatteryThresholds::default(),
        }
    }
}

/// Everything that survives a restart, exchanged with the host as textual
/// key/value pairs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomeSettings {
    pub rotator: AxisSettings,
    pub shutter: AxisSettings,
    pub home_position: Option<Azimuth>,
    pub park_azimuth: Azimuth,
    pub parked: bool,
    pub close_shutter_on_park: bool,
    pub battery: BatteryThresholds,
}

const HOME_POSITION: &str = "home_position";
const PARK_AZIMUTH: &str = "park_azimuth";
const PARKED: &str = "parked";
const CLOSE_SHUTTER_ON_PARK: &str = "close_shutter_on_park";
const BATTERY_LOW: &str = "battery.low_volts";
const BATTERY_CRITICAL: &str = "battery.critical_volts";

impl DomeSettings {
    pub fn from_policy(policy: &DomePolicy) -> Self {
        Self {
            park_azimuth: policy.default_park_azimuth,
            close_shutter_on_park: policy.close_shutter_on_park,
            battery: policy.battery,
            ..Self::default()
        }
    }

    pub fn axis(&self, target: Target) -> Result<&AxisSettings> {
        match target {
            Target::Rotator => Ok(&self.rotator),
            Target::Shutter => Ok(&self.shutter),
            Target::Controller => Err(DomainError::InvalidArgument(
                "The controller has no motor settings".to_string(),
            )),
        }
    }

    pub fn axis_mut(&mut self, target: Target) -> Result<&mut AxisSettings> {
        match target {
            Target::Rotator => Ok(&mut self.rotator),
            Target::Shutter => Ok(&mut self.shutter),
            Target::Controller => Err(DomainError::InvalidArgument(
                "The controller has no motor settings".to_string(),
            )),
        }
    }

    pub fn to_key_values(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(home) = self.home_position {
            map.insert(HOME_POSITION.to_string(), home.degrees().to_string());
        }
        map.insert(
            PARK_AZIMUTH.to_string(),
            self.park_azimuth.degrees().to_string(),
        );
        map.insert(PARKED.to_string(), self.parked.to_string());
        map.insert(
            CLOSE_SHUTTER_ON_PARK.to_string(),
            self.close_shutter_on_park.to_string(),
        );
        map.insert(BATTERY_LOW.to_string(), self.battery.low_volts.to_string());
        map.insert(
            BATTERY_CRITICAL.to_string(),
            self.battery.critical_volts.to_string(),
        );
        for (prefix, axis) in [("rotator", &self.rotator), ("shutter", &self.shutter)] {
            for setting in AxisSetting::ALL {
                if let Some(value) = axis.get(setting) {
                    map.insert(format!("{prefix}.{}", setting.key()), value.to_string());
                }
            }
        }
        map
    }

    /// Overlay persisted pairs on these settings. All-or-nothing: a single
    /// bad value rejects the whole map. Unknown keys are ignored.
    pub fn with_key_values(&self, pairs: &BTreeMap<String, String>) -> Result<Self> {
        let mut next = self.clone();
        for (key, raw) in pairs {
            let value = raw.trim();
            match key.as_str() {
                HOME_POSITION => next.home_position = Some(parse_azimuth(key, value)?),
                PARK_AZIMUTH => next.park_azimuth = parse_azimuth(key, value)?,
                PARKED => next.parked = parse_bool(key, value)?,
                CLOSE_SHUTTER_ON_PARK => next.close_shutter_on_park = parse_bool(key, value)?,
                BATTERY_LOW => next.battery.low_volts = parse_f64(key, value)?,
                BATTERY_CRITICAL => next.battery.critical_volts = parse_f64(key, value)?,
                _ => {
                    if let Some((axis, setting)) = parse_axis_key(key) {
                        let parsed = value.parse::<i32>().map_err(|_| invalid(key, value))?;
                        setting.validate(parsed)?;
                        next.axis_mut(axis)?.set(setting, parsed);
                    }
                }
            }
        }
        if next.battery.critical_volts > next.battery.low_volts {
            return Err(DomainError::InvalidConfiguration(
                "battery.critical_volts must not exceed battery.low_volts".to_string(),
            ));
        }
        Ok(next)
    }
}

fn parse_axis_key(key: &str) -> Option<(Target, AxisSetting)> {
    let (prefix, name) = key.split_once('.')?;
    let target = match prefix {
        "rotator" => Target::Rotator,
        "shutter" => Target::Shutter,
        _ => return None,
    };
    let setting = AxisSetting::ALL.into_iter().find(|s| s.key() == name)?;
    Some((target, setting))
}

fn invalid(key: &str, value: &str) -> DomainError {
    DomainError::InvalidConfiguration(format!("Invalid value '{value}' for {key}"))
}

fn parse_azimuth(key: &str, value: &str) -> Result<Azimuth> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|degrees| Azimuth::new(degrees).ok())
        .ok_or_else(|| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value.parse::<bool>().map_err(|_| invalid(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, value))
}
