use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Heading of the dome slit in degrees, always within [0, 360)
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Azimuth(f64);

impl Azimuth {
    /// Strict constructor for caller-supplied headings
    pub fn new(degrees: f64) -> Result<Self> {
        if !degrees.is_finite() || !(0.0..360.0).contains(&degrees) {
            return Err(DomainError::InvalidArgument(format!(
                "Azimuth {degrees} is outside [0, 360)"
            )));
        }
        Ok(Self(degrees))
    }

    /// Wrap any finite heading into range; non-finite input maps to north
    pub fn normalized(degrees: f64) -> Self {
        if !degrees.is_finite() {
            return Self(0.0);
        }
        let wrapped = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negative inputs
        if wrapped >= 360.0 {
            Self(0.0)
        } else {
            Self(wrapped)
        }
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }

    /// Integer wire units, `scale` units per degree, wrapped to one turn
    pub fn to_wire(&self, scale: u32) -> i32 {
        let turn = 360 * i64::from(scale);
        let units = (self.0 * f64::from(scale)).round() as i64;
        units.rem_euclid(turn) as i32
    }

    pub fn from_wire(units: i32, scale: u32) -> Self {
        Self::normalized(f64::from(units) / f64::from(scale.max(1)))
    }
}

impl TryFrom<f64> for Azimuth {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Azimuth> for f64 {
    fn from(value: Azimuth) -> Self {
        value.0
    }
}

impl std::fmt::Display for Azimuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}
