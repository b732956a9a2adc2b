use serde::{Deserialize, Serialize};

/// Sub-device a command applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// The controller board itself (firmware queries, global abort)
    Controller,
    /// The rotating structure
    Rotator,
    /// The independently actuated shutter
    Shutter,
}

impl Target {
    pub fn token(&self) -> char {
        match self {
            Self::Controller => 'C',
            Self::Rotator => 'R',
            Self::Shutter => 'S',
        }
    }

    pub fn from_token(token: char) -> Option<Self> {
        match token {
            'C' => Some(Self::Controller),
            'R' => Some(Self::Rotator),
            'S' => Some(Self::Shutter),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controller => "controller",
            Self::Rotator => "rotator",
            Self::Shutter => "shutter",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation code understood by the firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Get: current azimuth. Set: rewrite the position register (sync).
    Position,
    GotoAzimuth,
    GotoHome,
    HomePosition,
    Calibrate,
    AccelerationRamp,
    DeadZone,
    TravelRange,
    Velocity,
    Open,
    Close,
    Abort,
    /// Set: park motion to the encoded azimuth. Get: park status.
    Park,
    BatteryLevel,
    FirmwareVersion,
}

impl Command {
    pub const ALL: [Command; 15] = [
        Self::Position,
        Self::GotoAzimuth,
        Self::GotoHome,
        Self::HomePosition,
        Self::Calibrate,
        Self::AccelerationRamp,
        Self::DeadZone,
        Self::TravelRange,
        Self::Velocity,
        Self::Open,
        Self::Close,
        Self::Abort,
        Self::Park,
        Self::BatteryLevel,
        Self::FirmwareVersion,
    ];

    /// Two-letter wire token
    pub fn token(&self) -> &'static str {
        match self {
            Self::Position => "PO",
            Self::GotoAzimuth => "GA",
            Self::GotoHome => "GH",
            Self::HomePosition => "HP",
            Self::Calibrate => "CA",
            Self::AccelerationRamp => "AR",
            Self::DeadZone => "DZ",
            Self::TravelRange => "RR",
            Self::Velocity => "VL",
            Self::Open => "OP",
            Self::Close => "CL",
            Self::Abort => "AB",
            Self::Park => "PK",
            Self::BatteryLevel => "BV",
            Self::FirmwareVersion => "FV",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.token() == token)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_command_tokens_are_unique_and_two_letters() {
        let tokens: HashSet<_> = Command::ALL.iter().map(|c| c.token()).collect();
        assert_eq!(tokens.len(), Command::ALL.len());
        assert!(tokens.iter().all(|t| t.len() == 2));
    }

    #[test]
    fn test_command_token_lookup() {
        for command in Command::ALL {
            assert_eq!(Command::from_token(command.token()), Some(command));
        }
        assert_eq!(Command::from_token("ZZ"), None);
    }

    #[test]
    fn test_target_tokens() {
        assert_eq!(Target::Rotator.token(), 'R');
        assert_eq!(Target::from_token('S'), Some(Target::Shutter));
        assert_eq!(Target::from_token('X'), None);
    }
}
