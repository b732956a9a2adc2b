use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Firmware-specific framing constants.
///
/// Payload characters never include any of the three prefixes, which is what
/// lets the codec resynchronise on the last prefix in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: char,
    #[serde(default = "default_reply_prefix")]
    pub reply_prefix: char,
    #[serde(default = "default_event_prefix")]
    pub event_prefix: char,
    #[serde(default = "default_terminator")]
    pub terminator: char,
    #[serde(default = "default_query_marker")]
    pub query_marker: char,
    /// Digits (including a leading minus sign) used for set values
    #[serde(default = "default_value_width")]
    pub value_width: usize,
    /// Wire units per degree of azimuth
    #[serde(default = "default_azimuth_scale")]
    pub azimuth_scale: u32,
    #[serde(default = "default_max_frame_len")]
    pub max_frame_len: usize,
    #[serde(default = "default_reply_timeout_ms")]
    pub reply_timeout_ms: u64,
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
    #[serde(default = "default_max_events_per_drain")]
    pub max_events_per_drain: usize,
}

fn default_command_prefix() -> char {
    '@'
}
fn default_reply_prefix() -> char {
    ':'
}
fn default_event_prefix() -> char {
    '!'
}
fn default_terminator() -> char {
    '#'
}
fn default_query_marker() -> char {
    '?'
}
fn default_value_width() -> usize {
    5
}
fn default_azimuth_scale() -> u32 {
    10
}
fn default_max_frame_len() -> usize {
    64
}
fn default_reply_timeout_ms() -> u64 {
    3000
}
fn default_drain_timeout_ms() -> u64 {
    50
}
fn default_max_events_per_drain() -> usize {
    32
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            reply_prefix: default_reply_prefix(),
            event_prefix: default_event_prefix(),
            terminator: default_terminator(),
            query_marker: default_query_marker(),
            value_width: default_value_width(),
            azimuth_scale: default_azimuth_scale(),
            max_frame_len: default_max_frame_len(),
            reply_timeout_ms: default_reply_timeout_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            max_events_per_drain: default_max_events_per_drain(),
        }
    }
}

impl DeviceProfile {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    pub fn terminator_byte(&self) -> u8 {
        self.terminator as u8
    }

    /// Largest magnitude that fits `value_width` digits
    pub fn max_value(&self) -> i64 {
        10_i64.pow(self.value_width as u32) - 1
    }

    /// Smallest value; the minus sign takes one of the digits
    pub fn min_value(&self) -> i64 {
        -(10_i64.pow(self.value_width.saturating_sub(1) as u32) - 1)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let framing = [
            self.command_prefix,
            self.reply_prefix,
            self.event_prefix,
            self.terminator,
            self.query_marker,
        ];
        if framing.iter().any(|c| !c.is_ascii() || c.is_ascii_alphanumeric()) {
            return Err(DomainError::InvalidConfiguration(
                "Framing characters must be ASCII punctuation".to_string(),
            ));
        }
        for (i, a) in framing.iter().enumerate() {
            if framing[i + 1..].contains(a) {
                return Err(DomainError::InvalidConfiguration(format!(
                    "Framing character '{a}' is used twice"
                )));
            }
        }
        if !(2..=9).contains(&self.value_width) {
            return Err(DomainError::InvalidConfiguration(format!(
                "value_width must be between 2 and 9, got {}",
                self.value_width
            )));
        }
        if self.azimuth_scale == 0 {
            return Err(DomainError::InvalidConfiguration(
                "azimuth_scale must be positive".to_string(),
            ));
        }
        if 360 * i64::from(self.azimuth_scale) > self.max_value() {
            return Err(DomainError::InvalidConfiguration(format!(
                "A full turn ({} units) does not fit in {} digits",
                360 * self.azimuth_scale,
                self.value_width
            )));
        }
        if self.max_frame_len < 8 {
            return Err(DomainError::InvalidConfiguration(
                "max_frame_len must be at least 8 bytes".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_is_valid() {
        let profile = DeviceProfile::default();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.reply_timeout(), Duration::from_secs(3));
        assert_eq!(profile.max_value(), 99_999);
        assert_eq!(profile.min_value(), -9_999);
    }

    #[test]
    fn test_profile_deserializes_with_defaults() {
        let profile: DeviceProfile =
            serde_json::from_value(serde_json::json!({ "value_width": 6 })).unwrap();
        assert_eq!(profile.value_width, 6);
        assert_eq!(profile.terminator, '#');
        assert_eq!(profile.azimuth_scale, 10);
    }

    #[test]
    fn test_duplicate_framing_character_rejected() {
        let profile = DeviceProfile {
            event_prefix: ':',
            ..DeviceProfile::default()
        };
        assert!(matches!(
            profile.validate(),
            Err(DomainError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_full_turn_must_fit_width() {
        let profile = DeviceProfile {
            value_width: 3,
            ..DeviceProfile::default()
        };
        assert!(profile.validate().is_err());
    }
}
