use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[Vv]?(\d{1,3})\.(\d{1,3})$").expect("valid version regex"));

/// Controller firmware version, reported as `V<major>.<minor>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u16,
    pub minor: u16,
}

impl FirmwareVersion {
    pub fn parse(payload: &str) -> Result<Self, DomainError> {
        let trimmed = payload.trim();
        let captures = VERSION_PATTERN.captures(trimmed).ok_or_else(|| {
            DomainError::MalformedFrame(format!("'{trimmed}' is not a firmware version"))
        })?;
        let component = |i: usize| {
            captures[i]
                .parse::<u16>()
                .map_err(|e| DomainError::MalformedFrame(format!("version component: {e}")))
        };
        Ok(Self {
            major: component(1)?,
            minor: component(2)?,
        })
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}.{:02}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed_version() {
        let version = FirmwareVersion::parse("V03.02").unwrap();
        assert_eq!(version, FirmwareVersion { major: 3, minor: 2 });
        assert_eq!(version.to_string(), "03.02");
    }

    #[test]
    fn test_parse_bare_version() {
        assert_eq!(
            FirmwareVersion::parse("3.10").unwrap(),
            FirmwareVersion { major: 3, minor: 10 }
        );
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(FirmwareVersion::parse("V3").is_err());
        assert!(FirmwareVersion::parse("abc").is_err());
        assert!(FirmwareVersion::parse("").is_err());
    }

    #[test]
    fn test_versions_order() {
        assert!(FirmwareVersion::parse("V3.2").unwrap() > FirmwareVersion::parse("V2.9").unwrap());
    }
}
