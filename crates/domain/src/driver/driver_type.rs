use serde::{Deserialize, Serialize};

/// Kind of byte link used to reach the dome controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DriverType {
    /// RS-232 / USB CDC port
    Serial,
    /// Serial-over-network adapter
    Tcp,
    /// In-process firmware stand-in
    Simulator,
}

impl DriverType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Tcp => "tcp",
            Self::Simulator => "simulator",
        }
    }

    /// No physical dome is attached
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulator)
    }
}

impl std::fmt::Display for DriverType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_the_simulator_is_simulated() {
        assert!(DriverType::Simulator.is_simulated());
        assert!(!DriverType::Serial.is_simulated());
        assert_eq!(DriverType::Tcp.to_string(), "tcp");
    }
}
