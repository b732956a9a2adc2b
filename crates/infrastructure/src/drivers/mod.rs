mod serial;
mod simulator;
mod stream;
mod tcp;

pub use serial::SerialConfig;
pub use simulator::{SimulatedDome, SimulatorConfig};
pub use stream::{SerialPortIO, StreamTransport};
pub use tcp::TcpConfig;

use domain::DomainError;
use domain::driver::{DriverType, Transport, TransportFactory};
use domain::protocol::DeviceProfile;
use serde::{Deserialize, Serialize};

/// Which link carries the dome protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TransportConfig {
    Serial(SerialConfig),
    Tcp(TcpConfig),
    Simulator(SimulatorConfig),
}

impl TransportConfig {
    pub fn driver_type(&self) -> DriverType {
        match self {
            Self::Serial(_) => DriverType::Serial,
            Self::Tcp(_) => DriverType::Tcp,
            Self::Simulator(_) => DriverType::Simulator,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Simulator(SimulatorConfig::default())
    }
}

/// Factory for opening transports from configuration
pub struct DriverFactory {
    config: TransportConfig,
    profile: DeviceProfile,
}

impl DriverFactory {
    pub fn new(config: TransportConfig, profile: DeviceProfile) -> Self {
        Self { config, profile }
    }
}

impl TransportFactory for DriverFactory {
    fn open(&self) -> Result<Box<dyn Transport>, DomainError> {
        let max_frame_len = self.profile.max_frame_len;
        tracing::debug!(driver = self.config.driver_type().as_str(), "Opening transport");
        match &self.config {
            TransportConfig::Serial(serial) => {
                serial.validate()?;
                Ok(Box::new(serial.open(max_frame_len)?) as Box<dyn Transport>)
            }
            TransportConfig::Tcp(tcp) => Ok(Box::new(tcp.open(max_frame_len)?) as Box<dyn Transport>),
            TransportConfig::Simulator(sim) => Ok(Box::new(SimulatedDome::new(
                sim.clone(),
                self.profile.clone(),
            )) as Box<dyn Transport>),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn from_json(value: serde_json::Value) -> Result<TransportConfig, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_open_simulator_transport() {
        let config = from_json(json!({"type": "Simulator", "degrees_per_sec": 20.0})).unwrap();
        let transport = DriverFactory::new(config, DeviceProfile::default()).open();
        assert_eq!(transport.unwrap().describe(), "simulator");
    }

    #[test]
    fn test_serial_config_with_minimal_fields() {
        let config = from_json(json!({"type": "Serial", "port": "COM1"})).unwrap();
        assert_eq!(config.driver_type(), DriverType::Serial);
    }

    #[test]
    fn test_invalid_serial_config_is_rejected_before_open() {
        let config = from_json(json!({"type": "Serial", "port": "COM1", "parity": "Mark"})).unwrap();
        let result = DriverFactory::new(config, DeviceProfile::default()).open();
        assert!(matches!(result, Err(DomainError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_unknown_transport_type() {
        assert!(from_json(json!({"type": "Bluetooth"})).is_err());
    }

    #[test]
    fn test_default_is_simulator() {
        assert_eq!(
            TransportConfig::default().driver_type(),
            DriverType::Simulator
        );
    }
}
