use std::time::Duration;

use domain::DomainError;
use serde::{Deserialize, Serialize};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use super::stream::StreamTransport;

/// Serial link settings for the dome controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default = "default_parity")]
    pub parity: String, // "None", "Even", "Odd"
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
}

fn default_baud_rate() -> u32 {
    9600
}
fn default_data_bits() -> u8 {
    8
}
fn default_parity() -> String {
    "None".to_string()
}
fn default_stop_bits() -> u8 {
    1
}

impl SerialConfig {
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
        }
    }

    fn to_parity(&self) -> Result<tokio_serial::Parity, DomainError> {
        match self.parity.as_str() {
            "None" => Ok(tokio_serial::Parity::None),
            "Even" => Ok(tokio_serial::Parity::Even),
            "Odd" => Ok(tokio_serial::Parity::Odd),
            _ => Err(DomainError::InvalidConfiguration(format!(
                "Invalid parity: {}",
                self.parity
            ))),
        }
    }

    fn to_stop_bits(&self) -> Result<tokio_serial::StopBits, DomainError> {
        match self.stop_bits {
            1 => Ok(tokio_serial::StopBits::One),
            2 => Ok(tokio_serial::StopBits::Two),
            _ => Err(DomainError::InvalidConfiguration(format!(
                "Invalid stop bits: {}",
                self.stop_bits
            ))),
        }
    }

    fn to_data_bits(&self) -> Result<tokio_serial::DataBits, DomainError> {
        match self.data_bits {
            5 => Ok(tokio_serial::DataBits::Five),
            6 => Ok(tokio_serial::DataBits::Six),
            7 => Ok(tokio_serial::DataBits::Seven),
            8 => Ok(tokio_serial::DataBits::Eight),
            _ => Err(DomainError::InvalidConfiguration(format!(
                "Invalid data bits: {}",
                self.data_bits
            ))),
        }
    }

    /// Check every field converts before touching the port
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.port.trim().is_empty() {
            return Err(DomainError::InvalidConfiguration(
                "Serial port name is empty".to_string(),
            ));
        }
        self.to_parity()?;
        self.to_stop_bits()?;
        self.to_data_bits()?;
        Ok(())
    }

    // Windows needs the device namespace prefix for COM10 and above
    fn port_name(&self) -> String {
        if cfg!(target_os = "windows") && !self.port.to_uppercase().starts_with(r"\\.\") {
            format!(r"\\.\{}", self.port)
        } else {
            self.port.clone()
        }
    }

    /// Open the port and wrap it in a frame transport
    pub fn open(&self, max_frame_len: usize) -> Result<StreamTransport<SerialStream>, DomainError> {
        let port_name = self.port_name();

        tracing::debug!(
            port = %port_name,
            baud_rate = self.baud_rate,
            "Opening serial port"
        );

        let port = tokio_serial::new(&port_name, self.baud_rate)
            .data_bits(self.to_data_bits()?)
            .parity(self.to_parity()?)
            .stop_bits(self.to_stop_bits()?)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| {
                tracing::warn!(port = %port_name, error = %e, "Failed to open serial port");
                DomainError::Io(format!(
                    "Failed to open serial port {}: {}. Check that no other application holds it and that you have permission.",
                    port_name, e
                ))
            })?;

        tracing::info!(port = %self.port, "Serial port opened");
        Ok(StreamTransport::new(port, max_frame_len, format!("serial:{}", self.port)))
    }
}
