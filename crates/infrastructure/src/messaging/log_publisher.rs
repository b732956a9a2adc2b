use async_trait::async_trait;
use domain::DomainEvent;
use domain::event::{EventPublisher, PublishError};

/// Renders dome notifications through `tracing`
#[derive(Debug, Default, Clone)]
pub struct LogEventPublisher {
    device_name: String,
}

impl LogEventPublisher {
    pub fn new(device_name: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        let device = self.device_name.as_str();
        match &event {
            DomainEvent::AzimuthChanged {
                azimuth, target, ..
            } => {
                tracing::debug!(device, azimuth = azimuth.degrees(), goal = target.degrees(), "Azimuth")
            }
            DomainEvent::MotionPhaseChanged { from, to, .. } => {
                tracing::info!(device, from = from.as_str(), to = to.as_str(), "Rotator")
            }
            DomainEvent::ShutterPhaseChanged { from, to, .. } => {
                tracing::info!(device, from = from.as_str(), to = to.as_str(), "Shutter")
            }
            DomainEvent::ShutterStatusChanged { status, .. } => {
                tracing::info!(device, status = status.as_str(), "Shutter status")
            }
            DomainEvent::ParkPhaseChanged { from, to, .. } => {
                tracing::info!(device, from = from.as_str(), to = to.as_str(), "Park")
            }
            DomainEvent::CalibrationPhaseChanged { phase, .. } => {
                tracing::info!(device, phase = phase.as_str(), "Calibration")
            }
            DomainEvent::HomePositionChanged { position, .. } => {
                tracing::info!(device, home = position.degrees(), "Home position")
            }
            DomainEvent::BatteryUpdated {
                reading, status, ..
            } => {
                tracing::info!(device, volts = reading.volts, amps = reading.amps, status = ?status, "Battery")
            }
            DomainEvent::FirmwareVersionChanged { version, .. } => {
                tracing::info!(device, version = %version, "Firmware")
            }
            DomainEvent::ConnectionChanged { state, reason, .. } => match reason {
                Some(reason) => {
                    tracing::warn!(device, state = state.as_str(), reason = %reason, "Connection")
                }
                None => tracing::info!(device, state = state.as_str(), "Connection"),
            },
            DomainEvent::OperationFailed {
                operation, error, ..
            } => {
                tracing::warn!(device, operation = %operation, error = %error, "Operation failed")
            }
        }
        Ok(())
    }
}
