use domain::dome::{DeviceState, EventOutcome, FirmwareEvent};
use domain::protocol::DeviceProfile;
use tracing::{debug, info, warn};

/// Routes drained event bodies to the matching state transition
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    azimuth_scale: u32,
}

impl EventDispatcher {
    pub fn new(profile: &DeviceProfile) -> Self {
        Self {
            azimuth_scale: profile.azimuth_scale,
        }
    }

    /// Decode one event body and apply it. Never fails: unknown or
    /// malformed events are logged and skipped.
    pub fn process_event(&self, body: &str, state: &mut DeviceState) -> EventOutcome {
        let event = match FirmwareEvent::parse(body, self.azimuth_scale) {
            Ok(event) => event,
            Err(e) => {
                warn!(event = %body, error = %e, "Malformed event ignored");
                return EventOutcome::Ignored("malformed event data");
            }
        };

        let outcome = state.apply_event(&event);
        match &outcome {
            EventOutcome::Applied => debug!(event = event.name(), "Event applied"),
            EventOutcome::Ignored(reason) => {
                info!(event = event.name(), reason = %reason, "Event ignored")
            }
            EventOutcome::Unknown(raw) => warn!(event = %raw, "Unknown event"),
            EventOutcome::FirmwareError(code) => {
                warn!(code = %code, "Firmware reported an error")
            }
        }
        outcome
    }
}
