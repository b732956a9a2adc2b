//! Domain layer - dome controller rules with no I/O of their own
//!
//! This crate contains:
//! - Wire vocabulary (Target, Command, ParameterRequest) and the frame codec
//! - Device profile constants for one firmware family
//! - Dome state: azimuth, motion/shutter/park/calibration phases, settings
//! - Outbound domain events
//! - Transport, state store and publisher interfaces (traits)
//!
//! Principles:
//! - No dependencies on infrastructure
//! - State changes only through defined transitions
//! - Testable in isolation

pub mod diagnostics;
pub mod dome;
pub mod driver;
pub mod error;
pub mod event;
pub mod protocol;
pub mod store;

// Re-export commonly used types
pub use dome::{Azimuth, DeviceState, DomePolicy, DomeSettings, EventOutcome, FirmwareEvent};
pub use driver::{ConnectionState, Transport, TransportFactory};
pub use error::DomainError;
pub use event::{DomainEvent, EventPublisher};
pub use protocol::{Command, DeviceProfile, FrameCodec, ParameterRequest, Target};
pub use store::StateStore;
