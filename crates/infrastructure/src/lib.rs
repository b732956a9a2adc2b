//! Infrastructure layer - links to the dome firmware and the outside world

pub mod config;
pub mod drivers;
pub mod messaging;
pub mod store;

pub use config::AgentConfig;
pub use drivers::{DriverFactory, SimulatedDome, StreamTransport, TransportConfig};
pub use messaging::{ChannelEventPublisher, CompositeEventPublisher, LogEventPublisher};
pub use store::FileStateStore;
