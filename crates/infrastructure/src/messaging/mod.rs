pub mod channel_publisher;
pub mod composite_publisher;
pub mod log_publisher;

pub use channel_publisher::ChannelEventPublisher;
pub use composite_publisher::CompositeEventPublisher;
pub use log_publisher::LogEventPublisher;
