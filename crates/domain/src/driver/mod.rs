mod connection_state;
mod driver_type;
mod transport;

pub use connection_state::ConnectionState;
pub use driver_type::DriverType;
pub use transport::{Transport, TransportFactory};
