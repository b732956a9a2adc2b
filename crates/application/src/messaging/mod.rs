pub mod command_listener;

pub use command_listener::{CommandListener, parse_command};
