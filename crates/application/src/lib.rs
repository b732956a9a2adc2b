//! Application layer - dome use cases on top of the domain rules
//!
//! - `protocol`: half-duplex request/reply exchange and typed parameter access
//! - `dispatch`: routing of unsolicited firmware events into the device state
//! - `dome`: the controller state machine and the actor hosting it
//! - `messaging`: line-oriented command surface

pub mod dispatch;
pub mod dome;
pub mod messaging;
pub mod protocol;

pub use dispatch::EventDispatcher;
pub use dome::{
    CommandReply, DomeActor, DomeCommand, DomeController, DomeHandle, OperationStatus,
    PollOutcome,
};
pub use messaging::CommandListener;
pub use protocol::{FramedLink, ParameterProtocol};
