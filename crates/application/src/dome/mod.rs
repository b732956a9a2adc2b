//! Dome use cases: the state machine driving the firmware and the actor
//! that hosts it

mod controller;
mod dome_actor;

pub use controller::{DomeController, OperationStatus, PollOutcome};
pub use dome_actor::{CommandReply, DomeActor, DomeCommand, DomeHandle, DomeRequest};
