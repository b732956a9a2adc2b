//! Wire protocol: targets, commands, requests, framing

mod codec;
mod command;
mod profile;
mod request;
mod version;

pub use codec::{Frame, FrameCodec};
pub use command::{Command, Target};
pub use profile::DeviceProfile;
pub use request::{ParameterRequest, RequestKind};
pub use version::FirmwareVersion;
