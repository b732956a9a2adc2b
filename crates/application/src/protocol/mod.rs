mod framed_link;
mod parameter_protocol;

pub use framed_link::FramedLink;
pub use parameter_protocol::ParameterProtocol;
