use domain::error::Result;
use domain::protocol::{Command, FrameCodec, ParameterRequest, Target};
use domain::DomainError;

use super::framed_link::FramedLink;

/// Generic get/set/action round trips; callers interpret the payloads
pub struct ParameterProtocol {
    link: FramedLink,
}

impl ParameterProtocol {
    pub fn new(link: FramedLink) -> Self {
        Self { link }
    }

    pub fn codec(&self) -> &FrameCodec {
        self.link.codec()
    }

    /// Write a value; succeeds only when the reply echoes command and target
    pub async fn set_parameter(&mut self, command: Command, target: Target, value: i32) -> Result<()> {
        self.link
            .transact(&ParameterRequest::set(command, target, value))
            .await
            .map(|_| ())
    }

    /// Query a value and return the raw payload after the echo
    pub async fn get_parameter(&mut self, command: Command, target: Target) -> Result<String> {
        self.link
            .transact(&ParameterRequest::get(command, target))
            .await
    }

    /// Trigger an action that carries no value
    pub async fn execute(&mut self, command: Command, target: Target) -> Result<()> {
        self.link
            .transact(&ParameterRequest::action(command, target))
            .await
            .map(|_| ())
    }

    /// `get_parameter` for plain decimal payloads
    pub async fn get_integer(&mut self, command: Command, target: Target) -> Result<i32> {
        let payload = self.get_parameter(command, target).await?;
        payload.trim().parse::<i32>().map_err(|_| {
            DomainError::MalformedFrame(format!(
                "expected an integer for {}{}, got '{}'",
                command.token(),
                target.token(),
                payload
            ))
        })
    }

    /// Event bodies received since the last call
    pub async fn check_events(&mut self) -> Result<Vec<String>> {
        self.link.drain_events().await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.link.close().await
    }
}
