use super::command::{Command, Target};

/// What a request asks the firmware to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Write a value
    Set(i32),
    /// Read a value back
    Get,
    /// Trigger an action that carries no value (home, open, abort...)
    Action,
}

/// A (command, target, optional value) triple, built per call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterRequest {
    pub command: Command,
    pub target: Target,
    pub kind: RequestKind,
}

impl ParameterRequest {
    pub fn set(command: Command, target: Target, value: i32) -> Self {
        Self {
            command,
            target,
            kind: RequestKind::Set(value),
        }
    }

    pub fn get(command: Command, target: Target) -> Self {
        Self {
            command,
            target,
            kind: RequestKind::Get,
        }
    }

    pub fn action(command: Command, target: Target) -> Self {
        Self {
            command,
            target,
            kind: RequestKind::Action,
        }
    }

    /// The `<command><target>` prefix every reply must echo
    pub fn echo(&self) -> String {
        format!("{}{}", self.command.token(), self.target.token())
    }

    pub fn value(&self) -> Option<i32> {
        match self.kind {
            RequestKind::Set(value) => Some(value),
            _ => None,
        }
    }
}
