use serde::{Deserialize, Serialize};

/// Lifecycle of the link between the controller and the dome firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    /// No transport is attached
    #[default]
    Disconnected,
    /// Transport attached, handshake in progress
    Connecting,
    /// Handshake succeeded; commands may be issued
    Connected,
    /// Transport was lost and the host is re-opening it
    Reconnecting,
    /// Link-level failure; the transport has been dropped
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// States from which a new transport may be attached
    pub fn can_connect(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed | Self::Reconnecting)
    }

    pub fn to_connecting(&self) -> Result<Self, &'static str> {
        if self.can_connect() {
            Ok(Self::Connecting)
        } else {
            Err("Already connected or connecting")
        }
    }

    pub fn to_connected(&self) -> Result<Self, &'static str> {
        match self {
            Self::Connecting => Ok(Self::Connected),
            _ => Err("Handshake can only complete from Connecting"),
        }
    }

    pub fn to_reconnecting(&self) -> Result<Self, &'static str> {
        match self {
            Self::Failed | Self::Disconnected => Ok(Self::Reconnecting),
            _ => Err("Can only reconnect after the link was lost"),
        }
    }
}
