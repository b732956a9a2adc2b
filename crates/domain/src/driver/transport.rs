use std::time::Duration;

use async_trait::async_trait;

use crate::error::DomainError;

/// Byte-oriented duplex link to the firmware.
///
/// Implementations buffer any bytes read past a delimiter so the next
/// `read_until` call sees them. The protocol on top is half-duplex: a caller
/// must consume a reply before writing the next command.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write all bytes and flush
    async fn write(&mut self, bytes: &[u8]) -> Result<(), DomainError>;

    /// Read up to and including `delimiter`.
    ///
    /// Fails with `Timeout` if the delimiter is not seen within `timeout`,
    /// `MalformedFrame` if the frame length limit is exceeded, `Io` on a
    /// lower-level failure.
    async fn read_until(&mut self, delimiter: u8, timeout: Duration)
    -> Result<Vec<u8>, DomainError>;

    /// Release the underlying link
    async fn close(&mut self) -> Result<(), DomainError>;

    /// Short identifier for logs
    fn describe(&self) -> &str;
}

/// Opens fresh transports, used at start-up and for reconnection
pub trait TransportFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn Transport>, DomainError>;
}
