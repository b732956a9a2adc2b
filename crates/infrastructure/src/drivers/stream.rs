use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use domain::DomainError;
use domain::diagnostics::hex_dump;
use domain::driver::Transport;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

/// Anything that can carry the dome protocol: serial ports, sockets, pipes
pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> SerialPortIO for T {}

/// Frame-oriented transport over a byte stream.
///
/// Bytes read past a delimiter stay buffered for the next call, so an event
/// that arrives glued to a reply is never lost.
pub struct StreamTransport<S: SerialPortIO> {
    stream: S,
    buffer: BytesMut,
    max_frame_len: usize,
    label: String,
}

impl<S: SerialPortIO> StreamTransport<S> {
    pub fn new(stream: S, max_frame_len: usize, label: impl Into<String>) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(max_frame_len.max(64)),
            max_frame_len,
            label: label.into(),
        }
    }

    /// Bytes received but not yet returned as a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn take_frame(&mut self, delimiter: u8) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|b| *b == delimiter)?;
        Some(self.buffer.split_to(end + 1).to_vec())
    }
}

#[async_trait]
impl<S: SerialPortIO> Transport for StreamTransport<S> {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), DomainError> {
        tracing::trace!(link = %self.label, raw = %hex_dump(bytes), "TX");
        self.stream
            .write_all(bytes)
            .await
            .map_err(|e| DomainError::Io(format!("Write error on {}: {}", self.label, e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| DomainError::Io(format!("Flush error on {}: {}", self.label, e)))?;
        Ok(())
    }

    async fn read_until(
        &mut self,
        delimiter: u8,
        timeout: Duration,
    ) -> Result<Vec<u8>, DomainError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(frame) = self.take_frame(delimiter) {
                tracing::trace!(link = %self.label, raw = %hex_dump(&frame), "RX");
                return Ok(frame);
            }

            // Keep the tail: it may hold the start of the frame that overran the noise
            if self.buffer.len() >= self.max_frame_len {
                let keep = self.max_frame_len.saturating_sub(1);
                let dropped = self.buffer.split_to(self.buffer.len() - keep).freeze();
                tracing::warn!(
                    link = %self.label,
                    bytes = dropped.len(),
                    raw = %hex_dump(&dropped),
                    "Discarding unterminated data"
                );
                return Err(DomainError::MalformedFrame(format!(
                    "no terminator within {} bytes",
                    self.max_frame_len
                )));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(DomainError::Timeout(timeout));
            }

            self.buffer.reserve(64);
            match tokio::time::timeout(remaining, self.stream.read_buf(&mut self.buffer)).await {
                Ok(Ok(0)) => {
                    return Err(DomainError::Io(format!(
                        "{} closed by the remote end",
                        self.label
                    )));
                }
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => {
                    tracing::error!(link = %self.label, error = %e, "Read error");
                    return Err(DomainError::Io(format!("Read error on {}: {}", self.label, e)));
                }
                Err(_) => return Err(DomainError::Timeout(timeout)),
            }
        }
    }

    async fn close(&mut self) -> Result<(), DomainError> {
        if let Err(e) = self.stream.shutdown().await {
            tracing::warn!(link = %self.label, error = %e, "Error shutting down link");
        }
        self.buffer.clear();
        tracing::info!(link = %self.label, "Link closed");
        Ok(())
    }

    fn describe(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_frames_are_split_on_delimiter() {
        let (client, mut device) = duplex(256);
        let mut transport = StreamTransport::new(client, 64, "test");

        device.write_all(b":GAR#!MC1800#").await.unwrap();

        let first = transport
            .read_until(b'#', Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(first, b":GAR#");
        assert_eq!(transport.buffered(), 8);

        let second = transport
            .read_until(b'#', Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(second, b"!MC1800#");
    }

    #[tokio::test]
    async fn test_partial_frame_survives_a_timeout() {
        let (client, mut device) = duplex(256);
        let mut transport = StreamTransport::new(client, 64, "test");

        device.write_all(b":FVC").await.unwrap();
        let err = transport
            .read_until(b'#', Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Timeout(_)));

        device.write_all(b"V03.02#").await.unwrap();
        let frame = transport
            .read_until(b'#', Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(frame, b":FVCV03.02#");
    }

    #[tokio::test]
    async fn test_unterminated_stream_is_bounded() {
        let (client, mut device) = duplex(256);
        let mut transport = StreamTransport::new(client, 16, "test");

        device.write_all(&[b'x'; 40]).await.unwrap();
        let err = transport
            .read_until(b'#', Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::MalformedFrame(_)));
        assert_eq!(transport.buffered(), 15);
    }

    #[tokio::test]
    async fn test_overflow_keeps_start_of_next_frame() {
        let (client, mut device) = duplex(256);
        let mut transport = StreamTransport::new(client, 16, "test");

        device.write_all(&[b'x'; 12]).await.unwrap();
        device.write_all(b":VLS").await.unwrap();
        let err = transport
            .read_until(b'#', Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::MalformedFrame(_)));

        device.write_all(b"00600#").await.unwrap();
        let frame = transport
            .read_until(b'#', Duration::from_millis(100))
            .await
            .unwrap();
        assert!(frame.ends_with(b":VLS00600#"));
    }

    #[tokio::test]
    async fn test_closed_peer_is_an_io_error() {
        let (client, device) = duplex(256);
        let mut transport = StreamTransport::new(client, 64, "test");
        drop(device);

        let err = transport
            .read_until(b'#', Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_write_reaches_peer() {
        let (client, mut device) = duplex(256);
        let mut transport = StreamTransport::new(client, 64, "test");

        transport.write(b"@FVC?#").await.unwrap();
        let mut buf = [0u8; 6];
        device.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"@FVC?#");
    }
}
