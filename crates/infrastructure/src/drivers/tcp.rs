use std::net::ToSocketAddrs;
use std::time::Duration;

use domain::DomainError;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;

use super::stream::StreamTransport;

/// Serial-over-network adapter (e.g. a terminal server in the observatory)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_connect_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

impl TcpConfig {
    pub fn open(&self, max_frame_len: usize) -> Result<StreamTransport<TcpStream>, DomainError> {
        let endpoint = format!("{}:{}", self.host, self.port);
        let address = endpoint
            .to_socket_addrs()
            .map_err(|e| DomainError::Io(format!("Cannot resolve {endpoint}: {e}")))?
            .next()
            .ok_or_else(|| DomainError::Io(format!("No address for {endpoint}")))?;

        tracing::debug!(endpoint = %endpoint, "Connecting to serial server");

        let stream =
            std::net::TcpStream::connect_timeout(&address, Duration::from_millis(self.timeout_ms))
                .map_err(|e| {
                    tracing::warn!(endpoint = %endpoint, error = %e, "Connection failed");
                    DomainError::Io(format!("Failed to connect to {endpoint}: {e}"))
                })?;
        stream
            .set_nonblocking(true)
            .and_then(|_| stream.set_nodelay(true))
            .map_err(|e| DomainError::Io(format!("Socket setup failed: {e}")))?;
        let stream = TcpStream::from_std(stream)
            .map_err(|e| DomainError::Io(format!("Socket registration failed: {e}")))?;

        tracing::info!(endpoint = %endpoint, "Connected to serial server");
        Ok(StreamTransport::new(stream, max_frame_len, format!("tcp:{endpoint}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::Transport;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_tcp_round_trip() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = TcpConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 500,
        };
        let mut transport = config.open(64).unwrap();
        let (mut peer, _) = listener.accept().await.unwrap();

        peer.write_all(b":FVCV03.02#").await.unwrap();
        let frame = transport
            .read_until(b'#', Duration::from_millis(500))
            .await
            .unwrap();
        assert_eq!(frame, b":FVCV03.02#");
        assert_eq!(transport.describe(), format!("tcp:127.0.0.1:{port}"));
    }

    #[test]
    fn test_refused_connection_is_io_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = TcpConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_ms: 200,
        };
        assert!(matches!(config.open(64), Err(DomainError::Io(_))));
    }
}
