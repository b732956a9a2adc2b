#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use domain::protocol::{Command, DeviceProfile, FrameCodec, RequestKind};
use domain::{DomainError, Transport, TransportFactory};
use tokio::time::Instant;

/// What the fake firmware does with the next command written to it
#[derive(Debug, Clone)]
pub enum Script {
    /// Answer with these raw bytes
    Raw(String),
    /// Stay silent so the reply times out
    Silent,
}

struct Wire {
    codec: FrameCodec,
    written: Vec<String>,
    inbound: VecDeque<u8>,
    scripted: VecDeque<Script>,
    fail_io: bool,
    closed: bool,
}

/// In-memory firmware stand-in: acknowledges every command with its echo
/// unless a reply has been scripted
#[derive(Clone)]
pub struct FakeWire {
    inner: Arc<Mutex<Wire>>,
}

impl FakeWire {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Wire {
                codec: FrameCodec::new(DeviceProfile::default()),
                written: Vec::new(),
                inbound: VecDeque::new(),
                scripted: VecDeque::new(),
                fail_io: false,
                closed: false,
            })),
        }
    }

    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(FakeTransport {
            wire: self.clone(),
        })
    }

    pub fn written(&self) -> Vec<String> {
        self.inner.lock().unwrap().written.clone()
    }

    pub fn written_since(&self, start: usize) -> Vec<String> {
        self.written().split_off(start)
    }

    pub fn clear_written(&self) {
        self.inner.lock().unwrap().written.clear();
    }

    pub fn script(&self, script: Script) {
        self.inner.lock().unwrap().scripted.push_back(script);
    }

    /// Queue an unsolicited `!<body>#` frame
    pub fn event(&self, body: &str) {
        let mut wire = self.inner.lock().unwrap();
        let frame = wire.codec.format_event(body);
        wire.inbound.extend(frame.bytes());
    }

    pub fn raw(&self, bytes: &str) {
        self.inner.lock().unwrap().inbound.extend(bytes.bytes());
    }

    pub fn fail_io(&self) {
        self.inner.lock().unwrap().fail_io = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }
}

fn default_payload(command: Command, kind: &RequestKind) -> &'static str {
    match (command, kind) {
        (Command::FirmwareVersion, _) => "03.02",
        (Command::BatteryLevel, _) => "1260,0085",
        (_, RequestKind::Get) => "0",
        _ => "",
    }
}

pub struct FakeTransport {
    wire: FakeWire,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), DomainError> {
        let mut wire = self.wire.inner.lock().unwrap();
        if wire.fail_io {
            return Err(DomainError::Io("cable pulled".to_string()));
        }
        let text = String::from_utf8_lossy(bytes).to_string();
        wire.written.push(text);

        match wire.scripted.pop_front() {
            Some(Script::Raw(reply)) => wire.inbound.extend(reply.bytes()),
            Some(Script::Silent) => {}
            None => {
                if let Ok(request) = wire.codec.decode_request(bytes) {
                    let payload = default_payload(request.command, &request.kind);
                    let reply = wire.codec.format_reply(&request, payload);
                    wire.inbound.extend(reply.bytes());
                }
            }
        }
        Ok(())
    }

    async fn read_until(
        &mut self,
        delimiter: u8,
        timeout: Duration,
    ) -> Result<Vec<u8>, DomainError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut wire = self.wire.inner.lock().unwrap();
                if wire.fail_io {
                    return Err(DomainError::Io("cable pulled".to_string()));
                }
                if let Some(end) = wire.inbound.iter().position(|b| *b == delimiter) {
                    return Ok(wire.inbound.drain(..=end).collect());
                }
            }
            if Instant::now() >= deadline {
                return Err(DomainError::Timeout(timeout));
            }
            tokio::time::sleep(Duration::from_millis(5).min(timeout)).await;
        }
    }

    async fn close(&mut self) -> Result<(), DomainError> {
        self.wire.inner.lock().unwrap().closed = true;
        Ok(())
    }

    fn describe(&self) -> &str {
        "fake"
    }
}

/// Hands out transports over the same fake wire
pub struct FakeFactory {
    pub wire: FakeWire,
}

impl TransportFactory for FakeFactory {
    fn open(&self) -> Result<Box<dyn Transport>, DomainError> {
        Ok(self.wire.transport())
    }
}

/// State store kept in memory so tests can inspect what was persisted
#[derive(Clone, Default)]
pub struct MemoryStore {
    pub pairs: Arc<Mutex<std::collections::BTreeMap<String, String>>>,
}

#[async_trait]
impl domain::StateStore for MemoryStore {
    async fn load(&self) -> Result<std::collections::BTreeMap<String, String>, DomainError> {
        Ok(self.pairs.lock().unwrap().clone())
    }

    async fn save(
        &self,
        pairs: &std::collections::BTreeMap<String, String>,
    ) -> Result<(), DomainError> {
        *self.pairs.lock().unwrap() = pairs.clone();
        Ok(())
    }
}
