use std::collections::VecDeque;

use domain::diagnostics::hex_dump;
use domain::driver::Transport;
use domain::error::Result;
use domain::protocol::{Frame, FrameCodec, ParameterRequest};
use domain::DomainError;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Upper bound on events parked while waiting for replies
const PENDING_EVENT_LIMIT: usize = 256;

/// Half-duplex request/reply exchange over a transport.
///
/// Event frames that arrive while a reply is outstanding are queued and
/// handed out by the next [`FramedLink::drain_events`], so a reply is never
/// mistaken for an event and an event is never lost behind a reply.
pub struct FramedLink {
    transport: Box<dyn Transport>,
    codec: FrameCodec,
    pending_events: VecDeque<String>,
}

impl FramedLink {
    pub fn new(transport: Box<dyn Transport>, codec: FrameCodec) -> Self {
        Self {
            transport,
            codec,
            pending_events: VecDeque::new(),
        }
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn pending_events(&self) -> usize {
        self.pending_events.len()
    }

    /// Send one request and wait for its echo-validated reply payload.
    ///
    /// Replies that echo a different request are late answers to an earlier
    /// timed-out command; they are skipped and the wait goes on until the
    /// deadline, when the last integrity failure seen is reported.
    pub async fn transact(&mut self, request: &ParameterRequest) -> Result<String> {
        let wire = self.codec.encode(request)?;
        let profile = self.codec.profile();
        let terminator = profile.terminator_byte();
        let timeout = profile.reply_timeout();

        debug!(command = %wire, "TX");
        self.transport.write(wire.as_bytes()).await?;

        let deadline = Instant::now() + timeout;
        let mut failure: Option<DomainError> = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(failure.unwrap_or(DomainError::Timeout(timeout)));
            }

            let raw = match self.transport.read_until(terminator, remaining).await {
                Ok(raw) => raw,
                Err(DomainError::Timeout(_)) => {
                    return Err(failure.unwrap_or(DomainError::Timeout(timeout)));
                }
                Err(e @ DomainError::MalformedFrame(_)) => {
                    warn!(command = %wire, error = %e, "Garbage while awaiting reply");
                    failure = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.codec.decode(&raw) {
                Ok(Frame::Reply(reply)) => {
                    debug!(command = %wire, reply = %reply, "RX");
                    match self.codec.validate_reply(request, &reply) {
                        Ok(payload) => return Ok(payload),
                        Err(e) => {
                            warn!(command = %wire, error = %e, "Skipping reply to another request");
                            failure = Some(e);
                        }
                    }
                }
                Ok(Frame::Event(body)) => {
                    trace!(event = %body, "Event arrived ahead of reply");
                    self.queue_event(body);
                }
                Err(e) => {
                    warn!(raw = %hex_dump(&raw), error = %e, "Discarding malformed frame");
                    failure = Some(e);
                }
            }
        }
    }

    /// Collect queued events, then whatever arrives within the short drain
    /// window, up to the profile's per-drain limit
    pub async fn drain_events(&mut self) -> Result<Vec<String>> {
        let profile = self.codec.profile();
        let terminator = profile.terminator_byte();
        let window = profile.drain_timeout();
        let limit = profile.max_events_per_drain;

        let mut events: Vec<String> = self.pending_events.drain(..).collect();

        for _ in 0..limit {
            if events.len() >= limit {
                break;
            }
            let raw = match self.transport.read_until(terminator, window).await {
                Ok(raw) => raw,
                Err(DomainError::Timeout(_)) => break,
                Err(e @ DomainError::MalformedFrame(_)) => {
                    warn!(error = %e, "Garbage while draining events");
                    continue;
                }
                Err(e) => return Err(e),
            };
            match self.codec.decode(&raw) {
                Ok(Frame::Event(body)) => {
                    debug!(event = %body, "Event");
                    events.push(body);
                }
                Ok(Frame::Reply(reply)) => {
                    warn!(reply = %reply, "Discarding reply with no outstanding request");
                }
                Err(e) => {
                    warn!(raw = %hex_dump(&raw), error = %e, "Discarding malformed frame");
                }
            }
        }

        Ok(events)
    }

    pub async fn close(&mut self) -> Result<()> {
        self.pending_events.clear();
        self.transport.close().await
    }

    fn queue_event(&mut self, body: String) {
        if self.pending_events.len() >= PENDING_EVENT_LIMIT {
            if let Some(dropped) = self.pending_events.pop_front() {
                warn!(event = %dropped, "Event queue full, dropping oldest");
            }
        }
        self.pending_events.push_back(body);
    }
}
