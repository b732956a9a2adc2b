use super::command::{Command, Target};
use super::profile::DeviceProfile;
use super::request::{ParameterRequest, RequestKind};
use crate::error::{DomainError, Result};

/// One decoded unit of inbound wire traffic, stripped of prefix and terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Reply to the most recently sent command: `<CMD><TGT><payload>`
    Reply(String),
    /// Unsolicited notification: `<TAG><data>`
    Event(String),
}

/// Encodes requests into the `#`-terminated wire format and classifies
/// inbound frames as replies or events
#[derive(Debug, Clone)]
pub struct FrameCodec {
    profile: DeviceProfile,
}

impl FrameCodec {
    pub fn new(profile: DeviceProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn encode(&self, request: &ParameterRequest) -> Result<String> {
        let mut wire = String::with_capacity(self.profile.value_width + 6);
        wire.push(self.profile.command_prefix);
        wire.push_str(request.command.token());
        wire.push(request.target.token());
        match request.kind {
            RequestKind::Set(value) => wire.push_str(&self.encode_value(value)?),
            RequestKind::Get => wire.push(self.profile.query_marker),
            RequestKind::Action => {}
        }
        wire.push(self.profile.terminator);
        Ok(wire)
    }

    /// Zero-padded decimal, rejected when it does not fit the configured width
    pub fn encode_value(&self, value: i32) -> Result<String> {
        let wide = i64::from(value);
        if wide > self.profile.max_value() || wide < self.profile.min_value() {
            return Err(DomainError::InvalidArgument(format!(
                "Value {} does not fit in {} digits",
                value, self.profile.value_width
            )));
        }
        Ok(format!("{:0width$}", value, width = self.profile.value_width))
    }

    /// Decode bytes up to and including the terminator.
    ///
    /// Line noise ahead of the frame is dropped: the frame starts at the first
    /// reply/event prefix after the last non-printable byte that is followed by
    /// a well-formed header, so payloads may themselves contain `:` or `!`.
    pub fn decode(&self, raw: &[u8]) -> Result<Frame> {
        let body = self.strip_terminator(raw)?;
        let reply = self.profile.reply_prefix as u8;
        let event = self.profile.event_prefix as u8;

        let clean = body
            .iter()
            .rposition(|b| !is_printable(*b))
            .map_or(0, |i| i + 1);
        let prefixes =
            move || (clean..body.len()).filter(move |&i| body[i] == reply || body[i] == event);
        let start = prefixes()
            .find(|&i| self.has_header(&body[i..]))
            .or_else(|| prefixes().last())
            .ok_or_else(|| DomainError::MalformedFrame("no reply or event prefix".to_string()))?;
        let content = printable(&body[start + 1..])?;

        if body[start] == reply {
            if content.len() < 3 {
                return Err(DomainError::MalformedFrame(format!(
                    "reply '{content}' is too short to carry an echo"
                )));
            }
            Ok(Frame::Reply(content))
        } else {
            if content.len() < 2 {
                return Err(DomainError::MalformedFrame(format!(
                    "event '{content}' is missing its tag"
                )));
            }
            Ok(Frame::Event(content))
        }
    }

    /// Reply prefix followed by a known command and target, or event prefix
    /// followed by a two-letter tag
    fn has_header(&self, candidate: &[u8]) -> bool {
        match candidate {
            [prefix, c1, c2, target, ..] if *prefix == self.profile.reply_prefix as u8 => {
                let token = [*c1, *c2];
                std::str::from_utf8(&token)
                    .ok()
                    .and_then(Command::from_token)
                    .is_some()
                    && Target::from_token(*target as char).is_some()
            }
            [prefix, t1, t2, ..] if *prefix == self.profile.event_prefix as u8 => {
                t1.is_ascii_uppercase() && t2.is_ascii_uppercase()
            }
            _ => false,
        }
    }

    /// Echo-validate a reply against the request it answers and return the
    /// remaining payload
    pub fn validate_reply(&self, request: &ParameterRequest, reply: &str) -> Result<String> {
        let echo = request.echo();
        match reply.strip_prefix(echo.as_str()) {
            Some(payload) => Ok(payload.to_string()),
            None => Err(DomainError::UnexpectedReply {
                expected: echo,
                received: reply.to_string(),
            }),
        }
    }

    /// Parse a command frame the way the firmware does
    pub fn decode_request(&self, raw: &[u8]) -> Result<ParameterRequest> {
        let body = self.strip_terminator(raw)?;
        let prefix = self.profile.command_prefix as u8;
        let start = body
            .iter()
            .rposition(|b| *b == prefix)
            .ok_or_else(|| DomainError::MalformedFrame("no command prefix".to_string()))?;
        let content = printable(&body[start + 1..])?;

        let command = content
            .get(..2)
            .and_then(Command::from_token)
            .ok_or_else(|| DomainError::MalformedFrame(format!("unknown command in '{content}'")))?;
        let target = content
            .chars()
            .nth(2)
            .and_then(Target::from_token)
            .ok_or_else(|| DomainError::MalformedFrame(format!("unknown target in '{content}'")))?;

        let rest = &content[3..];
        let kind = if rest.is_empty() {
            RequestKind::Action
        } else if rest.len() == 1 && rest.starts_with(self.profile.query_marker) {
            RequestKind::Get
        } else {
            let value = rest
                .parse::<i32>()
                .map_err(|_| DomainError::MalformedFrame(format!("bad value '{rest}'")))?;
            RequestKind::Set(value)
        };

        Ok(ParameterRequest {
            command,
            target,
            kind,
        })
    }

    pub fn format_reply(&self, request: &ParameterRequest, payload: &str) -> String {
        format!(
            "{}{}{}{}",
            self.profile.reply_prefix,
            request.echo(),
            payload,
            self.profile.terminator
        )
    }

    pub fn format_event(&self, body: &str) -> String {
        format!(
            "{}{}{}",
            self.profile.event_prefix, body, self.profile.terminator
        )
    }

    /// Frames longer than the profile allows keep only their tail; whatever
    /// came before is noise that overran the line
    fn strip_terminator<'a>(&self, raw: &'a [u8]) -> Result<&'a [u8]> {
        let raw = &raw[raw.len().saturating_sub(self.profile.max_frame_len)..];
        match raw.split_last() {
            Some((last, body)) if *last == self.profile.terminator_byte() => Ok(body),
            _ => Err(DomainError::MalformedFrame(
                "frame is not terminated".to_string(),
            )),
        }
    }
}

fn is_printable(b: u8) -> bool {
    b.is_ascii_graphic() || b == b' '
}

fn printable(bytes: &[u8]) -> Result<String> {
    if bytes.iter().all(|b| is_printable(*b)) {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    } else {
        Err(DomainError::MalformedFrame(format!(
            "non-printable bytes in {}",
            crate::diagnostics::hex_dump(bytes)
        )))
    }
}
