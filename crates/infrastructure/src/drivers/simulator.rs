use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use domain::dome::Azimuth;
use domain::driver::Transport;
use domain::protocol::{Command, DeviceProfile, FrameCodec, ParameterRequest, RequestKind, Target};
use domain::DomainError;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Instant};

const TICK: Duration = Duration::from_millis(10);

/// Behaviour of the simulated dome firmware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_degrees_per_sec")]
    pub degrees_per_sec: f64,
    #[serde(default = "default_shutter_travel_ms")]
    pub shutter_travel_ms: u64,
    #[serde(default = "default_calibration_ms")]
    pub calibration_ms: u64,
    /// Interval between `PS` reports while rotating
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
    #[serde(default)]
    pub initial_azimuth: f64,
    #[serde(default)]
    pub home_azimuth: f64,
    #[serde(default = "default_firmware_version")]
    pub firmware_version: String,
    /// `BV` payload, centivolts and centiamps
    #[serde(default = "default_battery")]
    pub battery: String,
}

fn default_degrees_per_sec() -> f64 {
    10.0
}
fn default_shutter_travel_ms() -> u64 {
    5000
}
fn default_calibration_ms() -> u64 {
    8000
}
fn default_report_interval_ms() -> u64 {
    500
}
fn default_firmware_version() -> String {
    "V03.02".to_string()
}
fn default_battery() -> String {
    "1260,0085".to_string()
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            degrees_per_sec: default_degrees_per_sec(),
            shutter_travel_ms: default_shutter_travel_ms(),
            calibration_ms: default_calibration_ms(),
            report_interval_ms: default_report_interval_ms(),
            initial_azimuth: 0.0,
            home_azimuth: 0.0,
            firmware_version: default_firmware_version(),
            battery: default_battery(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Travel {
    Goto,
    Home,
    Calibrate,
}

#[derive(Debug)]
struct Rotation {
    from: f64,
    delta: f64,
    started: Instant,
    duration: Duration,
    travel: Travel,
}

#[derive(Debug)]
struct ShutterTravel {
    opening: bool,
    started: Instant,
}

/// In-process stand-in for the dome firmware.
///
/// Commands are answered immediately; rotation, homing, calibration and
/// shutter travel advance with the clock and announce their progress as
/// event frames.
pub struct SimulatedDome {
    config: SimulatorConfig,
    codec: FrameCodec,
    azimuth: f64,
    home_azimuth: f64,
    rotation: Option<Rotation>,
    shutter: Option<ShutterTravel>,
    shutter_open: bool,
    registers: HashMap<(Command, Target), i32>,
    outbox: VecDeque<u8>,
    last_report: Instant,
    closed: bool,
}

impl SimulatedDome {
    pub fn new(config: SimulatorConfig, profile: DeviceProfile) -> Self {
        let registers = [
            (Target::Rotator, [150, 3, 55080, 800]),
            (Target::Shutter, [100, 0, 46000, 600]),
        ]
        .into_iter()
        .flat_map(|(target, values)| {
            [
                Command::AccelerationRamp,
                Command::DeadZone,
                Command::TravelRange,
                Command::Velocity,
            ]
            .into_iter()
            .zip(values)
            .map(move |(command, value)| ((command, target), value))
        })
        .collect();

        Self {
            azimuth: Azimuth::normalized(config.initial_azimuth).degrees(),
            home_azimuth: Azimuth::normalized(config.home_azimuth).degrees(),
            config,
            codec: FrameCodec::new(profile),
            rotation: None,
            shutter: None,
            shutter_open: false,
            registers,
            outbox: VecDeque::new(),
            last_report: Instant::now(),
            closed: false,
        }
    }

    fn units(&self, degrees: f64) -> i32 {
        Azimuth::normalized(degrees).to_wire(self.codec.profile().azimuth_scale)
    }

    fn degrees(&self, units: i32) -> f64 {
        Azimuth::from_wire(units, self.codec.profile().azimuth_scale).degrees()
    }

    fn push_event(&mut self, body: &str) {
        tracing::trace!(event = %body, "Simulator event");
        let frame = self.codec.format_event(body);
        self.outbox.extend(frame.bytes());
    }

    fn start_rotation(&mut self, target: f64, travel: Travel, now: Instant) {
        let (delta, duration) = match travel {
            Travel::Calibrate => (360.0, Duration::from_millis(self.config.calibration_ms)),
            _ => {
                let delta = (target - self.azimuth + 540.0).rem_euclid(360.0) - 180.0;
                let rate = self.config.degrees_per_sec.max(0.1);
                (delta, Duration::from_secs_f64(delta.abs() / rate))
            }
        };
        self.rotation = Some(Rotation {
            from: self.azimuth,
            delta,
            started: now,
            duration,
            travel,
        });
        self.last_report = now;
    }

    fn start_shutter(&mut self, opening: bool, now: Instant) {
        if self.shutter.is_none() && self.shutter_open == opening {
            self.push_event(if opening { "SO" } else { "SC" });
            return;
        }
        self.shutter = Some(ShutterTravel {
            opening,
            started: now,
        });
    }

    /// Move the simulated hardware forward to `now`
    fn advance(&mut self, now: Instant) {
        if let Some(rotation) = &self.rotation {
            let elapsed = now.saturating_duration_since(rotation.started);
            let travel = rotation.travel;
            if elapsed >= rotation.duration {
                let end = rotation.from + rotation.delta;
                self.rotation = None;
                self.azimuth = Azimuth::normalized(end).degrees();
                let units = self.units(self.azimuth);
                match travel {
                    Travel::Goto => self.push_event(&format!("MC{units}")),
                    Travel::Home => self.push_event(&format!("HF{units}")),
                    Travel::Calibrate => self.push_event("CC"),
                }
            } else {
                let fraction = elapsed.as_secs_f64() / rotation.duration.as_secs_f64();
                self.azimuth = Azimuth::normalized(rotation.from + rotation.delta * fraction)
                    .degrees();
                let report = Duration::from_millis(self.config.report_interval_ms);
                if now.saturating_duration_since(self.last_report) >= report {
                    self.last_report = now;
                    let units = self.units(self.azimuth);
                    self.push_event(&format!("PS{units}"));
                }
            }
        }

        if let Some(shutter) = &self.shutter {
            let travel = Duration::from_millis(self.config.shutter_travel_ms);
            if now.saturating_duration_since(shutter.started) >= travel {
                let opening = shutter.opening;
                self.shutter = None;
                self.shutter_open = opening;
                self.push_event(if opening { "SO" } else { "SC" });
            }
        }
    }

    /// Answer one command; returns the reply payload and any events that
    /// follow the reply on the wire
    fn handle(&mut self, request: &ParameterRequest, now: Instant) -> (String, Vec<String>) {
        use Command::*;

        let mut after = Vec::new();
        let payload = match (request.command, request.target, request.kind) {
            (Position, _, RequestKind::Get) => self.units(self.azimuth).to_string(),
            (Position, _, RequestKind::Set(units)) => {
                self.azimuth = self.degrees(units);
                String::new()
            }
            (GotoAzimuth | Park, Target::Rotator, RequestKind::Set(units)) => {
                if matches!(request.command, Park) {
                    self.registers.insert((Park, Target::Rotator), units);
                }
                self.start_rotation(self.degrees(units), Travel::Goto, now);
                String::new()
            }
            (Park, _, RequestKind::Get) => {
                let parked = self.rotation.is_none()
                    && self.registers.get(&(Park, Target::Rotator))
                        == Some(&self.units(self.azimuth));
                (if parked { "1" } else { "0" }).to_string()
            }
            (GotoHome, Target::Rotator, RequestKind::Action) => {
                self.start_rotation(self.home_azimuth, Travel::Home, now);
                String::new()
            }
            (HomePosition, _, RequestKind::Get) => self.units(self.home_azimuth).to_string(),
            (HomePosition, _, RequestKind::Set(units)) => {
                self.home_azimuth = self.degrees(units);
                String::new()
            }
            (Calibrate, Target::Rotator, RequestKind::Action) => {
                self.start_rotation(self.azimuth, Travel::Calibrate, now);
                String::new()
            }
            (
                AccelerationRamp | DeadZone | TravelRange | Velocity,
                Target::Rotator | Target::Shutter,
                kind,
            ) => {
                let key = (request.command, request.target);
                match kind {
                    RequestKind::Set(value) => {
                        self.registers.insert(key, value);
                        String::new()
                    }
                    _ => self.registers.get(&key).copied().unwrap_or(0).to_string(),
                }
            }
            (Open, Target::Shutter, RequestKind::Action) => {
                self.start_shutter(true, now);
                String::new()
            }
            (Close, Target::Shutter, RequestKind::Action) => {
                self.start_shutter(false, now);
                String::new()
            }
            (Abort, target, RequestKind::Action) => {
                self.advance(now);
                if matches!(target, Target::Controller | Target::Rotator) {
                    self.rotation = None;
                }
                if matches!(target, Target::Controller | Target::Shutter) {
                    self.shutter = None;
                }
                after.push(match target {
                    Target::Controller => "AB".to_string(),
                    other => format!("AB{}", other.token()),
                });
                String::new()
            }
            (BatteryLevel, _, RequestKind::Get) => self.config.battery.clone(),
            (FirmwareVersion, _, RequestKind::Get) => self.config.firmware_version.clone(),
            _ => {
                after.push("ER01".to_string());
                "E".to_string()
            }
        };
        (payload, after)
    }
}

#[async_trait]
impl Transport for SimulatedDome {
    async fn write(&mut self, bytes: &[u8]) -> Result<(), DomainError> {
        if self.closed {
            return Err(DomainError::Io("Simulator link is closed".to_string()));
        }
        let now = Instant::now();
        self.advance(now);

        let request = match self.codec.decode_request(bytes) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "Simulator ignored a malformed command");
                return Ok(());
            }
        };

        let (payload, after) = self.handle(&request, now);
        let reply = self.codec.format_reply(&request, &payload);
        tracing::trace!(request = ?request, reply = %reply, "Simulator reply");
        self.outbox.extend(reply.bytes());
        for body in after {
            self.push_event(&body);
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
            if self.closed {
                return Err(DomainError::Io("Simulator link is closed".to_string()));
            }
            let now = Instant::now();
            self.advance(now);
            if let Some(end) = self.outbox.iter().position(|b| *b == delimiter) {
                return Ok(self.outbox.drain(..=end).collect());
            }
            let remaining = deadline.saturating_duration_since(now);
            if remaining.is_zero() {
                return Err(DomainError::Timeout(timeout));
            }
            sleep(remaining.min(TICK)).await;
        }
    }

    async fn close(&mut self) -> Result<(), DomainError> {
        self.closed = true;
        self.outbox.clear();
        tracing::info!("Simulator disconnected");
        Ok(())
    }

    fn describe(&self) -> &str {
        "simulator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::protocol::Frame;

    fn dome() -> (SimulatedDome, FrameCodec) {
        let profile = DeviceProfile::default();
        (
            SimulatedDome::new(SimulatorConfig::default(), profile.clone()),
            FrameCodec::new(profile),
        )
    }

    async fn next(dome: &mut SimulatedDome, codec: &FrameCodec, wait: Duration) -> Frame {
        let raw = dome.read_until(b'#', wait).await.unwrap();
        codec.decode(&raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_firmware_version_reply() {
        let (mut dome, codec) = dome();
        dome.write(b"@FVC?#").await.unwrap();
        assert_eq!(
            next(&mut dome, &codec, Duration::from_millis(10)).await,
            Frame::Reply("FVCV03.02".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_goto_reports_progress_then_completes() {
        let (mut dome, codec) = dome();
        dome.write(b"@GAR00200#").await.unwrap();
        assert_eq!(
            next(&mut dome, &codec, Duration::from_millis(10)).await,
            Frame::Reply("GAR".to_string())
        );

        // 20 degrees at 10 deg/s
        assert_eq!(
            next(&mut dome, &codec, Duration::from_secs(1)).await,
            Frame::Event("PS50".to_string())
        );
        let mut last = None;
        for _ in 0..10 {
            match next(&mut dome, &codec, Duration::from_secs(3)).await {
                Frame::Event(body) if body.starts_with("MC") => {
                    last = Some(body);
                    break;
                }
                _ => {}
            }
        }
        assert_eq!(last.as_deref(), Some("MC200"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutter_travel_and_abort() {
        let (mut dome, codec) = dome();
        dome.write(b"@OPS#").await.unwrap();
        assert_eq!(
            next(&mut dome, &codec, Duration::from_millis(10)).await,
            Frame::Reply("OPS".to_string())
        );

        dome.write(b"@ABS#").await.unwrap();
        assert_eq!(
            next(&mut dome, &codec, Duration::from_millis(10)).await,
            Frame::Reply("ABS".to_string())
        );
        assert_eq!(
            next(&mut dome, &codec, Duration::from_millis(10)).await,
            Frame::Event("ABS".to_string())
        );

        let err = dome
            .read_until(b'#', Duration::from_secs(6))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Timeout(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_an_already_closed_shutter_reports_at_once() {
        let (mut dome, codec) = dome();
        dome.write(b"@CLS#").await.unwrap();
        next(&mut dome, &codec, Duration::from_millis(10)).await;
        assert_eq!(
            next(&mut dome, &codec, Duration::from_millis(10)).await,
            Frame::Event("SC".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_axis_registers() {
        let (mut dome, codec) = dome();
        dome.write(b"@VLS00750#").await.unwrap();
        next(&mut dome, &codec, Duration::from_millis(10)).await;
        dome.write(b"@VLS?#").await.unwrap();
        assert_eq!(
            next(&mut dome, &codec, Duration::from_millis(10)).await,
            Frame::Reply("VLS750".to_string())
        );
    }

    #[tokio::test]
    async fn test_closed_link_fails() {
        let (mut dome, _) = dome();
        dome.close().await.unwrap();
        assert!(dome.write(b"@FVC?#").await.unwrap_err().is_fatal());
    }
}
