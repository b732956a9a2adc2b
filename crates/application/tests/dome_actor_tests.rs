mod support;

use std::sync::Arc;
use std::time::Duration;

use application::{CommandListener, CommandReply, DomeActor, DomeCommand, DomeController, OperationStatus};
use domain::dome::{DeviceState, MotionPhase, ParkPhase};
use domain::protocol::DeviceProfile;
use domain::{ConnectionState, DomainError, DomainEvent, DomePolicy};
use infrastructure::drivers::SimulatorConfig;
use infrastructure::{ChannelEventPublisher, DriverFactory, TransportConfig};
use support::{FakeFactory, FakeWire, MemoryStore};
use tokio::sync::broadcast;

const POLL: Duration = Duration::from_millis(250);

fn simulator() -> Arc<DriverFactory> {
    let config = SimulatorConfig {
        degrees_per_sec: 30.0,
        shutter_travel_ms: 2000,
        ..SimulatorConfig::default()
    };
    Arc::new(DriverFactory::new(
        TransportConfig::Simulator(config),
        DeviceProfile::default(),
    ))
}

async fn status(handle: &application::DomeHandle) -> DeviceState {
    match handle.send(DomeCommand::Status).await.unwrap() {
        CommandReply::State { state } => *state,
        other => panic!("unexpected reply {other:?}"),
    }
}

async fn wait_for(
    handle: &application::DomeHandle,
    done: impl Fn(&DeviceState) -> bool,
) -> DeviceState {
    for _ in 0..200 {
        let state = status(handle).await;
        if done(&state) {
            return state;
        }
        tokio::time::sleep(POLL).await;
    }
    panic!("dome never reached the expected state");
}

fn drain(rx: &mut broadcast::Receiver<DomainEvent>) -> Vec<DomainEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn test_actor_moves_and_parks_the_simulated_dome() {
    let store = MemoryStore::default();
    let publisher = Arc::new(ChannelEventPublisher::new(1024));
    let mut events = publisher.subscribe();
    let controller = DomeController::new(DeviceProfile::default(), DomePolicy::default());
    let (actor, handle) = DomeActor::new(
        "test-dome",
        controller,
        simulator(),
        Arc::new(store.clone()),
        publisher,
        POLL,
    );
    let task = tokio::spawn(actor.run());

    let state = wait_for(&handle, |s| s.connection() == ConnectionState::Connected).await;
    assert_eq!(state.firmware_version().unwrap().to_string(), "03.02");

    let reply = handle
        .send(DomeCommand::MoveAbsolute { azimuth: 90.0 })
        .await
        .unwrap();
    assert_eq!(
        reply,
        CommandReply::Status {
            status: OperationStatus::InProgress
        }
    );

    let state = wait_for(&handle, |s| s.motion() == MotionPhase::Idle).await;
    assert_eq!(state.azimuth().degrees(), 90.0);

    handle.send(DomeCommand::Park).await.unwrap();
    let state = wait_for(&handle, |s| s.park() == ParkPhase::Parked).await;
    assert_eq!(state.azimuth().degrees(), 0.0);

    let published = drain(&mut events);
    assert!(published.iter().any(|e| matches!(
        e,
        DomainEvent::ParkPhaseChanged {
            to: ParkPhase::Parked,
            ..
        }
    )));
    assert!(published
        .iter()
        .any(|e| matches!(e, DomainEvent::AzimuthChanged { .. })));

    handle.shutdown();
    let controller = task.await.unwrap();
    assert_eq!(controller.state().connection(), ConnectionState::Disconnected);
    assert_eq!(
        store.pairs.lock().unwrap().get("parked").map(String::as_str),
        Some("true")
    );
}

#[tokio::test(start_paused = true)]
async fn test_rejected_command_is_published() {
    let publisher = Arc::new(ChannelEventPublisher::new(64));
    let mut events = publisher.subscribe();
    let controller = DomeController::new(DeviceProfile::default(), DomePolicy::default());
    let (actor, handle) = DomeActor::new(
        "test-dome",
        controller,
        simulator(),
        Arc::new(MemoryStore::default()),
        publisher,
        POLL,
    );
    let task = tokio::spawn(actor.run());

    let result = handle
        .send(DomeCommand::MoveAbsolute { azimuth: 400.0 })
        .await;
    assert!(matches!(result, Err(DomainError::InvalidArgument(_))));

    let published = drain(&mut events);
    assert!(published.iter().any(|e| matches!(
        e,
        DomainEvent::OperationFailed { operation, .. } if operation == "move_absolute"
    )));

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_actor_restores_persisted_state_and_reconnects() {
    let store = MemoryStore::default();
    store
        .pairs
        .lock()
        .unwrap()
        .insert("park_azimuth".to_string(), "45".to_string());

    let wire = FakeWire::new();
    let controller = DomeController::new(DeviceProfile::default(), DomePolicy::default());
    let (actor, handle) = DomeActor::new(
        "test-dome",
        controller,
        Arc::new(FakeFactory { wire: wire.clone() }),
        Arc::new(store.clone()),
        Arc::new(ChannelEventPublisher::new(64)),
        POLL,
    );
    let task = tokio::spawn(actor.run());

    let state = wait_for(&handle, |s| s.connection() == ConnectionState::Connected).await;
    assert_eq!(state.settings().park_azimuth.degrees(), 45.0);

    assert_eq!(
        handle.send(DomeCommand::Disconnect).await.unwrap(),
        CommandReply::Done
    );
    tokio::time::sleep(POLL * 4).await;
    assert_eq!(
        status(&handle).await.connection(),
        ConnectionState::Disconnected
    );

    handle.send(DomeCommand::Connect).await.unwrap();
    assert!(matches!(
        handle.send(DomeCommand::Connect).await,
        Err(DomainError::Busy(_))
    ));

    handle.shutdown();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_command_listener_answers_every_line() {
    let controller = DomeController::new(DeviceProfile::default(), DomePolicy::default());
    let (actor, handle) = DomeActor::new(
        "test-dome",
        controller,
        simulator(),
        Arc::new(MemoryStore::default()),
        Arc::new(ChannelEventPublisher::new(64)),
        POLL,
    );
    let task = tokio::spawn(actor.run());

    let input = b"version\n\n# comment\nmove 400\nfly\n{\"type\":\"Status\"}\n".as_slice();
    let mut output = Vec::new();
    CommandListener::new(handle.clone())
        .run(input, &mut output)
        .await
        .unwrap();

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["ok"], true);
    assert_eq!(lines[0]["reply"]["type"], "Firmware");
    assert_eq!(lines[1]["ok"], false);
    assert_eq!(lines[2]["ok"], false);
    assert_eq!(lines[3]["reply"]["type"], "State");

    handle.shutdown();
    task.await.unwrap();
}
