use infrastructure::{AgentConfig, TransportConfig};

fn write_default(dir: &std::path::Path, contents: &str) -> String {
    std::fs::write(dir.join("default.toml"), contents).unwrap();
    dir.to_string_lossy().into_owned()
}

#[test]
fn test_minimal_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = write_default(dir.path(), "device_name = \"north-dome\"\n");

    let config = AgentConfig::load(&config_dir).unwrap();
    assert_eq!(config.device_name, "north-dome");
    assert_eq!(config.poll_interval_ms, 1000);
    assert_eq!(config.state_file, "data/dome_state.conf");
    assert_eq!(config.profile.reply_timeout_ms, 3000);
    assert_eq!(config.profile.terminator, '#');
    assert!(!config.policy.close_shutter_on_park);
    assert_eq!(config.policy.max_operation_retries, 3);
    assert!(matches!(config.transport, TransportConfig::Simulator(_)));
}

#[test]
fn test_serial_transport_and_policy() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = write_default(
        dir.path(),
        r#"
poll_interval_ms = 250

[transport]
type = "Serial"
port = "/dev/ttyACM0"
baud_rate = 115200

[profile]
value_width = 6

[policy]
close_shutter_on_park = true
default_park_azimuth = 180.0
"#,
    );

    let config = AgentConfig::load(&config_dir).unwrap();
    assert_eq!(config.poll_interval_ms, 250);
    assert_eq!(config.profile.value_width, 6);
    assert!(config.policy.close_shutter_on_park);
    assert_eq!(config.policy.default_park_azimuth.degrees(), 180.0);
    match config.transport {
        TransportConfig::Serial(serial) => {
            assert_eq!(serial.port, "/dev/ttyACM0");
            assert_eq!(serial.baud_rate, 115200);
            assert_eq!(serial.parity, "None");
        }
        other => panic!("unexpected transport {other:?}"),
    }
}

#[test]
fn test_missing_default_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(AgentConfig::load(&dir.path().to_string_lossy()).is_err());
}

#[test]
fn test_out_of_range_park_azimuth_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = write_default(dir.path(), "[policy]\ndefault_park_azimuth = 400.0\n");
    assert!(AgentConfig::load(&config_dir).is_err());
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = write_default(dir.path(), "poll_interval_ms = 0\n");
    assert!(AgentConfig::load(&config_dir).is_err());
}
