use std::{
    fs,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use devsim_common::{KeyValueStore, Response};
use devsim_engine::{ChannelTransport, DebugSession, Device, DeviceRunner, ScriptHost, SimulatorConfig};
use tracing::info;

const TIMEOUT: Duration = Duration::from_secs(5);

#[test]
fn test_runner_serves_messages() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let device = Device::new(
        "echo",
        ScriptHost::default(),
        "if (message == \"quiet\") return;\nreturn \"ECHO: \" + message;",
        KeyValueStore::new(),
    )
    .unwrap();
    let (transport, handle) = ChannelTransport::pair();
    let runner = DeviceRunner::spawn(Arc::new(device), transport).unwrap();

    handle.send_text("quiet").unwrap();
    handle.send_text("hi").unwrap();
    assert_eq!(handle.recv_response(TIMEOUT), Some(Response::Text("ECHO: hi".into())));
    assert_eq!(handle.recv_response(Duration::from_millis(100)), None);

    runner.shutdown();
}

#[test]
fn test_runner_survives_script_errors() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let device = Device::new(
        "strict",
        ScriptHost::default(),
        "require(message.length > 0, \"empty\");\nreturn message;",
        KeyValueStore::new(),
    )
    .unwrap();
    let (transport, handle) = ChannelTransport::pair();
    let runner = DeviceRunner::spawn(Arc::new(device), transport).unwrap();

    handle.send_text("").unwrap();
    handle.send_text("still here").unwrap();
    assert_eq!(handle.recv_response(TIMEOUT), Some(Response::Text("still here".into())));
    assert!(!runner.is_finished());
    runner.shutdown();
}

#[test]
fn test_recompile_while_running() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let device = Arc::new(Device::new("dev", ScriptHost::default(), "return \"v1\";", KeyValueStore::new()).unwrap());
    let (transport, handle) = ChannelTransport::pair();
    let runner = DeviceRunner::spawn(device.clone(), transport).unwrap();

    handle.send_text("").unwrap();
    assert_eq!(handle.recv_response(TIMEOUT), Some(Response::Text("v1".into())));

    assert!(device.recompile("return undefinedThing;").is_err());
    handle.send_text("").unwrap();
    assert_eq!(handle.recv_response(TIMEOUT), Some(Response::Text("v1".into())));

    device.recompile("return \"v2\";").unwrap();
    handle.send_text("").unwrap();
    assert_eq!(handle.recv_response(TIMEOUT), Some(Response::Text("v2".into())));

    runner.shutdown();
}

#[test]
fn test_shutdown_releases_paused_worker() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let session = Arc::new(DebugSession::new());
    let host = ScriptHost::default().with_session(session.clone());
    let device = Device::new("paused", host, "int a = 1;\nreturn a;", KeyValueStore::new()).unwrap();
    session.add_breakpoint(2);
    session.start_debugging(false);

    let (transport, handle) = ChannelTransport::pair();
    let runner = DeviceRunner::spawn(Arc::new(device), transport).unwrap();
    handle.send_text("go").unwrap();

    let deadline = Instant::now() + TIMEOUT;
    while !session.is_paused() {
        assert!(Instant::now() < deadline, "device never paused");
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(session.last_location().unwrap().line, 2);

    runner.shutdown();
    assert!(!session.is_enabled());
    assert_eq!(handle.recv_response(TIMEOUT), Some(Response::Text("1".into())));
}

#[test]
fn test_transport_disconnect_ends_runner() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let device = Device::new("gone", ScriptHost::default(), "return message;", KeyValueStore::new()).unwrap();
    let (transport, handle) = ChannelTransport::pair();
    let runner = DeviceRunner::spawn(Arc::new(device), transport).unwrap();
    drop(handle);

    let deadline = Instant::now() + TIMEOUT;
    while !runner.is_finished() {
        assert!(Instant::now() < deadline, "runner kept going");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_devices_from_config_share_state() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("writer.sol"), "setShared(\"last\", message);\nreturn \"stored\";").unwrap();
    fs::write(dir.path().join("reader.sol"), "return string(getShared(\"last\"));").unwrap();
    let config_path = dir.path().join("devsim.toml");
    fs::write(
        &config_path,
        r#"
[host]
max_steps = 5000

[[devices]]
name = "writer"
script = "writer.sol"

[[devices]]
name = "reader"
script = "reader.sol"
debug = true
breakpoints = [1]
"#,
    )
    .unwrap();

    let config = SimulatorConfig::load(&config_path).unwrap();
    let shared = KeyValueStore::new();
    let session = Arc::new(DebugSession::new());
    let devices: Vec<_> = config
        .devices
        .iter()
        .map(|entry| Device::from_config(&config, entry, shared.clone(), Some(session.clone())).unwrap())
        .collect();

    assert!(devices[0].session().is_none());
    assert!(devices[1].unit().is_instrumented());
    assert_eq!(session.breakpoints(), vec![1]);

    let message = devsim_engine::InboundMessage::text("abc");
    assert_eq!(devices[0].handle(&message), Response::Text("stored".into()));
    // The session was never started, so the breakpoint does not pause.
    assert_eq!(devices[1].handle(&message), Response::Text("abc".into()));
}
