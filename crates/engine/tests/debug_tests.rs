use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use devsim_common::{DebugEvent, ExecutionMode, KeyValueStore, Response, Value};
use devsim_engine::{CompiledUnit, DebugSession, ScriptHost};
use tokio::sync::mpsc::{error::TryRecvError, UnboundedReceiver};
use tracing::info;

const COUNTER: &str = "int i = 0;\nwhile (i < 3) {\ni = i + 1;\n}";

fn debug_unit(source: &str) -> (Arc<DebugSession>, CompiledUnit) {
    let session = Arc::new(DebugSession::new());
    let unit = ScriptHost::default().with_session(session.clone()).load("test", source).unwrap();
    assert!(unit.is_instrumented());
    (session, unit)
}

fn spawn(unit: CompiledUnit) -> JoinHandle<Response> {
    thread::spawn(move || unit.execute("", None, &KeyValueStore::new()))
}

/// Feeds every event to `on_event` until the worker finishes.
fn drive(
    events: &mut UnboundedReceiver<DebugEvent>,
    worker: &JoinHandle<Response>,
    mut on_event: impl FnMut(&DebugEvent),
) -> Vec<DebugEvent> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = Vec::new();
    loop {
        match events.try_recv() {
            Ok(event) => {
                on_event(&event);
                seen.push(event);
            }
            Err(TryRecvError::Empty) if worker.is_finished() => break,
            Err(TryRecvError::Empty) => {
                assert!(Instant::now() < deadline, "worker did not finish");
                thread::sleep(Duration::from_millis(1));
            }
            Err(TryRecvError::Disconnected) => break,
        }
    }
    seen
}

fn reached_lines(events: &[DebugEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| match event {
            DebugEvent::LineReached { line, .. } => Some(*line),
            _ => None,
        })
        .collect()
}

#[test]
fn test_breakpoint_in_loop_pauses_every_iteration() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let (session, unit) = debug_unit(COUNTER);
    session.add_breakpoint(2);
    session.start_debugging(false);
    let mut events = session.subscribe();

    let worker = spawn(unit);
    let mut pauses = 0;
    let seen = drive(&mut events, &worker, |event| {
        if let DebugEvent::ModeChanged { mode: ExecutionMode::Paused } = event {
            pauses += 1;
            session.continue_execution();
        }
    });
    assert_eq!(worker.join().unwrap(), Response::None);
    assert_eq!(pauses, 3);

    let last = seen
        .iter()
        .rev()
        .find(|event| matches!(event, DebugEvent::LineReached { .. }))
        .and_then(|event| event.variable("i"))
        .unwrap();
    assert_eq!(last.value, Value::Int(3));

    let location = session.last_location().unwrap();
    assert_eq!(location.line, 4);
}

#[test]
fn test_stepping_visits_every_line_once() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let (session, unit) = debug_unit("int a = 1;\nint b = a + 1;\nstring s = toString(b);\nreturn s;");
    session.start_debugging(true);
    let mut events = session.subscribe();

    let worker = spawn(unit);
    let seen = drive(&mut events, &worker, |event| {
        if let DebugEvent::ModeChanged { mode: ExecutionMode::Paused } = event {
            session.step();
        }
    });
    assert_eq!(worker.join().unwrap(), Response::Text("2".into()));
    assert_eq!(reached_lines(&seen), vec![1, 2, 3, 4]);
}

#[test]
fn test_snapshots_are_taken_by_value() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let (session, unit) = debug_unit("int a = 1;\na = 5;\nreturn a;");
    session.start_debugging(false);
    let mut events = session.subscribe();

    let worker = spawn(unit);
    let seen = drive(&mut events, &worker, |_| {});
    worker.join().unwrap();

    let values: Vec<_> = seen
        .iter()
        .filter(|event| matches!(event, DebugEvent::LineReached { .. }))
        .map(|event| event.variable("a").map(|var| var.value.clone()))
        .collect();
    assert_eq!(values, vec![None, Some(Value::Int(1)), Some(Value::Int(5))]);
}

#[test]
fn test_disabled_session_never_blocks() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let (session, unit) = debug_unit(COUNTER);
    session.add_breakpoint(2);
    session.add_breakpoint(3);
    let mut events = session.subscribe();

    let worker = spawn(unit);
    assert_eq!(worker.join().unwrap(), Response::None);
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert!(session.last_location().is_none());
}

#[test]
fn test_stop_releases_paused_worker() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let (session, unit) = debug_unit(COUNTER);
    session.start_debugging(true);
    let worker = spawn(unit);

    let deadline = Instant::now() + Duration::from_secs(10);
    while !session.is_paused() {
        assert!(Instant::now() < deadline, "worker never paused");
        thread::sleep(Duration::from_millis(1));
    }
    session.stop();
    assert_eq!(worker.join().unwrap(), Response::None);
    assert_eq!(session.mode(), ExecutionMode::Running);
}

#[test]
fn test_events_serialize_for_observers() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let (session, unit) = debug_unit("return message;");
    session.start_debugging(false);
    let mut events = session.subscribe();
    unit.execute("hi", None, &KeyValueStore::new());

    let event = events.try_recv().unwrap();
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["event"], "line_reached");
    assert_eq!(json["line"], 1);
    assert_eq!(json["variables"][0]["name"], "message");
}

#[test]
fn test_units_on_one_session_share_the_pause() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let session = Arc::new(DebugSession::new());
    let host = ScriptHost::default().with_session(session.clone());
    let sensor = host.load("sensor", "int a = 1;\nint b = a + 1;\nreturn b;").unwrap();
    let status = host.load("status", "return 7;").unwrap();
    session.add_breakpoint(2);
    session.start_debugging(false);

    let first = spawn(sensor);
    let deadline = Instant::now() + Duration::from_secs(10);
    while !session.is_paused() {
        assert!(Instant::now() < deadline, "first worker never paused");
        thread::sleep(Duration::from_millis(1));
    }

    // The second unit has no breakpoint but still waits at the shared gate.
    let second = spawn(status);
    while session.last_location().map(|location| location.line) != Some(1) {
        assert!(Instant::now() < deadline, "second worker never reached a line");
        thread::sleep(Duration::from_millis(1));
    }
    thread::sleep(Duration::from_millis(100));
    assert!(!first.is_finished());
    assert!(!second.is_finished());

    session.continue_execution();
    assert_eq!(first.join().unwrap(), Response::Text("2".into()));
    assert_eq!(second.join().unwrap(), Response::Text("7".into()));
}

#[test]
fn test_breakpoints_change_while_paused() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let (session, unit) = debug_unit(COUNTER);
    session.add_breakpoint(2);
    session.start_debugging(false);
    let mut events = session.subscribe();

    let worker = spawn(unit);
    let mut current = 0;
    let mut paused_at = Vec::new();
    drive(&mut events, &worker, |event| match event {
        DebugEvent::LineReached { line, .. } => current = *line,
        DebugEvent::ModeChanged { mode: ExecutionMode::Paused } => {
            paused_at.push(current);
            if current == 2 {
                assert!(!session.toggle_breakpoint(2));
                assert!(session.toggle_breakpoint(3));
            } else {
                session.clear_breakpoints();
            }
            session.continue_execution();
        }
        _ => {}
    });
    assert_eq!(worker.join().unwrap(), Response::None);
    assert_eq!(paused_at, vec![2, 3]);
}
