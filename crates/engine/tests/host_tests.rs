use devsim_common::{KeyValueStore, Response, Severity};
use devsim_engine::{instrument, HostConfig, RuntimeErrorKind, ScriptHost};
use tracing::info;

#[test]
fn test_echo_round_trip() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let unit = ScriptHost::default().compile("return \"ECHO: \" + message;").unwrap();
    assert_eq!(unit.execute("hi", None, &KeyValueStore::new()), Response::Text("ECHO: hi".into()));
}

#[test]
fn test_syntax_error_reports_original_line() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let source = "int a = 1;\nint b = 2;\nint c = a +* b;\nreturn c;";
    for text in [source.to_string(), instrument(source)] {
        let failure = ScriptHost::default().compile(&text).unwrap_err();
        let first = failure.errors().next().unwrap();
        assert_eq!(first.line, 3, "{failure}");
        assert_eq!(first.severity, Severity::Error);
    }
}

#[test]
fn test_unterminated_block_is_clamped_to_last_line() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let failure = ScriptHost::default().compile("int a = 1;\nif (a > 0) {\n    a = 2;").unwrap_err();
    assert!(failure.diagnostics.iter().all(|diag| diag.line <= 3), "{failure}");
}

#[test]
fn test_semantic_errors_keep_lines_after_instrumentation() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let source = "int a = 1;\nwhile (a < 3) {\n    a = a + missing;\n}";
    let instrumented = instrument(source);
    assert_ne!(instrumented, source);

    let failure = ScriptHost::default().compile(&instrumented).unwrap_err();
    assert_eq!(failure.diagnostics.len(), 1);
    assert_eq!(failure.diagnostics[0].line, 3);
}

#[test]
fn test_runtime_errors_yield_no_response() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let unit = ScriptHost::default()
        .compile("require(message != \"bad\", \"rejected\");\nbytes b = data;\nreturn toString(b[5]);")
        .unwrap();
    let shared = KeyValueStore::new();

    let err = unit.try_execute("bad", None, &shared).unwrap_err();
    assert_eq!(err.line, 1);
    assert!(matches!(err.kind, RuntimeErrorKind::Require(_)));

    let err = unit.try_execute("ok", Some(&[1u8, 2][..]), &shared).unwrap_err();
    assert_eq!(err.line, 3);
    assert_eq!(err.kind, RuntimeErrorKind::IndexOutOfBounds { index: 5, len: 2 });

    // The unit keeps serving after failures.
    assert_eq!(unit.execute("bad", None, &shared), Response::None);
    assert_eq!(unit.execute("ok", Some(&[0u8, 0, 0, 0, 0, 9][..]), &shared), Response::Text("9".into()));
}

#[test]
fn test_overflow_is_checked() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let unit = ScriptHost::default().compile("int big = 9223372036854775807;\nreturn big + 1;").unwrap();
    let err = unit.try_execute("", None, &KeyValueStore::new()).unwrap_err();
    assert_eq!(err.line, 2);
    assert!(matches!(err.kind, RuntimeErrorKind::Overflow(_)));
}

#[test]
fn test_recursion_limit() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let host = ScriptHost::new(HostConfig { max_call_depth: 4, ..Default::default() });
    let unit = host.compile("setValue(\"k\", 1);\nreturn toString(getValue(\"k\"));").unwrap();
    // Helpers add one level on top of the entry point.
    assert_eq!(unit.execute("", None, &KeyValueStore::new()), Response::Text("1".into()));

    let host = ScriptHost::new(HostConfig { max_call_depth: 1, ..Default::default() });
    let unit = host.compile("return toHex(data);").unwrap();
    let err = unit.try_execute("", None, &KeyValueStore::new()).unwrap_err();
    assert_eq!(err.kind, RuntimeErrorKind::CallDepth(1));
}

#[test]
fn test_store_and_first_call() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let source = r#"if (isFirstCall()) {
    setValue("greeting", "hello " + message);
    return "init";
}
return string(getValue("greeting"));"#;
    let host = ScriptHost::default();
    let unit = host.compile(source).unwrap();
    let shared = KeyValueStore::new();

    assert_eq!(unit.execute("a", None, &shared), Response::Text("init".into()));
    assert_eq!(unit.execute("b", None, &shared), Response::Text("hello a".into()));

    // A new unit starts with a fresh store and first-call flag.
    let fresh = host.compile(source).unwrap();
    assert!(fresh.store().is_empty());
    assert_eq!(fresh.execute("c", None, &shared), Response::Text("init".into()));
}

#[test]
fn test_hex_helpers() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let unit = ScriptHost::default()
        .compile("bytes raw = fromHex(message);\nraw[0] = raw[0] + 1;\nreturn raw;")
        .unwrap();
    let response = unit.execute("0x01 FF", None, &KeyValueStore::new());
    assert_eq!(response, Response::Bytes(vec![0x02, 0xff]));
    assert_eq!(response.to_string(), "02FF");
}

#[test]
fn test_bytes_render_like_to_hex() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let unit = ScriptHost::default()
        .compile("string a = \"r=\" + data;\nstring b = \"r=\" + toHex(data);\nif (a == b) return a;\nreturn \"mismatch\";")
        .unwrap();
    let response = unit.execute("x", Some(&[0x0a, 0xbc][..]), &KeyValueStore::new());
    assert_eq!(response, Response::Text("r=0ABC".into()));
}
