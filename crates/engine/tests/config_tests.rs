use std::fs;

use devsim_engine::{ConfigError, SimulatorConfig};
use tracing::info;

#[test]
fn test_load_round_trip() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devsim.toml");
    fs::write(
        &path,
        r#"
[host]
instrument_when_debugging = false
max_call_depth = 8

[[devices]]
name = "pump"
script = "scripts/pump.sol"
debug = true
breakpoints = [2, 5]
"#,
    )
    .unwrap();

    let config = SimulatorConfig::load(&path).unwrap();
    assert!(!config.host.instrument_when_debugging);
    assert_eq!(config.host.max_call_depth, 8);
    assert_eq!(config.host.max_steps, devsim_engine::DEFAULT_MAX_STEPS);
    assert_eq!(config.base_dir, dir.path());
    assert_eq!(config.script_path(&config.devices[0]), dir.path().join("scripts/pump.sol"));

    let reparsed = SimulatorConfig::from_toml(&config.to_toml().unwrap()).unwrap();
    assert_eq!(reparsed.devices, config.devices);
    assert_eq!(reparsed.host, config.host);
}

#[test]
fn test_load_rejects_invalid_files() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");

    fs::write(&path, "[[devices]]\nname = \"x\"\nscript = \"x.sol\"\nbreakpoints = [0]\n").unwrap();
    let err = SimulatorConfig::load(&path).unwrap_err();
    assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::InvalidBreakpoint("x".into())));

    fs::write(&path, "[[devices]]\nname = 3\n").unwrap();
    assert!(SimulatorConfig::load(&path).is_err());

    assert!(SimulatorConfig::load(dir.path().join("missing.toml")).is_err());
}

#[test]
fn test_missing_script_is_reported() {
    devsim_common::logging::ensure_test_logging(None);
    info!("Running test");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("devsim.toml");
    fs::write(&path, "[[devices]]\nname = \"ghost\"\nscript = \"ghost.sol\"\n").unwrap();

    let config = SimulatorConfig::load(&path).unwrap();
    let err = config.read_script(&config.devices[0]).unwrap_err();
    assert!(format!("{err:#}").contains("ghost"));
}
