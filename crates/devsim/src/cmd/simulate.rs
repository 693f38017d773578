// DevSim - Scripted Device Simulator
// Copyright (C) 2024 Zhuo Zhang and Wuqi Zhang
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Simulate command - drive configured devices with recorded input
//!
//! Every device runs on its own runner. Each non-empty input line is sent to
//! every device in configuration order and the responses are printed as
//! `[device] response`. Lines starting with `hex:` are sent as binary messages.
//! A response that arrives after the timeout is dropped rather than printed
//! against a later line.

use std::{fs, path::Path, sync::Arc, time::Duration};

use devsim_common::KeyValueStore;
use devsim_engine::{
    ChannelTransport, DebugSession, Device, DeviceRunner, InboundMessage, SimulatorConfig, TransportHandle,
};
use eyre::{Result, WrapErr};
use tracing::info;

use crate::utils::parse_hex;

/// Runs every configured device against the lines of `input`.
pub fn simulate(config_path: &Path, input: &Path, timeout_ms: u64) -> Result<()> {
    let config = SimulatorConfig::load(config_path)?;
    let input = fs::read_to_string(input)
        .wrap_err_with(|| format!("Failed to read input file: {}", input.display()))?;
    let timeout = Duration::from_millis(timeout_ms);

    // Devices marked `debug` are instrumented and keep their breakpoints, but
    // nothing starts this session, so they never pause here.
    let session = Arc::new(DebugSession::new());
    let shared = KeyValueStore::new();

    let mut runners: Vec<(DeviceRunner, TransportHandle)> = Vec::with_capacity(config.devices.len());
    for entry in &config.devices {
        let device = Device::from_config(&config, entry, shared.clone(), Some(session.clone()))?;
        let (transport, handle) = ChannelTransport::pair();
        runners.push((DeviceRunner::spawn(Arc::new(device), transport)?, handle));
    }
    info!(devices = runners.len(), "simulation started");

    for line in input.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let message = match line.strip_prefix("hex:") {
            Some(hex) => InboundMessage::binary(parse_hex(hex)?),
            None => InboundMessage::text(line),
        };
        for (runner, handle) in &runners {
            let seq = handle.send(message.clone())?;
            match handle.recv_reply(seq, timeout) {
                Some(response) => println!("[{}] {response}", runner.device().name()),
                None => println!("[{}] <no response>", runner.device().name()),
            }
        }
    }

    for (runner, _handle) in runners {
        runner.shutdown();
    }
    info!("simulation finished");
    Ok(())
}
