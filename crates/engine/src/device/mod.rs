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

//! Simulated devices.
//!
//! A [`Device`] owns the compiled script answering its messages. A
//! [`DeviceRunner`] drives a device from a [`Transport`] on its own thread.

mod runner;
mod transport;

pub use runner::*;
pub use transport::*;

use std::sync::Arc;

use devsim_common::{KeyValueStore, Response};
use eyre::{Result, WrapErr};
use parking_lot::RwLock;
use tracing::info;

use crate::{CompileFailure, CompiledUnit, DebugSession, DeviceConfig, ScriptHost, SimulatorConfig};

/// A named device answering messages with its current script.
#[derive(Debug)]
pub struct Device {
    name: String,
    host: ScriptHost,
    unit: RwLock<Arc<CompiledUnit>>,
    shared: KeyValueStore,
}

impl Device {
    /// Compiles `source` and creates a device around it.
    pub fn new(
        name: impl Into<String>,
        host: ScriptHost,
        source: &str,
        shared: KeyValueStore,
    ) -> Result<Self, CompileFailure> {
        let name = name.into();
        let unit = host.load(&name, source)?;
        Ok(Self { name, host, unit: RwLock::new(Arc::new(unit)), shared })
    }

    /// Creates a device from its configuration entry.
    ///
    /// When the entry enables debugging, the device reports to `session` and the
    /// configured breakpoints are added to it.
    pub fn from_config(
        config: &SimulatorConfig,
        device: &DeviceConfig,
        shared: KeyValueStore,
        session: Option<Arc<DebugSession>>,
    ) -> Result<Self> {
        let source = config.read_script(device)?;
        let mut host = ScriptHost::new(config.host.clone());
        if let Some(session) = session.filter(|_| device.debug) {
            for line in &device.breakpoints {
                session.add_breakpoint(*line);
            }
            host = host.with_session(session);
        }
        Self::new(device.name.clone(), host, &source, shared)
            .wrap_err_with(|| format!("failed to compile script for device `{}`", device.name))
    }

    /// The device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unit currently answering messages.
    pub fn unit(&self) -> Arc<CompiledUnit> {
        self.unit.read().clone()
    }

    /// State shared with other devices.
    pub fn shared(&self) -> &KeyValueStore {
        &self.shared
    }

    /// The debug session the device's scripts report to, if any.
    pub fn session(&self) -> Option<&Arc<DebugSession>> {
        self.host.session()
    }

    /// Compiles `source` and swaps it in.
    ///
    /// Compilation happens outside the lock. Calls already running finish on the
    /// old unit; on failure the old unit stays in place.
    pub fn recompile(&self, source: &str) -> Result<(), CompileFailure> {
        let unit = Arc::new(self.host.load(&self.name, source)?);
        *self.unit.write() = unit;
        info!(device = %self.name, "script recompiled");
        Ok(())
    }

    /// Answers one inbound message.
    pub fn handle(&self, message: &InboundMessage) -> Response {
        let unit = self.unit();
        unit.execute(&message.text, message.bytes.as_deref(), &self.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(source: &str) -> Device {
        Device::new("dev", ScriptHost::default(), source, KeyValueStore::new()).unwrap()
    }

    #[test]
    fn test_handle() {
        let device = device("return toUpper(message);");
        assert_eq!(device.handle(&InboundMessage::text("abc")), Response::Text("ABC".into()));
    }

    #[test]
    fn test_recompile_swaps_unit() {
        let device = device("return \"v1\";");
        let old = device.unit();
        device.recompile("return \"v2\";").unwrap();
        assert!(!Arc::ptr_eq(&old, &device.unit()));
        assert_eq!(device.handle(&InboundMessage::text("")), Response::Text("v2".into()));
        // In-flight holders of the old unit still run it.
        assert_eq!(old.execute("", None, device.shared()), Response::Text("v1".into()));
    }

    #[test]
    fn test_failed_recompile_keeps_unit() {
        let device = device("return \"v1\";");
        let failure = device.recompile("return missing;").unwrap_err();
        assert_eq!(failure.diagnostics[0].line, 1);
        assert_eq!(device.handle(&InboundMessage::text("")), Response::Text("v1".into()));
    }
}
