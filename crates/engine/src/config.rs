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

//! Simulator configuration loaded from TOML.
//!
//! ```toml
//! [host]
//! instrument_when_debugging = true
//! max_steps = 1000000
//! max_call_depth = 64
//!
//! [[devices]]
//! name = "thermometer"
//! script = "scripts/thermometer.sol"
//! debug = true
//! breakpoints = [3, 7]
//! ```

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default step budget of a single execution.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Default maximum call depth of a single execution.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Limits and switches of the script host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Instrument scripts of devices that have a debug session
    pub instrument_when_debugging: bool,
    /// Statements one execution may run before it is aborted
    pub max_steps: u64,
    /// Nested calls one execution may make before it is aborted
    pub max_call_depth: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            instrument_when_debugging: true,
            max_steps: DEFAULT_MAX_STEPS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// One simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device name
    pub name: String,
    /// Script path, relative to the configuration file
    pub script: PathBuf,
    /// Attach a debug session to the device
    #[serde(default)]
    pub debug: bool,
    /// Initial breakpoints, as original script lines
    #[serde(default)]
    pub breakpoints: Vec<usize>,
}

/// Complete simulator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Host limits
    pub host: HostConfig,
    /// Simulated devices
    pub devices: Vec<DeviceConfig>,
    /// Directory relative script paths are resolved against
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// A configuration that parsed but is not usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Two devices share a name
    #[error("duplicate device name `{0}`")]
    DuplicateDevice(String),
    /// A device has an empty name
    #[error("device names must not be empty")]
    EmptyName,
    /// A host limit is zero
    #[error("`host.{0}` must be greater than zero")]
    ZeroLimit(&'static str),
    /// A breakpoint on line 0
    #[error("device `{0}` has a breakpoint on line 0, lines start at 1")]
    InvalidBreakpoint(String),
}

impl SimulatorConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        config.validate()?;

        debug!(path = %path.display(), devices = config.devices.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses a configuration from TOML text without validating it.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse config as TOML")
    }

    /// Serializes the configuration to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "Failed to serialize config to TOML")
    }

    /// Checks the configuration for values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.max_steps == 0 {
            return Err(ConfigError::ZeroLimit("max_steps"));
        }
        if self.host.max_call_depth == 0 {
            return Err(ConfigError::ZeroLimit("max_call_depth"));
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(device.name.as_str()) {
                return Err(ConfigError::DuplicateDevice(device.name.clone()));
            }
            if device.breakpoints.contains(&0) {
                return Err(ConfigError::InvalidBreakpoint(device.name.clone()));
            }
        }
        Ok(())
    }

    /// Resolves a device's script path.
    pub fn script_path(&self, device: &DeviceConfig) -> PathBuf {
        if device.script.is_absolute() {
            device.script.clone()
        } else {
            self.base_dir.join(&device.script)
        }
    }

    /// Reads a device's script.
    pub fn read_script(&self, device: &DeviceConfig) -> Result<String> {
        let path = self.script_path(device);
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read script of `{}`: {}", device.name, path.display()))
    }
}
