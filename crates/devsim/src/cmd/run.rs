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

//! Run command - execute a script against a message

use std::path::Path;

use devsim_common::KeyValueStore;
use devsim_engine::ScriptHost;
use eyre::Result;
use tracing::info;

use crate::utils::{parse_hex, print_diagnostics, read_script};

/// Executes the script `repeat` times, printing each response.
pub fn run(path: &Path, message: &str, hex: Option<&str>, repeat: usize, cli: &crate::Cli) -> Result<()> {
    let source = read_script(path)?;
    let bytes = hex.map(parse_hex).transpose()?;

    let unit = ScriptHost::new(cli.host_config())
        .compile_named(&path.display().to_string(), &source)
        .inspect_err(|failure| print_diagnostics(&failure.diagnostics))?;

    let shared = KeyValueStore::new();
    for round in 1..=repeat {
        let response = unit.execute(message, bytes.as_deref(), &shared);
        info!(round, "executed");
        println!("{response}");
    }
    Ok(())
}
