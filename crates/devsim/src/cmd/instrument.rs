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

//! Instrument command - print what the debugger will compile

use std::path::Path;

use eyre::{Result, WrapErr};
use tracing::warn;

use crate::utils::read_script;

/// Prints the instrumented script, or its plan as JSON.
pub fn instrument(path: &Path, as_plan: bool) -> Result<()> {
    let source = read_script(path)?;
    if !as_plan {
        print!("{}", devsim_engine::instrument(&source));
        return Ok(());
    }

    match devsim_engine::plan(&source) {
        Some(plan) => {
            let json = serde_json::to_string_pretty(&plan).wrap_err("Failed to serialize plan")?;
            println!("{json}");
        }
        None => {
            warn!(path = %path.display(), "script does not parse, nothing to instrument");
            println!("null");
        }
    }
    Ok(())
}
