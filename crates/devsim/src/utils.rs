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

//! Utility functions for the DevSim binary

use std::{fs, path::Path};

use devsim_common::{DebugEvent, Diagnostic};
use eyre::{eyre, Result, WrapErr};

/// Reads a script file.
pub fn read_script(path: &Path) -> Result<String> {
    fs::read_to_string(path).wrap_err_with(|| format!("Failed to read script: {}", path.display()))
}

/// Parses hex given on the command line. Whitespace and a `0x` prefix are
/// ignored.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let cleaned: String = text.split_whitespace().collect();
    let digits = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    hex::decode(digits).map_err(|err| eyre!("Invalid hex `{text}`: {err}"))
}

/// Prints diagnostics, one per line.
pub fn print_diagnostics(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        println!("{diagnostic}");
    }
}

/// Renders a debug event for the terminal.
pub fn format_event(event: &DebugEvent, json: bool) -> Result<String> {
    if json {
        return serde_json::to_string(event).wrap_err("Failed to serialize debug event");
    }
    Ok(match event {
        DebugEvent::LineReached { line, variables } => {
            let variables = variables
                .iter()
                .map(|var| format!("{} = {} ({})", var.name, var.value, var.type_name))
                .collect::<Vec<_>>()
                .join(", ");
            format!("line {line}: {variables}")
        }
        DebugEvent::ModeChanged { mode } => format!("-- {mode}"),
    })
}
