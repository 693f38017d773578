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

//! Check command - compile a script and report diagnostics

use std::path::Path;

use devsim_engine::ScriptHost;
use eyre::{eyre, Result};

use crate::utils::{print_diagnostics, read_script};

/// Compiles `path`, printing every diagnostic. Fails if there are errors.
pub fn check(path: &Path, cli: &crate::Cli) -> Result<()> {
    let source = read_script(path)?;
    match ScriptHost::new(cli.host_config()).compile_named(&path.display().to_string(), &source) {
        Ok(unit) => {
            print_diagnostics(unit.warnings());
            println!("ok: {} ({} warning(s))", path.display(), unit.warnings().len());
            Ok(())
        }
        Err(failure) => {
            print_diagnostics(&failure.diagnostics);
            Err(eyre!("{} error(s) in {}", failure.errors().count(), path.display()))
        }
    }
}
