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

//! Compilation of scripts into invocable units.
//!
//! [`ScriptHost::compile`] wraps a script (plain or instrumented) into the fixed
//! template, parses it, maps parser diagnostics back to original lines, lowers
//! the tree into [`ir`] and reports semantic diagnostics. The result is a
//! [`CompiledUnit`] or a [`CompileFailure`] carrying every diagnostic.

mod diagnostics;
pub mod ir;
mod lower;

use std::{borrow::Cow, sync::Arc};

use devsim_common::Diagnostic;
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    instrument, syntax,
    template::{self, LineMap},
    CompiledUnit, DebugSession, HostConfig,
};

/// Compilation failed. Diagnostics are sorted by original line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("compilation failed:\n{}", .diagnostics.iter().join("\n"))]
pub struct CompileFailure {
    /// Every diagnostic reported, warnings included
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileFailure {
    /// Returns only the error diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|diag| diag.is_error())
    }
}

/// Compiles scripts and hands out units bound to the host's limits and debug
/// session.
#[derive(Debug, Clone, Default)]
pub struct ScriptHost {
    config: HostConfig,
    session: Option<Arc<DebugSession>>,
}

impl ScriptHost {
    /// Creates a host with the given limits.
    pub fn new(config: HostConfig) -> Self {
        Self { config, session: None }
    }

    /// Attaches a debug session every compiled unit reports to.
    pub fn with_session(mut self, session: Arc<DebugSession>) -> Self {
        self.session = Some(session);
        self
    }

    /// Returns the host limits.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Returns the attached debug session.
    pub fn session(&self) -> Option<&Arc<DebugSession>> {
        self.session.as_ref()
    }

    /// Returns the text to compile for `source`: instrumented when a debug
    /// session is attached and instrumentation is enabled.
    pub fn prepare<'a>(&self, source: &'a str) -> Cow<'a, str> {
        if self.session.is_some() && self.config.instrument_when_debugging {
            Cow::Owned(instrument(source))
        } else {
            Cow::Borrowed(source)
        }
    }

    /// Prepares and compiles a script for the device `name`.
    pub fn load(&self, name: &str, source: &str) -> Result<CompiledUnit, CompileFailure> {
        self.compile_named(name, &self.prepare(source))
    }

    /// Compiles plain or instrumented script text.
    pub fn compile(&self, source: &str) -> Result<CompiledUnit, CompileFailure> {
        self.compile_named("script", source)
    }

    /// Compiles script text, naming the unit for logs.
    pub fn compile_named(&self, name: &str, source: &str) -> Result<CompiledUnit, CompileFailure> {
        let wrapped = template::wrap(source);
        let map = LineMap::new(&wrapped, source);

        let unit = syntax::parse_unit(&wrapped).map_err(|errors| {
            let diagnostics = diagnostics::map_parser_diagnostics(&errors, &map);
            debug!(unit = name, errors = diagnostics.len(), "script failed to parse");
            CompileFailure { diagnostics }
        })?;

        let lowered = lower::lower(&unit, &map);
        if lowered.diagnostics.iter().any(Diagnostic::is_error) {
            debug!(unit = name, diagnostics = lowered.diagnostics.len(), "script failed semantic checks");
            return Err(CompileFailure { diagnostics: lowered.diagnostics });
        }

        info!(
            unit = name,
            instrumented = lowered.instrumented,
            warnings = lowered.diagnostics.len(),
            "script compiled"
        );
        Ok(CompiledUnit::new(
            name,
            lowered.program,
            lowered.diagnostics,
            lowered.instrumented,
            self.config.clone(),
            self.session.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_err(source: &str) -> Vec<Diagnostic> {
        ScriptHost::default().compile(source).unwrap_err().diagnostics
    }

    #[test]
    fn test_compiles_echo() {
        let unit = ScriptHost::default().compile("return \"ECHO: \" + message;").unwrap();
        assert!(!unit.is_instrumented());
        assert!(unit.warnings().is_empty());
    }

    #[test]
    fn test_undeclared_identifier() {
        let diagnostics = compile_err("int a = 1;\nreturn b;");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].line, 2);
        assert!(diagnostics[0].message.contains("undeclared identifier `b`"));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        let diagnostics = compile_err("frobnicate(1);\nreturn toUpper(message, 2);");
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics[0].message.contains("unknown function `frobnicate`"));
        assert_eq!(diagnostics[1].line, 2);
        assert!(diagnostics[1].message.contains("takes 1 argument(s), got 2"));
    }

    #[test]
    fn test_break_outside_loop() {
        let diagnostics = compile_err("int a = 0;\nbreak;");
        assert_eq!(diagnostics[0].line, 2);
        assert!(diagnostics[0].message.contains("`break` outside of a loop"));
    }

    #[test]
    fn test_reserved_host_natives() {
        let diagnostics = compile_err("__host_setValue(\"k\", 1);");
        assert!(diagnostics[0].message.contains("reserved for the host"));
    }

    #[test]
    fn test_scoped_variable_not_visible_outside() {
        let diagnostics = compile_err("if (true) {\n    int inner = 1;\n}\nreturn inner;");
        assert_eq!(diagnostics[0].line, 4);
    }

    #[test]
    fn test_shadowing_is_a_warning() {
        let unit = ScriptHost::default().compile("int a = 1;\n{\n    int a = 2;\n}").unwrap();
        assert_eq!(unit.warnings().len(), 1);
        assert_eq!(unit.warnings()[0].line, 3);
    }

    #[test]
    fn test_instrumented_text_compiles() {
        let source = "int i = 0;\nwhile (i < 3) {\n    i = i + 1;\n}\nreturn i;";
        let unit = ScriptHost::default().compile(&instrument(source)).unwrap();
        assert!(unit.is_instrumented());
    }

    #[test]
    fn test_malformed_notification() {
        let diagnostics = compile_err("__debug_notify(x);");
        assert!(diagnostics[0].message.contains("malformed `__debug_notify` call"));
    }

    #[test]
    fn test_failure_display() {
        let failure = ScriptHost::default().compile("int a = ;").unwrap_err();
        assert!(failure.to_string().starts_with("compilation failed:\nline 1: error:"));
        assert_eq!(failure.errors().count(), failure.diagnostics.len());
    }
}
