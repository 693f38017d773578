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

//! Statement-level instrumentation of device scripts.
//!
//! [`instrument`] rewrites a script so that every statement first reports its
//! original line and the variables visible there through a
//! `__debug_notify(line, vars...);` call. Calls are inserted on the line they
//! report, so the instrumented text has exactly the lines of the original and
//! compiler positions stay valid for both.
//!
//! Instrumentation never fails. A script that does not parse is returned
//! unchanged, and will then report its own syntax errors when compiled.

mod analyzer;
mod modification;

pub use modification::{InsertContent, SourceModifications};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{syntax, template};

use analyzer::Analyzer;

/// How a notification point relates to the statement it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    /// Inserted right before a statement
    Statement,
    /// Inserted after the opening brace of a loop body, reporting the loop header
    LoopHeader,
    /// Inserted right before the closing brace of a block
    BlockClose,
}

/// A single notification call to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPoint {
    /// Original line reported by the call
    pub line: usize,
    /// Byte offset in the original script where the call is inserted
    pub offset: usize,
    /// What the point reports
    pub kind: PointKind,
    /// Variables visible at the point, in declaration order
    pub variables: Vec<String>,
}

/// A single-statement branch or loop body that gets wrapped in braces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyWrap {
    /// Offset of the statement start
    pub open: usize,
    /// Offset just past the statement end
    pub close: usize,
}

/// Where and what to insert into one script. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentationPlan {
    points: BTreeMap<usize, NotificationPoint>,
    wraps: Vec<BodyWrap>,
}

impl InstrumentationPlan {
    /// Returns the point reported on `line`.
    pub fn point(&self, line: usize) -> Option<&NotificationPoint> {
        self.points.get(&line)
    }

    /// Iterates over points in line order.
    pub fn points(&self) -> impl Iterator<Item = &NotificationPoint> {
        self.points.values()
    }

    /// Original lines that carry a notification, ascending.
    pub fn lines(&self) -> Vec<usize> {
        self.points.keys().copied().collect()
    }

    /// Single-statement bodies wrapped in braces.
    pub fn wraps(&self) -> &[BodyWrap] {
        &self.wraps
    }

    /// Collects the insertions this plan makes.
    pub fn modifications(&self) -> SourceModifications {
        let mut modifications = SourceModifications::new();
        for wrap in &self.wraps {
            modifications.add(wrap.open, InsertContent::OpenBrace);
            modifications.add(wrap.close, InsertContent::CloseBrace);
        }
        for point in self.points.values() {
            modifications.add(
                point.offset,
                InsertContent::Notify { line: point.line, variables: point.variables.clone() },
            );
        }
        modifications
    }

    /// Applies the plan to the script it was computed from.
    pub fn render(&self, source: &str) -> String {
        self.modifications().modify_source(source)
    }
}

/// Computes the instrumentation plan of a script, or `None` if it does not parse.
pub fn plan(source: &str) -> Option<InstrumentationPlan> {
    let wrapped = template::wrap(source);
    let unit = match syntax::parse_unit(&wrapped) {
        Ok(unit) => unit,
        Err(errors) => {
            debug!(errors = errors.len(), "script does not parse, skipping instrumentation");
            return None;
        }
    };

    let Some((_, statements, _)) = syntax::entry_point(&unit) else {
        debug!("entry point not found, skipping instrumentation");
        return None;
    };

    let plan = Analyzer::new(&wrapped, source, template::prefix().len()).analyze(statements);
    debug!(points = plan.points.len(), wraps = plan.wraps.len(), "instrumentation planned");
    Some(plan)
}

/// Returns an instrumented copy of a script, or the script itself if it does not
/// parse.
pub fn instrument(source: &str) -> String {
    match plan(source) {
        Some(plan) => plan.render(source),
        None => source.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOOP: &str = "int i = 0;\nwhile (i < 3) {\n    i = i + 1;\n}";

    #[test]
    fn test_loop_plan() {
        let plan = plan(LOOP).unwrap();
        assert_eq!(plan.lines(), vec![1, 2, 3, 4]);

        let header = plan.point(2).unwrap();
        assert_eq!(header.kind, PointKind::LoopHeader);
        assert_eq!(header.variables, vec!["message", "data", "i"]);

        // The declaration does not see itself.
        assert_eq!(plan.point(1).unwrap().variables, vec!["message", "data"]);
        assert_eq!(plan.point(4).unwrap().kind, PointKind::BlockClose);
    }

    #[test]
    fn test_loop_rendering() {
        let instrumented = instrument(LOOP);
        let lines: Vec<_> = instrumented.lines().collect();
        assert_eq!(lines[0], "__debug_notify(1, message, data); int i = 0;");
        assert_eq!(lines[1], "while (i < 3) {__debug_notify(2, message, data, i); ");
        assert_eq!(lines[2], "    __debug_notify(3, message, data, i); i = i + 1;");
        assert_eq!(lines[3], "__debug_notify(4, message, data, i); }");
    }

    #[test]
    fn test_nested_scope_is_dropped() {
        let source = "int a = 1;\nif (a > 0) {\n    int b = 2;\n    a = b;\n}\na = 3;";
        let plan = plan(source).unwrap();

        assert_eq!(plan.point(4).unwrap().variables, vec!["message", "data", "a", "b"]);
        assert_eq!(plan.point(5).unwrap().variables, vec!["message", "data", "a", "b"]);
        assert_eq!(plan.point(6).unwrap().variables, vec!["message", "data", "a"]);
    }

    #[test]
    fn test_single_statement_body_is_wrapped() {
        let source = "int a = 0;\nif (a == 0)\n    a = 1;\nelse\n    a = 2;";
        let instrumented = instrument(source);

        assert_eq!(instrumented.lines().count(), 5);
        assert!(instrumented.contains("{ __debug_notify(3, message, data, a); a = 1; }"));
        assert!(instrumented.contains("{ __debug_notify(5, message, data, a); a = 2; }"));
    }

    #[test]
    fn test_parse_failure_returns_source() {
        let broken = "int a = ;\nreturn a;";
        assert!(plan(broken).is_none());
        assert_eq!(instrument(broken), broken);
    }

    #[test]
    fn test_blank_and_comment_lines_untouched() {
        let source = "int a = 1;\n\n// note\na = 2;";
        let instrumented = instrument(source);
        let lines: Vec<_> = instrumented.lines().collect();
        assert_eq!(lines[1], "");
        assert_eq!(lines[2], "// note");
        assert!(lines[3].starts_with("__debug_notify(4"));
    }
}
