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

//! The fixed execution template every script is compiled inside.
//!
//! A script is only the body of the entry point. Before parsing, the body is
//! placed after a preamble of helper functions and the entry point signature:
//!
//! ```text
//! <preamble, one helper per line>
//! function respond(string memory message, bytes memory data) returns (bytes memory) {
//! <script body>
//! }
//! ```
//!
//! Both the instrumenter and the compiler rely on the template having a fixed
//! number of lines before the body, so a line in the wrapped text maps to the
//! original script by subtracting [`TEMPLATE_LINE_OFFSET`].

use once_cell::sync::Lazy;

/// Name of the function the host invokes for every inbound message.
pub const ENTRY_POINT: &str = "respond";

/// Name of the parameter carrying the inbound text.
pub const MESSAGE_PARAM: &str = "message";

/// Name of the parameter carrying the inbound bytes.
pub const DATA_PARAM: &str = "data";

/// Name of the call inserted by the instrumenter.
pub const NOTIFY_FUNCTION: &str = "__debug_notify";

/// Prefix reserved for host natives. User code may not call these directly.
pub const HOST_PREFIX: &str = "__host_";

/// Helper functions available to every script. One helper per line.
const PREAMBLE: &[&str] = &[
    "function toHex(bytes memory value) returns (string memory) { return __host_toHex(value); }",
    "function fromHex(string memory value) returns (bytes memory) { return __host_fromHex(value); }",
    "function isFirstCall() returns (bool) { return __host_isFirstCall(); }",
    "function getValue(string memory key) returns (bytes memory) { return __host_getValue(key); }",
    "function setValue(string memory key, bytes memory value) { __host_setValue(key, value); }",
    "function getShared(string memory key) returns (bytes memory) { return __host_getShared(key); }",
    "function setShared(string memory key, bytes memory value) { __host_setShared(key, value); }",
    "function log(string memory text) { __host_log(text); }",
];

static PREFIX: Lazy<String> = Lazy::new(|| {
    let mut prefix = PREAMBLE.join("\n");
    prefix.push('\n');
    prefix.push_str(&format!(
        "function {ENTRY_POINT}(string memory {MESSAGE_PARAM}, bytes memory {DATA_PARAM}) returns (bytes memory) {{\n"
    ));
    prefix
});

/// Number of template lines preceding the first line of the script body.
pub const TEMPLATE_LINE_OFFSET: usize = PREAMBLE.len() + 1;

/// Returns the template text that precedes the script body.
pub fn prefix() -> &'static str {
    &PREFIX
}

/// Wraps a script body into a complete translation unit.
pub fn wrap(body: &str) -> String {
    let mut wrapped = String::with_capacity(PREFIX.len() + body.len() + 3);
    wrapped.push_str(&PREFIX);
    wrapped.push_str(body);
    wrapped.push_str("\n}\n");
    wrapped
}

/// Names of the helper functions defined by the preamble.
pub fn helper_names() -> impl Iterator<Item = &'static str> {
    PREAMBLE.iter().filter_map(|line| {
        let rest = line.strip_prefix("function ")?;
        rest.split('(').next()
    })
}

/// Maps byte offsets of a wrapped unit to lines of the original script.
#[derive(Debug, Clone)]
pub struct LineMap {
    /// Byte offset of every line start in the wrapped text
    line_starts: Vec<usize>,
    /// Number of lines in the script body
    body_lines: usize,
}

/// Where a wrapped-text position falls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Inside the preamble or entry point signature, with the raw wrapped line
    Template(usize),
    /// Inside the script body, with the original line
    Body(usize),
}

impl LineMap {
    /// Builds the map for `wrapped`, whose body is `body`.
    pub fn new(wrapped: &str, body: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(wrapped.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        Self { line_starts, body_lines: body.lines().count().max(1) }
    }

    /// Returns the 1-based line of a byte offset in the wrapped text.
    pub fn wrapped_line(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|start| *start <= offset).max(1)
    }

    /// Classifies a byte offset of the wrapped text. Positions after the body are
    /// clamped to its last line.
    pub fn position(&self, offset: usize) -> Position {
        let line = self.wrapped_line(offset);
        if line <= TEMPLATE_LINE_OFFSET {
            Position::Template(line)
        } else {
            Position::Body((line - TEMPLATE_LINE_OFFSET).min(self.body_lines))
        }
    }

    /// Returns the original line of an offset, or 0 for template positions.
    pub fn body_line(&self, offset: usize) -> usize {
        match self.position(offset) {
            Position::Body(line) => line,
            Position::Template(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_matches_prefix() {
        assert_eq!(prefix().lines().count(), TEMPLATE_LINE_OFFSET);
        assert!(prefix().ends_with('\n'));
    }

    #[test]
    fn test_helper_names() {
        let names: Vec<_> = helper_names().collect();
        assert_eq!(
            names,
            ["toHex", "fromHex", "isFirstCall", "getValue", "setValue", "getShared", "setShared", "log"]
        );
    }

    #[test]
    fn test_line_map() {
        let body = "int a = 1;\nint b = 2;\nreturn a + b;";
        let wrapped = wrap(body);
        let map = LineMap::new(&wrapped, body);

        let second = wrapped.find("int b").unwrap();
        assert_eq!(map.position(second), Position::Body(2));
        assert_eq!(map.position(0), Position::Template(1));

        // The closing brace of the entry point clamps to the last body line.
        let closing = wrapped.rfind('}').unwrap();
        assert_eq!(map.position(closing), Position::Body(3));
        assert_eq!(map.body_line(5), 0);
    }
}
