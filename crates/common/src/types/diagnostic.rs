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

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Severity of a compiler diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The script cannot be compiled
    #[display("error")]
    Error,
    /// The script compiles but something looks wrong
    #[display("warning")]
    Warning,
}

/// A compiler message attached to a line of the user's original script.
///
/// `line` is 1-based and refers to the text the user wrote, not the wrapped
/// translation unit the compiler actually saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Line in the original script (1-based)
    pub line: usize,
    /// Human readable message
    pub message: String,
    /// Severity of the message
    pub severity: Severity,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into(), severity: Severity::Error }
    }

    /// Creates a warning diagnostic.
    pub fn warning(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into(), severity: Severity::Warning }
    }

    /// Returns true for error diagnostics.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}: {}", self.line, self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diag = Diagnostic::error(3, "unexpected token");
        assert_eq!(diag.to_string(), "line 3: error: unexpected token");
        assert!(diag.is_error());
        assert!(!Diagnostic::warning(1, "unused").is_error());
    }
}
