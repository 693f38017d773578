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

use thiserror::Error;

/// A script failed while executing. `line` is the original script line of the
/// statement that failed, or 0 if no statement of the script had run yet.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}: {kind}")]
pub struct RuntimeError {
    /// Original script line
    pub line: usize,
    /// What went wrong
    pub kind: RuntimeErrorKind,
}

/// Causes of a runtime failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeErrorKind {
    /// `revert(...)` was executed
    #[error("reverted: {0}")]
    Revert(String),
    /// A `require` condition was false
    #[error("requirement failed: {0}")]
    Require(String),
    /// Checked integer arithmetic overflowed
    #[error("integer overflow in `{0}`")]
    Overflow(String),
    /// Division or modulo by zero
    #[error("division by zero")]
    DivisionByZero,
    /// Index outside of a value
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: i64,
        /// Length of the indexed value
        len: usize,
    },
    /// An operation received a value of the wrong type
    #[error("type error: {0}")]
    Type(String),
    /// A builtin or host native rejected its argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The step budget ran out
    #[error("step budget of {0} exceeded")]
    StepLimit(u64),
    /// Calls nested too deeply
    #[error("call depth limit of {0} exceeded")]
    CallDepth(usize),
    /// A variable was read before it was declared
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    /// A call to a function the program does not define
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    /// The interpreter panicked
    #[error("script panicked: {0}")]
    Panic(String),
}

impl RuntimeErrorKind {
    /// Shorthand for a [`RuntimeErrorKind::Type`] error.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    /// Attaches the failing line.
    pub fn at(self, line: usize) -> RuntimeError {
        RuntimeError { line, kind: self }
    }
}
