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

use serde::{Deserialize, Serialize};

use crate::Value;

/// Execution mode of a debug session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Scripts run freely and only stop at breakpoints
    #[default]
    #[display("running")]
    Running,
    /// A worker is parked at a notification point
    #[display("paused")]
    Paused,
    /// The next notification point pauses
    #[display("stepping")]
    Stepping,
}

/// A by-value copy of a script variable at a notification point.
///
/// The snapshot owns its value, so the script may keep mutating the variable
/// while an observer reads the snapshot on another thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableSnapshot {
    /// Variable name as written in the script
    pub name: String,
    /// Value at the moment of the notification
    pub value: Value,
    /// Runtime type name of the value
    pub type_name: String,
}

impl VariableSnapshot {
    /// Captures a copy of `value` under `name`.
    pub fn capture(name: &str, value: &Value) -> Self {
        Self { name: name.to_string(), value: value.clone(), type_name: value.type_name().to_string() }
    }
}

/// Notification pushed by a debug session to its observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DebugEvent {
    /// Instrumented code reached a line
    LineReached {
        /// Line in the original script
        line: usize,
        /// Variables visible at that line
        variables: Vec<VariableSnapshot>,
    },
    /// The session changed its execution mode
    ModeChanged {
        /// The new mode
        mode: ExecutionMode,
    },
}

impl DebugEvent {
    /// Returns the variable snapshot named `name` if this is a line event.
    pub fn variable(&self, name: &str) -> Option<&VariableSnapshot> {
        match self {
            Self::LineReached { variables, .. } => variables.iter().find(|v| v.name == name),
            Self::ModeChanged { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut value = Value::Int(1);
        let snapshot = VariableSnapshot::capture("i", &value);
        value = Value::Int(2);

        assert_eq!(snapshot.value, Value::Int(1));
        assert_eq!(snapshot.type_name, "int");
        assert_eq!(value, Value::Int(2));
    }

    #[test]
    fn test_event_serialization() {
        let event = DebugEvent::ModeChanged { mode: ExecutionMode::Paused };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"mode_changed","mode":"paused"}"#);

        let line = DebugEvent::LineReached {
            line: 2,
            variables: vec![VariableSnapshot::capture("i", &Value::Int(0))],
        };
        assert_eq!(line.variable("i").map(|v| v.value.clone()), Some(Value::Int(0)));
        assert!(line.variable("j").is_none());
    }
}
