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

use crate::Value;

/// The reply a device script produces for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Response {
    /// Send the text back over the transport
    Text(String),
    /// Send the raw bytes back over the transport
    Bytes(Vec<u8>),
    /// Send nothing
    #[default]
    None,
}

impl Response {
    /// Converts a script return value into a response.
    ///
    /// Text and bytes map to themselves, `null` maps to no response, and any other
    /// scalar is rendered as text.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Self::None,
            Value::Text(s) => Self::Text(s),
            Value::Bytes(b) => Self::Bytes(b),
            other => Self::Text(other.to_string()),
        }
    }

    /// Returns true if there is nothing to send.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Returns the wire representation of the response, if any.
    pub fn to_bytes(&self) -> Option<Vec<u8>> {
        match self {
            Self::Text(s) => Some(s.as_bytes().to_vec()),
            Self::Bytes(b) => Some(b.clone()),
            Self::None => None,
        }
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Bytes(b) => write!(f, "{}", hex::encode_upper(b)),
            Self::None => write!(f, "<no response>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_value() {
        assert_eq!(Response::from_value(Value::Null), Response::None);
        assert_eq!(Response::from_value("ok".into()), Response::Text("ok".into()));
        assert_eq!(Response::from_value(vec![1u8, 2].into()), Response::Bytes(vec![1, 2]));
        assert_eq!(Response::from_value(Value::Int(5)), Response::Text("5".into()));
        assert_eq!(Response::from_value(Value::Bool(false)), Response::Text("false".into()));
    }

    #[test]
    fn test_to_bytes() {
        assert_eq!(Response::Text("AB".into()).to_bytes(), Some(b"AB".to_vec()));
        assert_eq!(Response::None.to_bytes(), None);
        assert_eq!(Response::Bytes(vec![0x0a, 0xff]).to_string(), "0AFF");
    }
}
