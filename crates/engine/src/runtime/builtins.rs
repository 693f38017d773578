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

//! Native builtins, type conversions and the context-free host natives.

use devsim_common::Value;

use super::{
    ops::{self, expect_int, expect_text, OpResult},
    RuntimeErrorKind,
};
use crate::compiler::ir::{Builtin, Conversion};

static NULL: Value = Value::Null;

/// Calls a native builtin. Arity was checked at compile time.
pub(crate) fn call_builtin(builtin: Builtin, args: &[Value]) -> OpResult {
    let arg = |idx: usize| args.get(idx).unwrap_or(&NULL);
    let text = |idx: usize| expect_text(arg(idx), &format!("argument {} of `{builtin}`", idx + 1));

    match builtin {
        Builtin::Require => {
            if ops::truthy(arg(0))? {
                return Ok(Value::Null);
            }
            let message = match arg(1) {
                Value::Null => "condition was false".to_string(),
                other => other.to_string(),
            };
            Err(RuntimeErrorKind::Require(message))
        }
        Builtin::Len => ops::length(arg(0)).map(|len| Value::Int(len as i64)),
        Builtin::ToString => Ok(Value::Text(arg(0).to_string())),
        Builtin::ParseInt => parse_int(text(0)?).map(Value::Int),
        Builtin::ToUpper => Ok(Value::Text(text(0)?.to_uppercase())),
        Builtin::ToLower => Ok(Value::Text(text(0)?.to_lowercase())),
        Builtin::Trim => Ok(Value::Text(text(0)?.trim().to_string())),
        Builtin::Contains => Ok(Value::Bool(text(0)?.contains(text(1)?))),
        Builtin::StartsWith => Ok(Value::Bool(text(0)?.starts_with(text(1)?))),
        Builtin::EndsWith => Ok(Value::Bool(text(0)?.ends_with(text(1)?))),
        Builtin::Substring => {
            let source = text(0)?;
            let count = source.chars().count();
            let start = expect_int(arg(1), "substring start")?;
            let len = match arg(2) {
                Value::Null => count as i64 - start,
                other => expect_int(other, "substring length")?,
            };
            let end = start.checked_add(len).unwrap_or(i64::MAX);
            if start < 0 || len < 0 || end > count as i64 {
                return Err(RuntimeErrorKind::IndexOutOfBounds { index: end.max(start), len: count });
            }
            Ok(Value::Text(source.chars().skip(start as usize).take(len as usize).collect()))
        }
    }
}

/// `string(x)`, `bytes(x)`, `int(x)`, `uint(x)`, `bool(x)`.
pub(crate) fn convert(conversion: Conversion, value: &Value) -> OpResult {
    let unsupported = || {
        RuntimeErrorKind::type_error(format!("cannot convert {} to {conversion}", value.type_name()))
    };
    match conversion {
        Conversion::String => match value {
            Value::Null => Ok(Value::Text(String::new())),
            Value::Bytes(bytes) => String::from_utf8(bytes.clone()).map(Value::Text).map_err(|_| {
                RuntimeErrorKind::InvalidArgument("bytes are not valid UTF-8".to_string())
            }),
            other => Ok(Value::Text(other.to_string())),
        },
        Conversion::Bytes => match value {
            Value::Null => Ok(Value::Bytes(Vec::new())),
            Value::Text(text) => Ok(Value::Bytes(text.as_bytes().to_vec())),
            Value::Bytes(_) => Ok(value.clone()),
            _ => Err(unsupported()),
        },
        Conversion::Int | Conversion::Uint => {
            let int = match value {
                Value::Null => 0,
                Value::Int(i) => *i,
                Value::Bool(b) => i64::from(*b),
                Value::Float(f) if f.is_finite() && f.abs() < i64::MAX as f64 => f.trunc() as i64,
                Value::Text(text) => parse_int(text)?,
                _ => return Err(unsupported()),
            };
            if conversion == Conversion::Uint && int < 0 {
                return Err(RuntimeErrorKind::InvalidArgument(format!(
                    "{int} cannot be converted to uint"
                )));
            }
            Ok(Value::Int(int))
        }
        Conversion::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::Int(i) => Ok(Value::Bool(*i != 0)),
            Value::Text(text) => match text.trim() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(unsupported()),
            },
            _ => Err(unsupported()),
        },
    }
}

/// Renders bytes (or the UTF-8 of text) as uppercase hex without separators.
pub(crate) fn to_hex(value: &Value) -> OpResult {
    match value {
        Value::Bytes(bytes) => Ok(Value::Text(hex::encode_upper(bytes))),
        Value::Text(text) => Ok(Value::Text(hex::encode_upper(text))),
        other => Err(RuntimeErrorKind::type_error(format!(
            "toHex expects bytes, got {}",
            other.type_name()
        ))),
    }
}

/// Parses hex text into bytes. Whitespace and a `0x` prefix are ignored.
pub(crate) fn from_hex(value: &Value) -> OpResult {
    let text = expect_text(value, "argument of `fromHex`")?;
    let cleaned: String = text.split_whitespace().collect();
    let digits = cleaned.strip_prefix("0x").unwrap_or(&cleaned);
    hex::decode(digits)
        .map(Value::Bytes)
        .map_err(|err| RuntimeErrorKind::InvalidArgument(format!("invalid hex `{text}`: {err}")))
}

fn parse_int(text: &str) -> OpResult<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let parsed = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex_digits) => i64::from_str_radix(hex_digits, 16),
        None => digits.parse::<i64>(),
    };
    parsed
        .map(|value| if negative { -value } else { value })
        .map_err(|_| RuntimeErrorKind::InvalidArgument(format!("cannot parse `{text}` as an integer")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(builtin: Builtin, args: &[Value]) -> OpResult {
        call_builtin(builtin, args)
    }

    #[test]
    fn test_string_builtins() {
        assert_eq!(call(Builtin::ToUpper, &["abc".into()]), Ok("ABC".into()));
        assert_eq!(call(Builtin::Trim, &["  x ".into()]), Ok("x".into()));
        assert_eq!(call(Builtin::Contains, &["STATUS?".into(), "?".into()]), Ok(true.into()));
        assert_eq!(call(Builtin::StartsWith, &["SET 4".into(), "SET".into()]), Ok(true.into()));
        assert_eq!(call(Builtin::Len, &["héllo".into()]), Ok(Value::Int(5)));
    }

    #[test]
    fn test_substring() {
        assert_eq!(call(Builtin::Substring, &["SET 42".into(), Value::Int(4)]), Ok("42".into()));
        assert_eq!(
            call(Builtin::Substring, &["SET 42".into(), Value::Int(0), Value::Int(3)]),
            Ok("SET".into())
        );
        assert!(call(Builtin::Substring, &["abc".into(), Value::Int(2), Value::Int(5)]).is_err());
    }

    #[test]
    fn test_require() {
        assert_eq!(call(Builtin::Require, &[true.into()]), Ok(Value::Null));
        assert_eq!(
            call(Builtin::Require, &[false.into(), "bad input".into()]),
            Err(RuntimeErrorKind::Require("bad input".into()))
        );
        assert!(call(Builtin::Require, &[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(call(Builtin::ParseInt, &[" 42 ".into()]), Ok(Value::Int(42)));
        assert_eq!(call(Builtin::ParseInt, &["-0x10".into()]), Ok(Value::Int(-16)));
        assert!(call(Builtin::ParseInt, &["4x".into()]).is_err());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(convert(Conversion::String, &Value::Bytes(b"hi".to_vec())), Ok("hi".into()));
        assert_eq!(convert(Conversion::Bytes, &"hi".into()), Ok(Value::Bytes(b"hi".to_vec())));
        assert_eq!(convert(Conversion::Int, &Value::Float(2.9)), Ok(Value::Int(2)));
        assert!(convert(Conversion::Uint, &Value::Int(-1)).is_err());
        assert_eq!(convert(Conversion::Bool, &Value::Int(3)), Ok(Value::Bool(true)));
        assert!(convert(Conversion::Bytes, &Value::Int(3)).is_err());
    }

    #[test]
    fn test_hex_helpers() {
        assert_eq!(to_hex(&Value::Bytes(vec![0x0a, 0xff])), Ok("0AFF".into()));
        assert_eq!(from_hex(&"0x0a ff".into()), Ok(Value::Bytes(vec![0x0a, 0xff])));
        assert!(from_hex(&"zz".into()).is_err());
    }
}
