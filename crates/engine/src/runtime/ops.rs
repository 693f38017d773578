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

//! Operators on dynamic script values.

use std::cmp::Ordering;

use devsim_common::Value;

use super::RuntimeErrorKind;
use crate::compiler::ir::{BinaryOp, UnaryOp};

pub(crate) type OpResult<T = Value> = Result<T, RuntimeErrorKind>;

/// Applies a binary operator. Integer arithmetic is checked.
pub(crate) fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (Value::Text(_), _) | (_, Value::Text(_)) => Ok(Value::Text(format!("{lhs}{rhs}"))),
            (Value::Bytes(a), Value::Bytes(b)) => Ok(Value::Bytes([a.as_slice(), b.as_slice()].concat())),
            _ => arithmetic(op, lhs, rhs),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod | BinaryOp::Pow => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor | BinaryOp::Shl | BinaryOp::Shr => {
            bitwise(op, lhs, rhs)
        }
        BinaryOp::Eq => Ok(Value::Bool(equals(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!equals(lhs, rhs))),
        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            let ordering = compare(op, lhs, rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Gt => ordering.is_gt(),
                BinaryOp::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
    }
}

/// Applies a unary operator.
pub(crate) fn unary(op: UnaryOp, value: &Value) -> OpResult {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(i)) => {
            i.checked_neg().map(Value::Int).ok_or_else(|| RuntimeErrorKind::Overflow(format!("-{i}")))
        }
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Plus, Value::Int(_) | Value::Float(_)) => Ok(value.clone()),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::BitNot, Value::Int(i)) => Ok(Value::Int(!i)),
        _ => Err(RuntimeErrorKind::type_error(format!(
            "cannot apply `{op}` to {}",
            value.type_name()
        ))),
    }
}

/// Interprets a value as a condition.
pub(crate) fn truthy(value: &Value) -> OpResult<bool> {
    value.as_bool().ok_or_else(|| {
        RuntimeErrorKind::type_error(format!("condition must be bool, got {}", value.type_name()))
    })
}

/// `value.length`: characters of text, bytes of a byte sequence.
pub(crate) fn length(value: &Value) -> OpResult<usize> {
    match value {
        Value::Text(s) => Ok(s.chars().count()),
        Value::Bytes(b) => Ok(b.len()),
        other => Err(RuntimeErrorKind::type_error(format!("{} has no length", other.type_name()))),
    }
}

/// `base[index]`: a byte as an integer, or a character as text.
pub(crate) fn index(base: &Value, index: &Value) -> OpResult {
    let idx = expect_int(index, "index")?;
    let out_of_bounds = |len| RuntimeErrorKind::IndexOutOfBounds { index: idx, len };
    match base {
        Value::Bytes(bytes) => usize::try_from(idx)
            .ok()
            .and_then(|i| bytes.get(i))
            .map(|byte| Value::Int(i64::from(*byte)))
            .ok_or_else(|| out_of_bounds(bytes.len())),
        Value::Text(text) => usize::try_from(idx)
            .ok()
            .and_then(|i| text.chars().nth(i))
            .map(|ch| Value::Text(ch.to_string()))
            .ok_or_else(|| out_of_bounds(text.chars().count())),
        other => Err(RuntimeErrorKind::type_error(format!("cannot index {}", other.type_name()))),
    }
}

/// `target[index] = value` on a byte sequence.
pub(crate) fn set_index(target: &mut Value, index: &Value, value: &Value) -> OpResult<()> {
    let idx = expect_int(index, "index")?;
    let type_name = target.type_name();
    let Value::Bytes(bytes) = target else {
        return Err(RuntimeErrorKind::type_error(format!(
            "only bytes support indexed assignment, got {type_name}"
        )));
    };
    let byte = expect_int(value, "byte")?;
    let byte = u8::try_from(byte)
        .map_err(|_| RuntimeErrorKind::InvalidArgument(format!("{byte} does not fit in a byte")))?;
    let len = bytes.len();
    let slot = usize::try_from(idx)
        .ok()
        .and_then(|i| bytes.get_mut(i))
        .ok_or(RuntimeErrorKind::IndexOutOfBounds { index: idx, len })?;
    *slot = byte;
    Ok(())
}

pub(crate) fn expect_int(value: &Value, what: &str) -> OpResult<i64> {
    value.as_int().ok_or_else(|| {
        RuntimeErrorKind::type_error(format!("{what} must be int, got {}", value.type_name()))
    })
}

pub(crate) fn expect_text<'v>(value: &'v Value, what: &str) -> OpResult<&'v str> {
    value.as_text().ok_or_else(|| {
        RuntimeErrorKind::type_error(format!("{what} must be string, got {}", value.type_name()))
    })
}

fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arithmetic(op, *a, *b),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => float_arithmetic(op, a, b),
            _ => Err(mismatch(op, lhs, rhs)),
        },
    }
}

fn int_arithmetic(op: BinaryOp, a: i64, b: i64) -> OpResult {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div | BinaryOp::Mod if b == 0 => return Err(RuntimeErrorKind::DivisionByZero),
        BinaryOp::Div => a.checked_div(b),
        BinaryOp::Mod => a.checked_rem(b),
        BinaryOp::Pow => {
            let exponent = u32::try_from(b).map_err(|_| {
                RuntimeErrorKind::InvalidArgument(format!("exponent {b} is out of range"))
            })?;
            a.checked_pow(exponent)
        }
        _ => return Err(mismatch(op, &Value::Int(a), &Value::Int(b))),
    };
    result.map(Value::Int).ok_or_else(|| RuntimeErrorKind::Overflow(format!("{a} {op} {b}")))
}

fn float_arithmetic(op: BinaryOp, a: f64, b: f64) -> OpResult {
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return Err(RuntimeErrorKind::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        BinaryOp::Pow => a.powf(b),
        _ => return Err(mismatch(op, &Value::Float(a), &Value::Float(b))),
    }))
}

fn bitwise(op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult {
    let (Value::Int(a), Value::Int(b)) = (lhs, rhs) else {
        return Err(mismatch(op, lhs, rhs));
    };
    let (a, b) = (*a, *b);
    let shift = || {
        u32::try_from(b)
            .ok()
            .filter(|s| *s < i64::BITS)
            .ok_or_else(|| RuntimeErrorKind::InvalidArgument(format!("shift amount {b} is out of range")))
    };
    Ok(Value::Int(match op {
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        BinaryOp::BitXor => a ^ b,
        BinaryOp::Shl => a << shift()?,
        BinaryOp::Shr => a >> shift()?,
        _ => return Err(mismatch(op, lhs, rhs)),
    }))
}

fn equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
            lhs.as_float() == rhs.as_float()
        }
        _ => lhs == rhs,
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> OpResult<Ordering> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        _ => match (lhs.as_float(), rhs.as_float()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    ordering.ok_or_else(|| mismatch(op, lhs, rhs))
}

fn mismatch(op: BinaryOp, lhs: &Value, rhs: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::type_error(format!(
        "cannot apply `{op}` to {} and {}",
        lhs.type_name(),
        rhs.type_name()
    ))
}
