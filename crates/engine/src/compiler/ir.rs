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

//! The instruction tree scripts are lowered into.
//!
//! Every statement carries the original script line it came from. Statements
//! of the preamble helpers carry line 0.

use std::collections::HashMap;

use devsim_common::Value;

/// A lowered translation unit: the preamble helpers plus the entry point.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Functions by name
    pub functions: HashMap<String, Function>,
}

/// A lowered function.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name
    pub name: String,
    /// Parameter names in order
    pub params: Vec<String>,
    /// Function body
    pub body: Vec<Stmt>,
}

/// A lowered statement.
#[derive(Debug, Clone)]
pub enum Stmt {
    /// `T name [= init];`
    Declare { line: usize, name: String, init: Option<Expr>, default: Value },
    /// An expression evaluated for its effect
    Expr { line: usize, expr: Expr },
    /// `if (cond) then else otherwise`
    If { line: usize, cond: Expr, then: Vec<Stmt>, otherwise: Option<Vec<Stmt>> },
    /// `while (cond) body`
    While { line: usize, cond: Expr, body: Vec<Stmt> },
    /// `do body while (cond);`
    DoWhile { line: usize, body: Vec<Stmt>, cond: Expr },
    /// `for (init; cond; update) body`
    For {
        line: usize,
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        update: Option<Expr>,
        body: Vec<Stmt>,
    },
    /// A nested block
    Block { line: usize, stmts: Vec<Stmt> },
    /// `return [value];`
    Return { line: usize, value: Option<Expr> },
    /// `break;`
    Break { line: usize },
    /// `continue;`
    Continue { line: usize },
    /// `revert([message]);`
    Revert { line: usize, message: Option<Expr> },
    /// An inserted debug notification
    Notify { line: usize, variables: Vec<String> },
}

impl Stmt {
    /// Original line of the statement, or 0 inside the preamble.
    pub fn line(&self) -> usize {
        match self {
            Self::Declare { line, .. }
            | Self::Expr { line, .. }
            | Self::If { line, .. }
            | Self::While { line, .. }
            | Self::DoWhile { line, .. }
            | Self::For { line, .. }
            | Self::Block { line, .. }
            | Self::Return { line, .. }
            | Self::Break { line }
            | Self::Continue { line }
            | Self::Revert { line, .. }
            | Self::Notify { line, .. } => *line,
        }
    }
}

/// A lowered expression.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A constant
    Literal(Value),
    /// A variable read
    Var(String),
    /// A unary operator
    Unary(UnaryOp, Box<Expr>),
    /// A binary operator
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Short-circuit `&&`
    And(Box<Expr>, Box<Expr>),
    /// Short-circuit `||`
    Or(Box<Expr>, Box<Expr>),
    /// `cond ? a : b`
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Plain or compound assignment
    Assign(Place, Option<BinaryOp>, Box<Expr>),
    /// `++`/`--`, prefix or postfix
    Step { place: Place, delta: i64, prefix: bool },
    /// `base[index]`
    Index(Box<Expr>, Box<Expr>),
    /// `value.length`
    Length(Box<Expr>),
    /// A function call
    Call(Callee, Vec<Expr>),
    /// `string(x)`, `bytes(x)`, ...
    Convert(Conversion, Box<Expr>),
}

/// An assignable location.
#[derive(Debug, Clone)]
pub enum Place {
    /// A variable
    Var(String),
    /// A byte of a `bytes` variable
    Index(String, Box<Expr>),
}

impl Place {
    /// Name of the variable the place belongs to.
    pub fn name(&self) -> &str {
        match self {
            Self::Var(name) | Self::Index(name, _) => name,
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum UnaryOp {
    /// `-x`
    #[display("-")]
    Neg,
    /// `+x`
    #[display("+")]
    Plus,
    /// `!x`
    #[display("!")]
    Not,
    /// `~x`
    #[display("~")]
    BitNot,
}

/// Binary operators, excluding the short-circuit ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum BinaryOp {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("%")]
    Mod,
    #[display("**")]
    Pow,
    #[display("&")]
    BitAnd,
    #[display("|")]
    BitOr,
    #[display("^")]
    BitXor,
    #[display("<<")]
    Shl,
    #[display(">>")]
    Shr,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display(">")]
    Gt,
    #[display("<=")]
    Le,
    #[display(">=")]
    Ge,
}

/// Target of a conversion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Conversion {
    #[display("string")]
    String,
    #[display("bytes")]
    Bytes,
    #[display("int")]
    Int,
    #[display("uint")]
    Uint,
    #[display("bool")]
    Bool,
}

/// What a call expression invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callee {
    /// A function of the program (preamble helper)
    Function(String),
    /// A native builtin
    Builtin(Builtin),
    /// A reserved host native, callable from the preamble only
    Host(HostCall),
}

/// Native builtins callable from scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Builtin {
    #[display("require")]
    Require,
    #[display("len")]
    Len,
    #[display("toString")]
    ToString,
    #[display("parseInt")]
    ParseInt,
    #[display("toUpper")]
    ToUpper,
    #[display("toLower")]
    ToLower,
    #[display("trim")]
    Trim,
    #[display("contains")]
    Contains,
    #[display("startsWith")]
    StartsWith,
    #[display("endsWith")]
    EndsWith,
    #[display("substring")]
    Substring,
}

impl Builtin {
    /// Looks up a builtin by its script name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "require" => Self::Require,
            "len" => Self::Len,
            "toString" => Self::ToString,
            "parseInt" => Self::ParseInt,
            "toUpper" => Self::ToUpper,
            "toLower" => Self::ToLower,
            "trim" => Self::Trim,
            "contains" => Self::Contains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "substring" => Self::Substring,
            _ => return None,
        })
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(self) -> (usize, usize) {
        match self {
            Self::Require => (1, 2),
            Self::Substring => (2, 3),
            Self::Contains | Self::StartsWith | Self::EndsWith => (2, 2),
            _ => (1, 1),
        }
    }
}

/// Reserved host natives backing the preamble helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum HostCall {
    #[display("__host_toHex")]
    ToHex,
    #[display("__host_fromHex")]
    FromHex,
    #[display("__host_isFirstCall")]
    IsFirstCall,
    #[display("__host_getValue")]
    GetValue,
    #[display("__host_setValue")]
    SetValue,
    #[display("__host_getShared")]
    GetShared,
    #[display("__host_setShared")]
    SetShared,
    #[display("__host_log")]
    Log,
}

impl HostCall {
    /// Looks up a host native by its reserved name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "__host_toHex" => Self::ToHex,
            "__host_fromHex" => Self::FromHex,
            "__host_isFirstCall" => Self::IsFirstCall,
            "__host_getValue" => Self::GetValue,
            "__host_setValue" => Self::SetValue,
            "__host_getShared" => Self::GetShared,
            "__host_setShared" => Self::SetShared,
            "__host_log" => Self::Log,
            _ => return None,
        })
    }

    /// Number of arguments the native takes.
    pub fn arity(self) -> usize {
        match self {
            Self::IsFirstCall => 0,
            Self::SetValue | Self::SetShared => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        assert_eq!(Builtin::from_name("substring"), Some(Builtin::Substring));
        assert_eq!(Builtin::Substring.arity(), (2, 3));
        assert_eq!(Builtin::from_name("printf"), None);
        assert_eq!(Builtin::ToUpper.to_string(), "toUpper");
    }

    #[test]
    fn test_host_call_names_round_trip() {
        for call in [HostCall::ToHex, HostCall::SetShared, HostCall::Log] {
            assert_eq!(HostCall::from_name(&call.to_string()), Some(call));
        }
    }
}
