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

//! Lowering of the `solang-parser` tree into the instruction tree.
//!
//! Lowering is also where semantic checks happen. Problems are collected as
//! diagnostics against original script lines, and lowering continues past them
//! so one compile reports as much as possible.

use std::collections::HashMap;

use devsim_common::{Diagnostic, Value};
use solang_parser::pt::{
    CodeLocation, Expression, FunctionDefinition, Loc, SourceUnit, SourceUnitPart, Statement,
    Type,
};

use super::ir::{
    BinaryOp, Builtin, Callee, Conversion, Expr, Function, HostCall, Place, Program, Stmt,
    UnaryOp,
};
use crate::{
    syntax::{self, function_name},
    template::{self, LineMap, Position, ENTRY_POINT, HOST_PREFIX, NOTIFY_FUNCTION},
};

/// Result of lowering a translation unit.
pub(crate) struct Lowered {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
    /// Whether the unit contains debug notifications
    pub instrumented: bool,
}

/// Lowers a parsed unit. The caller decides whether the diagnostics are fatal.
pub(crate) fn lower(unit: &SourceUnit, map: &LineMap) -> Lowered {
    let prefix_len = template::prefix().len();
    let mut lowerer = Lowerer::new(map);

    let mut definitions = Vec::new();
    for part in &unit.0 {
        match part {
            SourceUnitPart::FunctionDefinition(def)
                if syntax::start(&def.loc).is_some_and(|start| start < prefix_len) =>
            {
                if let Some(name) = function_name(def) {
                    lowerer.arities.insert(name.to_string(), def.params.len());
                    definitions.push(def.as_ref());
                }
            }
            SourceUnitPart::FunctionDefinition(def) => {
                lowerer.error(&def.loc, "function definitions are not supported in scripts");
            }
            _ => {
                let line = match map.position(usize::MAX) {
                    Position::Body(line) | Position::Template(line) => line,
                };
                lowerer.diagnostics.push(Diagnostic::error(
                    line,
                    "only statements are supported in scripts",
                ));
            }
        }
    }

    if !lowerer.arities.contains_key(ENTRY_POINT) {
        lowerer.diagnostics.push(Diagnostic::error(1, format!("entry point `{ENTRY_POINT}` not found")));
    }

    for def in definitions {
        if let Some(function) = lowerer.lower_function(def) {
            lowerer.program.functions.insert(function.name.clone(), function);
        }
    }

    lowerer.diagnostics.sort_by_key(|diag| diag.line);
    Lowered {
        program: lowerer.program,
        diagnostics: lowerer.diagnostics,
        instrumented: lowerer.instrumented,
    }
}

struct Lowerer<'a> {
    map: &'a LineMap,
    program: Program,
    /// Parameter counts of every callable function
    arities: HashMap<String, usize>,
    scopes: Vec<Vec<String>>,
    loop_depth: usize,
    /// True while lowering a preamble helper
    in_template: bool,
    instrumented: bool,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lowerer<'a> {
    fn new(map: &'a LineMap) -> Self {
        Self {
            map,
            program: Program::default(),
            arities: HashMap::new(),
            scopes: Vec::new(),
            loop_depth: 0,
            in_template: false,
            instrumented: false,
            diagnostics: Vec::new(),
        }
    }

    fn lower_function(&mut self, def: &FunctionDefinition) -> Option<Function> {
        let name = function_name(def)?.to_string();
        self.in_template = name != ENTRY_POINT;

        let params: Vec<String> = def
            .params
            .iter()
            .filter_map(|(_, param)| param.as_ref()?.name.as_ref().map(|ident| ident.name.clone()))
            .collect();

        let Some(Statement::Block { statements, .. }) = &def.body else {
            self.error(&def.loc, format!("function `{name}` has no body"));
            return None;
        };

        self.scopes.push(params.clone());
        let body = self.lower_statements(statements);
        self.scopes.pop();

        Some(Function { name, params, body })
    }

    fn lower_statements(&mut self, statements: &[Statement]) -> Vec<Stmt> {
        statements.iter().filter_map(|stmt| self.lower_statement(stmt)).collect()
    }

    /// Lowers a branch or loop body into its own scope.
    fn lower_body(&mut self, body: &Statement) -> Vec<Stmt> {
        self.scopes.push(Vec::new());
        let stmts = match body {
            Statement::Block { statements, .. } => self.lower_statements(statements),
            other => self.lower_statement(other).into_iter().collect(),
        };
        self.scopes.pop();
        stmts
    }

    fn lower_loop_body(&mut self, body: &Statement) -> Vec<Stmt> {
        self.loop_depth += 1;
        let stmts = self.lower_body(body);
        self.loop_depth -= 1;
        stmts
    }

    fn lower_statement(&mut self, stmt: &Statement) -> Option<Stmt> {
        let line = self.line(&stmt.loc());
        match stmt {
            Statement::Block { statements, .. } => {
                self.scopes.push(Vec::new());
                let stmts = self.lower_statements(statements);
                self.scopes.pop();
                Some(Stmt::Block { line, stmts })
            }
            Statement::VariableDefinition(loc, decl, init) => {
                let default = self.default_value(&decl.ty);
                let init = init.as_ref().map(|expr| self.lower_expr(expr));
                let Some(ident) = &decl.name else {
                    self.error(loc, "variable declaration without a name");
                    return None;
                };
                self.declare(loc, &ident.name);
                let init = match init {
                    Some(init) => Some(init?),
                    None => None,
                };
                Some(Stmt::Declare { line, name: ident.name.clone(), init, default: default? })
            }
            Statement::Expression(loc, expr) => self.lower_expression_statement(line, loc, expr),
            Statement::If(_, cond, then, otherwise) => {
                let cond = self.lower_expr(cond);
                let then = self.lower_body(then);
                let otherwise = otherwise.as_ref().map(|body| self.lower_body(body));
                Some(Stmt::If { line, cond: cond?, then, otherwise })
            }
            Statement::While(_, cond, body) => {
                let cond = self.lower_expr(cond);
                let body = self.lower_loop_body(body);
                Some(Stmt::While { line, cond: cond?, body })
            }
            Statement::DoWhile(_, body, cond) => {
                let body = self.lower_loop_body(body);
                let cond = self.lower_expr(cond);
                Some(Stmt::DoWhile { line, body, cond: cond? })
            }
            Statement::For(_, init, cond, update, body) => {
                // The initializer lives in a scope around the whole loop.
                self.scopes.push(Vec::new());
                let init = init.as_ref().map(|init| self.lower_statement(init));
                let cond = cond.as_ref().map(|cond| self.lower_expr(cond));
                let update = update.as_ref().map(|update| self.lower_expr(update));
                let body = body.as_ref().map(|body| self.lower_loop_body(body)).unwrap_or_default();
                self.scopes.pop();

                Some(Stmt::For {
                    line,
                    init: match init {
                        Some(init) => Some(Box::new(init?)),
                        None => None,
                    },
                    cond: lift(cond)?,
                    update: lift(update)?,
                    body,
                })
            }
            Statement::Return(_, value) => {
                let value = lift(value.as_ref().map(|value| self.lower_expr(value)))?;
                Some(Stmt::Return { line, value })
            }
            Statement::Break(loc) => {
                if self.loop_depth == 0 {
                    self.error(loc, "`break` outside of a loop");
                    return None;
                }
                Some(Stmt::Break { line })
            }
            Statement::Continue(loc) => {
                if self.loop_depth == 0 {
                    self.error(loc, "`continue` outside of a loop");
                    return None;
                }
                Some(Stmt::Continue { line })
            }
            Statement::Revert(loc, path, args) => {
                if path.is_some() {
                    self.error(loc, "custom errors are not supported, use `revert(\"message\")`");
                    return None;
                }
                self.lower_revert(line, loc, args)
            }
            other => {
                self.error(&other.loc(), "unsupported statement");
                None
            }
        }
    }

    fn lower_expression_statement(&mut self, line: usize, loc: &Loc, expr: &Expression) -> Option<Stmt> {
        if let Expression::FunctionCall(_, func, args) = expr {
            if let Expression::Variable(ident) = func.as_ref() {
                match ident.name.as_str() {
                    NOTIFY_FUNCTION => return self.lower_notify(loc, args),
                    "revert" => return self.lower_revert(line, loc, args),
                    _ => {}
                }
            }
        }
        let expr = self.lower_expr(expr)?;
        Some(Stmt::Expr { line, expr })
    }

    fn lower_revert(&mut self, line: usize, loc: &Loc, args: &[Expression]) -> Option<Stmt> {
        if args.len() > 1 {
            self.error(loc, format!("`revert` takes at most 1 argument, got {}", args.len()));
            return None;
        }
        let message = lift(args.first().map(|arg| self.lower_expr(arg)))?;
        Some(Stmt::Revert { line, message })
    }

    /// `__debug_notify(<line literal>, <variable>...)`
    fn lower_notify(&mut self, loc: &Loc, args: &[Expression]) -> Option<Stmt> {
        let reported = match args.first() {
            Some(Expression::NumberLiteral(_, value, exponent, None)) if exponent.is_empty() => {
                value.parse::<usize>().ok()
            }
            _ => None,
        };
        let Some(reported) = reported else {
            self.error(loc, format!("malformed `{NOTIFY_FUNCTION}` call: expected a line number"));
            return None;
        };

        let mut variables = Vec::with_capacity(args.len().saturating_sub(1));
        for arg in &args[1..] {
            let Expression::Variable(ident) = arg else {
                self.error(loc, format!("malformed `{NOTIFY_FUNCTION}` call: expected variable names"));
                return None;
            };
            if !self.is_declared(&ident.name) {
                self.error(&ident.loc, format!("undeclared identifier `{}`", ident.name));
                return None;
            }
            variables.push(ident.name.clone());
        }

        self.instrumented = true;
        Some(Stmt::Notify { line: reported, variables })
    }

    fn lower_expr(&mut self, expr: &Expression) -> Option<Expr> {
        if let Some((op, lhs, rhs)) = binary_parts(expr) {
            let lhs = self.lower_expr(lhs);
            let rhs = self.lower_expr(rhs);
            return Some(Expr::Binary(op, Box::new(lhs?), Box::new(rhs?)));
        }
        if let Some((op, target, value)) = assignment_parts(expr) {
            let place = self.lower_place(target);
            let value = self.lower_expr(value);
            return Some(Expr::Assign(place?, op, Box::new(value?)));
        }

        match expr {
            Expression::BoolLiteral(_, value) => Some(Expr::Literal(Value::Bool(*value))),
            Expression::NumberLiteral(loc, value, exponent, unit) => {
                if unit.is_some() {
                    self.error(loc, "number units are not supported");
                    return None;
                }
                let parsed = parse_decimal(value, exponent);
                if parsed.is_none() {
                    self.error(loc, format!("number literal `{value}` is out of range"));
                }
                parsed.map(Expr::Literal)
            }
            Expression::HexNumberLiteral(loc, value, _) => {
                let digits = value.replace('_', "");
                let digits = digits.trim_start_matches("0x").trim_start_matches("0X");
                match i64::from_str_radix(digits, 16) {
                    Ok(value) => Some(Expr::Literal(Value::Int(value))),
                    Err(_) => {
                        self.error(loc, format!("number literal `{value}` is out of range"));
                        None
                    }
                }
            }
            Expression::RationalNumberLiteral(loc, integer, fraction, exponent, _) => {
                let integer = if integer.is_empty() { "0" } else { integer.as_str() };
                let exponent = if exponent.is_empty() { "0" } else { exponent.as_str() };
                match format!("{integer}.{fraction}e{exponent}").replace('_', "").parse::<f64>() {
                    Ok(value) => Some(Expr::Literal(Value::Float(value))),
                    Err(_) => {
                        self.error(loc, "invalid number literal");
                        None
                    }
                }
            }
            Expression::StringLiteral(literals) => {
                let mut text = String::new();
                for literal in literals {
                    match unescape(&literal.string) {
                        Ok(part) => text.push_str(&part),
                        Err(message) => {
                            self.error(&literal.loc, message);
                            return None;
                        }
                    }
                }
                Some(Expr::Literal(Value::Text(text)))
            }
            Expression::HexLiteral(literals) => {
                let mut bytes = Vec::new();
                for literal in literals {
                    let cleaned = literal.hex.replace(['_', ' '], "");
                    match hex::decode(&cleaned) {
                        Ok(decoded) => bytes.extend(decoded),
                        Err(err) => {
                            self.error(&literal.loc, format!("invalid hex literal: {err}"));
                            return None;
                        }
                    }
                }
                Some(Expr::Literal(Value::Bytes(bytes)))
            }
            Expression::Variable(ident) => {
                if !self.is_declared(&ident.name) {
                    self.error(&ident.loc, format!("undeclared identifier `{}`", ident.name));
                    return None;
                }
                Some(Expr::Var(ident.name.clone()))
            }
            Expression::Parenthesis(_, inner) => self.lower_expr(inner),
            Expression::Not(_, operand) => self.lower_unary(UnaryOp::Not, operand),
            Expression::Negate(_, operand) => self.lower_unary(UnaryOp::Neg, operand),
            Expression::UnaryPlus(_, operand) => self.lower_unary(UnaryOp::Plus, operand),
            Expression::BitwiseNot(_, operand) => self.lower_unary(UnaryOp::BitNot, operand),
            Expression::And(_, lhs, rhs) => {
                let lhs = self.lower_expr(lhs);
                let rhs = self.lower_expr(rhs);
                Some(Expr::And(Box::new(lhs?), Box::new(rhs?)))
            }
            Expression::Or(_, lhs, rhs) => {
                let lhs = self.lower_expr(lhs);
                let rhs = self.lower_expr(rhs);
                Some(Expr::Or(Box::new(lhs?), Box::new(rhs?)))
            }
            Expression::ConditionalOperator(_, cond, then, otherwise) => {
                let cond = self.lower_expr(cond);
                let then = self.lower_expr(then);
                let otherwise = self.lower_expr(otherwise);
                Some(Expr::Ternary(Box::new(cond?), Box::new(then?), Box::new(otherwise?)))
            }
            Expression::PreIncrement(_, target) => self.lower_step(target, 1, true),
            Expression::PreDecrement(_, target) => self.lower_step(target, -1, true),
            Expression::PostIncrement(_, target) => self.lower_step(target, 1, false),
            Expression::PostDecrement(_, target) => self.lower_step(target, -1, false),
            Expression::ArraySubscript(loc, base, index) => {
                let Some(index) = index else {
                    self.error(loc, "missing index");
                    return None;
                };
                let base = self.lower_expr(base);
                let index = self.lower_expr(index);
                Some(Expr::Index(Box::new(base?), Box::new(index?)))
            }
            Expression::MemberAccess(loc, base, member) => {
                if member.name != "length" {
                    self.error(loc, format!("member `{}` is not supported", member.name));
                    return None;
                }
                Some(Expr::Length(Box::new(self.lower_expr(base)?)))
            }
            Expression::FunctionCall(loc, func, args) => self.lower_call(loc, func, args),
            other => {
                self.error(&other.loc(), "unsupported expression");
                None
            }
        }
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expression) -> Option<Expr> {
        Some(Expr::Unary(op, Box::new(self.lower_expr(operand)?)))
    }

    fn lower_step(&mut self, target: &Expression, delta: i64, prefix: bool) -> Option<Expr> {
        Some(Expr::Step { place: self.lower_place(target)?, delta, prefix })
    }

    fn lower_place(&mut self, target: &Expression) -> Option<Place> {
        match target {
            Expression::Variable(ident) => {
                if !self.is_declared(&ident.name) {
                    self.error(&ident.loc, format!("undeclared identifier `{}`", ident.name));
                    return None;
                }
                Some(Place::Var(ident.name.clone()))
            }
            Expression::ArraySubscript(_, base, Some(index)) => match base.as_ref() {
                Expression::Variable(ident) => {
                    let place = self.lower_place(base);
                    let index = self.lower_expr(index);
                    place?;
                    Some(Place::Index(ident.name.clone(), Box::new(index?)))
                }
                other => {
                    self.error(&other.loc(), "only variables can be indexed for assignment");
                    None
                }
            },
            Expression::Parenthesis(_, inner) => self.lower_place(inner),
            other => {
                self.error(&other.loc(), "invalid assignment target");
                None
            }
        }
    }

    fn lower_call(&mut self, loc: &Loc, func: &Expression, args: &[Expression]) -> Option<Expr> {
        let callee = match func {
            Expression::Type(_, ty) => {
                let Some(conversion) = conversion_for(ty) else {
                    self.error(loc, "unsupported type conversion");
                    return None;
                };
                if args.len() != 1 {
                    self.error(loc, format!("`{conversion}(...)` takes 1 argument, got {}", args.len()));
                    return None;
                }
                let value = self.lower_expr(&args[0])?;
                return Some(Expr::Convert(conversion, Box::new(value)));
            }
            Expression::Variable(ident) => self.resolve_callee(loc, &ident.name, args.len())?,
            other => {
                self.error(&other.loc(), "unsupported call target");
                return None;
            }
        };

        let args: Vec<_> = args.iter().map(|arg| self.lower_expr(arg)).collect();
        let args = args.into_iter().collect::<Option<Vec<_>>>()?;
        Some(Expr::Call(callee, args))
    }

    fn resolve_callee(&mut self, loc: &Loc, name: &str, argc: usize) -> Option<Callee> {
        if name.starts_with(HOST_PREFIX) {
            if !self.in_template {
                self.error(loc, format!("`{name}` is reserved for the host"));
                return None;
            }
            let call = HostCall::from_name(name);
            if let Some(call) = call.filter(|call| call.arity() != argc) {
                self.error(loc, format!("`{call}` takes {} argument(s), got {argc}", call.arity()));
                return None;
            }
            return call.map(Callee::Host).or_else(|| {
                self.error(loc, format!("unknown function `{name}`"));
                None
            });
        }

        if let Some(builtin) = Builtin::from_name(name) {
            let (min, max) = builtin.arity();
            if argc < min || argc > max {
                let expected =
                    if min == max { min.to_string() } else { format!("{min} to {max}") };
                self.error(loc, format!("`{builtin}` takes {expected} argument(s), got {argc}"));
                return None;
            }
            return Some(Callee::Builtin(builtin));
        }

        match self.arities.get(name) {
            Some(expected) if *expected == argc => Some(Callee::Function(name.to_string())),
            Some(expected) => {
                self.error(loc, format!("`{name}` takes {expected} argument(s), got {argc}"));
                None
            }
            None if name == NOTIFY_FUNCTION || name == "revert" => {
                self.error(loc, format!("`{name}` can only be used as a statement"));
                None
            }
            None => {
                self.error(loc, format!("unknown function `{name}`"));
                None
            }
        }
    }

    fn default_value(&mut self, ty: &Expression) -> Option<Value> {
        let Expression::Type(loc, ty) = ty else {
            self.error(&ty.loc(), "unsupported variable type");
            return None;
        };
        match ty {
            Type::Int(_) | Type::Uint(_) => Some(Value::Int(0)),
            Type::Bool => Some(Value::Bool(false)),
            Type::String => Some(Value::Text(String::new())),
            Type::DynamicBytes => Some(Value::Bytes(Vec::new())),
            Type::Bytes(len) => Some(Value::Bytes(vec![0; *len as usize])),
            Type::Address | Type::AddressPayable => {
                self.error(loc, "`address` is not supported in scripts");
                None
            }
            _ => {
                self.error(loc, "unsupported variable type");
                None
            }
        }
    }

    fn declare(&mut self, loc: &Loc, name: &str) {
        if self.scopes.last().is_some_and(|scope| scope.iter().any(|n| n == name)) {
            self.error(loc, format!("identifier `{name}` already declared"));
            return;
        }
        if self.is_declared(name) && !self.in_template {
            let line = self.diagnostic_line(loc);
            self.diagnostics
                .push(Diagnostic::warning(line, format!("declaration of `{name}` shadows an existing declaration")));
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(name.to_string());
        }
    }

    fn is_declared(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.iter().any(|n| n == name))
    }

    /// Original line of a location, or 0 inside the preamble.
    fn line(&self, loc: &Loc) -> usize {
        syntax::start(loc).map_or(0, |start| self.map.body_line(start))
    }

    fn diagnostic_line(&self, loc: &Loc) -> usize {
        match self.map.position(syntax::start(loc).unwrap_or(usize::MAX)) {
            Position::Body(line) | Position::Template(line) => line,
        }
    }

    fn error(&mut self, loc: &Loc, message: impl Into<String>) {
        let line = self.diagnostic_line(loc);
        self.diagnostics.push(Diagnostic::error(line, message));
    }
}

/// Turns an optional lowering result into a lowering result of an option.
fn lift<T>(value: Option<Option<T>>) -> Option<Option<T>> {
    match value {
        None => Some(None),
        Some(inner) => inner.map(Some),
    }
}

fn binary_parts(expr: &Expression) -> Option<(BinaryOp, &Expression, &Expression)> {
    let (op, lhs, rhs) = match expr {
        Expression::Add(_, l, r) => (BinaryOp::Add, l, r),
        Expression::Subtract(_, l, r) => (BinaryOp::Sub, l, r),
        Expression::Multiply(_, l, r) => (BinaryOp::Mul, l, r),
        Expression::Divide(_, l, r) => (BinaryOp::Div, l, r),
        Expression::Modulo(_, l, r) => (BinaryOp::Mod, l, r),
        Expression::Power(_, l, r) => (BinaryOp::Pow, l, r),
        Expression::BitwiseAnd(_, l, r) => (BinaryOp::BitAnd, l, r),
        Expression::BitwiseOr(_, l, r) => (BinaryOp::BitOr, l, r),
        Expression::BitwiseXor(_, l, r) => (BinaryOp::BitXor, l, r),
        Expression::ShiftLeft(_, l, r) => (BinaryOp::Shl, l, r),
        Expression::ShiftRight(_, l, r) => (BinaryOp::Shr, l, r),
        Expression::Equal(_, l, r) => (BinaryOp::Eq, l, r),
        Expression::NotEqual(_, l, r) => (BinaryOp::Ne, l, r),
        Expression::Less(_, l, r) => (BinaryOp::Lt, l, r),
        Expression::More(_, l, r) => (BinaryOp::Gt, l, r),
        Expression::LessEqual(_, l, r) => (BinaryOp::Le, l, r),
        Expression::MoreEqual(_, l, r) => (BinaryOp::Ge, l, r),
        _ => return None,
    };
    Some((op, lhs.as_ref(), rhs.as_ref()))
}

fn assignment_parts(expr: &Expression) -> Option<(Option<BinaryOp>, &Expression, &Expression)> {
    let (op, target, value) = match expr {
        Expression::Assign(_, t, v) => (None, t, v),
        Expression::AssignAdd(_, t, v) => (Some(BinaryOp::Add), t, v),
        Expression::AssignSubtract(_, t, v) => (Some(BinaryOp::Sub), t, v),
        Expression::AssignMultiply(_, t, v) => (Some(BinaryOp::Mul), t, v),
        Expression::AssignDivide(_, t, v) => (Some(BinaryOp::Div), t, v),
        Expression::AssignModulo(_, t, v) => (Some(BinaryOp::Mod), t, v),
        Expression::AssignAnd(_, t, v) => (Some(BinaryOp::BitAnd), t, v),
        Expression::AssignOr(_, t, v) => (Some(BinaryOp::BitOr), t, v),
        Expression::AssignXor(_, t, v) => (Some(BinaryOp::BitXor), t, v),
        Expression::AssignShiftLeft(_, t, v) => (Some(BinaryOp::Shl), t, v),
        Expression::AssignShiftRight(_, t, v) => (Some(BinaryOp::Shr), t, v),
        _ => return None,
    };
    Some((op, target.as_ref(), value.as_ref()))
}

fn conversion_for(ty: &Type) -> Option<Conversion> {
    Some(match ty {
        Type::String => Conversion::String,
        Type::DynamicBytes => Conversion::Bytes,
        Type::Int(_) => Conversion::Int,
        Type::Uint(_) => Conversion::Uint,
        Type::Bool => Conversion::Bool,
        _ => return None,
    })
}

/// Parses a decimal literal with an optional exponent. Negative exponents give
/// a float.
fn parse_decimal(value: &str, exponent: &str) -> Option<Value> {
    let base: i64 = value.replace('_', "").parse().ok()?;
    if exponent.is_empty() {
        return Some(Value::Int(base));
    }
    let exponent: i32 = exponent.replace('_', "").parse().ok()?;
    if exponent < 0 {
        return Some(Value::Float(base as f64 * 10f64.powi(exponent)));
    }
    let scale = 10i64.checked_pow(u32::try_from(exponent).ok()?)?;
    base.checked_mul(scale).map(Value::Int)
}

/// Resolves escape sequences of a string literal.
fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('\n') => {}
            Some('x') => {
                let digits: String = chars.by_ref().take(2).collect();
                let byte = u8::from_str_radix(&digits, 16)
                    .map_err(|_| format!("invalid escape `\\x{digits}`"))?;
                out.push(char::from(byte));
            }
            Some('u') => {
                let digits: String = chars.by_ref().take(4).collect();
                let ch = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid escape `\\u{digits}`"))?;
                out.push(ch);
            }
            Some(other) => return Err(format!("unknown escape sequence `\\{other}`")),
            None => return Err("unterminated escape sequence".to_string()),
        }
    }
    Ok(out)
}
