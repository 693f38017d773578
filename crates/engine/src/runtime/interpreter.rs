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

//! Tree-walking interpreter over the lowered program.

use std::iter;

use devsim_common::{KeyValueStore, Value, VariableSnapshot};
use tracing::info;

use super::{
    builtins,
    ops::{self, expect_int, expect_text},
    RuntimeError, RuntimeErrorKind,
};
use crate::{
    compiler::ir::{Callee, Expr, HostCall, Place, Program, Stmt},
    DebugSession, HostConfig,
};

type Exec<T> = Result<T, RuntimeError>;

/// Everything a single execution may touch outside of its own variables.
pub(crate) struct HostContext<'a> {
    /// Unit name, for logs
    pub unit: &'a str,
    /// Store persisted across executions of the unit
    pub store: &'a KeyValueStore,
    /// Shared state wired in by the application
    pub shared: &'a KeyValueStore,
    /// True during the first execution of the unit
    pub first_call: bool,
    /// Session notified by instrumented statements
    pub session: Option<&'a DebugSession>,
}

/// Lexically scoped variables of one function activation.
#[derive(Debug, Default)]
struct Env {
    frames: Vec<Vec<(String, Value)>>,
}

impl Env {
    fn push(&mut self) {
        self.frames.push(Vec::new());
    }

    fn pop(&mut self) {
        self.frames.pop();
    }

    fn declare(&mut self, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.push((name.to_string(), value));
        }
    }

    fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().flat_map(|frame| frame.iter().rev()).find_map(|(n, value)| (n == name).then_some(value))
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.frames
            .iter_mut()
            .rev()
            .flat_map(|frame| frame.iter_mut().rev())
            .find_map(|(n, value)| (n == name).then_some(value))
    }
}

enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// An assignable place with its index already evaluated.
enum Resolved<'p> {
    Var(&'p str),
    Index(&'p str, Value),
}

pub(crate) struct Interpreter<'a> {
    program: &'a Program,
    host: &'a HostContext<'a>,
    max_steps: u64,
    max_call_depth: usize,
    steps: u64,
    depth: usize,
    /// Original line of the statement executing, for error reports
    line: usize,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(program: &'a Program, host: &'a HostContext<'a>, config: &HostConfig) -> Self {
        Self {
            program,
            host,
            max_steps: config.max_steps,
            max_call_depth: config.max_call_depth,
            steps: 0,
            depth: 0,
            line: 0,
        }
    }

    /// Calls a function of the program. Missing arguments are `null`.
    pub(crate) fn call(&mut self, name: &str, args: Vec<Value>) -> Exec<Value> {
        let program = self.program;
        let Some(function) = program.functions.get(name) else {
            return Err(self.fail(RuntimeErrorKind::UnknownFunction(name.to_string())));
        };
        if self.depth >= self.max_call_depth {
            return Err(self.fail(RuntimeErrorKind::CallDepth(self.max_call_depth)));
        }

        let mut env = Env::default();
        env.push();
        for (param, arg) in function.params.iter().zip(args.into_iter().chain(iter::repeat(Value::Null))) {
            env.declare(param, arg);
        }

        self.depth += 1;
        let flow = self.exec_stmts(&function.body, &mut env);
        self.depth -= 1;

        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::Null),
        }
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], env: &mut Env) -> Exec<Flow> {
        for stmt in stmts {
            match self.exec(stmt, env)? {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_scoped(&mut self, stmts: &[Stmt], env: &mut Env) -> Exec<Flow> {
        env.push();
        let flow = self.exec_stmts(stmts, env);
        env.pop();
        flow
    }

    fn exec(&mut self, stmt: &Stmt, env: &mut Env) -> Exec<Flow> {
        // Notifications are invisible to the step budget.
        if let Stmt::Notify { line, variables } = stmt {
            self.notify(*line, variables, env);
            return Ok(Flow::Normal);
        }
        self.enter_line(stmt.line());
        self.tick()?;

        match stmt {
            Stmt::Declare { name, init, default, .. } => {
                let value = match init {
                    Some(init) => self.eval(init, env)?,
                    None => default.clone(),
                };
                env.declare(name, value);
            }
            Stmt::Expr { expr, .. } => {
                self.eval(expr, env)?;
            }
            Stmt::If { cond, then, otherwise, .. } => {
                if self.condition(cond, env)? {
                    return self.exec_scoped(then, env);
                }
                if let Some(otherwise) = otherwise {
                    return self.exec_scoped(otherwise, env);
                }
            }
            Stmt::While { line, cond, body } => loop {
                self.enter_line(*line);
                if !self.condition(cond, env)? {
                    break;
                }
                match self.exec_scoped(body, env)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => {}
                }
                self.tick()?;
            },
            Stmt::DoWhile { line, body, cond } => loop {
                match self.exec_scoped(body, env)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => {}
                }
                self.enter_line(*line);
                self.tick()?;
                if !self.condition(cond, env)? {
                    break;
                }
            },
            Stmt::For { line, init, cond, update, body } => {
                env.push();
                let flow = self.exec_for(*line, init.as_deref(), cond.as_ref(), update.as_ref(), body, env);
                env.pop();
                return flow;
            }
            Stmt::Block { stmts, .. } => return self.exec_scoped(stmts, env),
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.eval(value, env)?,
                    None => Value::Null,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Break { .. } => return Ok(Flow::Break),
            Stmt::Continue { .. } => return Ok(Flow::Continue),
            Stmt::Revert { message, .. } => {
                let message = match message {
                    Some(message) => self.eval(message, env)?.to_string(),
                    None => "reverted without a message".to_string(),
                };
                return Err(self.fail(RuntimeErrorKind::Revert(message)));
            }
            Stmt::Notify { .. } => {}
        }
        Ok(Flow::Normal)
    }

    fn exec_for(
        &mut self,
        line: usize,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &[Stmt],
        env: &mut Env,
    ) -> Exec<Flow> {
        if let Some(init) = init {
            self.exec(init, env)?;
        }
        loop {
            self.enter_line(line);
            if let Some(cond) = cond {
                if !self.condition(cond, env)? {
                    break;
                }
            }
            match self.exec_scoped(body, env)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
            self.enter_line(line);
            if let Some(update) = update {
                self.eval(update, env)?;
            }
            self.tick()?;
        }
        Ok(Flow::Normal)
    }

    fn eval(&mut self, expr: &Expr, env: &mut Env) -> Exec<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| self.fail(RuntimeErrorKind::UndefinedVariable(name.clone()))),
            Expr::Unary(op, operand) => {
                let value = self.eval(operand, env)?;
                ops::unary(*op, &value).map_err(|kind| self.fail(kind))
            }
            Expr::Binary(op, lhs, rhs) => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                ops::binary(*op, &lhs, &rhs).map_err(|kind| self.fail(kind))
            }
            Expr::And(lhs, rhs) => {
                Ok(Value::Bool(self.condition(lhs, env)? && self.condition(rhs, env)?))
            }
            Expr::Or(lhs, rhs) => {
                Ok(Value::Bool(self.condition(lhs, env)? || self.condition(rhs, env)?))
            }
            Expr::Ternary(cond, then, otherwise) => {
                if self.condition(cond, env)? {
                    self.eval(then, env)
                } else {
                    self.eval(otherwise, env)
                }
            }
            Expr::Assign(place, op, value) => {
                let rhs = self.eval(value, env)?;
                let place = self.resolve(place, env)?;
                let new = match op {
                    Some(op) => {
                        let current = self.load(&place, env)?;
                        ops::binary(*op, &current, &rhs).map_err(|kind| self.fail(kind))?
                    }
                    None => rhs,
                };
                self.store(&place, new.clone(), env)?;
                Ok(new)
            }
            Expr::Step { place, delta, prefix } => {
                let place = self.resolve(place, env)?;
                let current = self.load(&place, env)?;
                let int = expect_int(&current, "operand of `++`/`--`").map_err(|kind| self.fail(kind))?;
                let new = int.checked_add(*delta).ok_or_else(|| {
                    self.fail(RuntimeErrorKind::Overflow(format!("{int} + {delta}")))
                })?;
                self.store(&place, Value::Int(new), env)?;
                Ok(if *prefix { Value::Int(new) } else { current })
            }
            Expr::Index(base, index) => {
                let base = self.eval(base, env)?;
                let index = self.eval(index, env)?;
                ops::index(&base, &index).map_err(|kind| self.fail(kind))
            }
            Expr::Length(value) => {
                let value = self.eval(value, env)?;
                ops::length(&value).map(|len| Value::Int(len as i64)).map_err(|kind| self.fail(kind))
            }
            Expr::Call(callee, args) => {
                let args = args.iter().map(|arg| self.eval(arg, env)).collect::<Exec<Vec<_>>>()?;
                match callee {
                    Callee::Function(name) => self.call(name, args),
                    Callee::Builtin(builtin) => {
                        builtins::call_builtin(*builtin, &args).map_err(|kind| self.fail(kind))
                    }
                    Callee::Host(call) => self.host_call(*call, &args),
                }
            }
            Expr::Convert(conversion, value) => {
                let value = self.eval(value, env)?;
                builtins::convert(*conversion, &value).map_err(|kind| self.fail(kind))
            }
        }
    }

    fn condition(&mut self, expr: &Expr, env: &mut Env) -> Exec<bool> {
        let value = self.eval(expr, env)?;
        ops::truthy(&value).map_err(|kind| self.fail(kind))
    }

    fn resolve<'p>(&mut self, place: &'p Place, env: &mut Env) -> Exec<Resolved<'p>> {
        Ok(match place {
            Place::Var(name) => Resolved::Var(name),
            Place::Index(name, index) => Resolved::Index(name, self.eval(index, env)?),
        })
    }

    fn load(&self, place: &Resolved<'_>, env: &Env) -> Exec<Value> {
        let (Resolved::Var(name) | Resolved::Index(name, _)) = place;
        let value =
            env.get(name).ok_or_else(|| self.fail(RuntimeErrorKind::UndefinedVariable(name.to_string())))?;
        match place {
            Resolved::Var(_) => Ok(value.clone()),
            Resolved::Index(_, index) => ops::index(value, index).map_err(|kind| self.fail(kind)),
        }
    }

    fn store(&self, place: &Resolved<'_>, value: Value, env: &mut Env) -> Exec<()> {
        let (Resolved::Var(name) | Resolved::Index(name, _)) = place;
        let Some(slot) = env.get_mut(name) else {
            return Err(self.fail(RuntimeErrorKind::UndefinedVariable(name.to_string())));
        };
        match place {
            Resolved::Var(_) => {
                *slot = value;
                Ok(())
            }
            Resolved::Index(_, index) => ops::set_index(slot, index, &value).map_err(|kind| self.fail(kind)),
        }
    }

    fn host_call(&mut self, call: HostCall, args: &[Value]) -> Exec<Value> {
        let arg = |idx: usize| args.get(idx).cloned().unwrap_or_default();
        let result = match call {
            HostCall::ToHex => builtins::to_hex(&arg(0)),
            HostCall::FromHex => builtins::from_hex(&arg(0)),
            HostCall::IsFirstCall => Ok(Value::Bool(self.host.first_call)),
            HostCall::GetValue => {
                let key = arg(0);
                expect_text(&key, "key").map(|key| self.host.store.get(key))
            }
            HostCall::SetValue => {
                let key = arg(0);
                expect_text(&key, "key").map(|key| {
                    self.host.store.set(key, arg(1));
                    Value::Null
                })
            }
            HostCall::GetShared => {
                let key = arg(0);
                expect_text(&key, "key").map(|key| self.host.shared.get(key))
            }
            HostCall::SetShared => {
                let key = arg(0);
                expect_text(&key, "key").map(|key| {
                    self.host.shared.set(key, arg(1));
                    Value::Null
                })
            }
            HostCall::Log => {
                info!(target: "devsim::script", unit = self.host.unit, line = self.line, "{}", arg(0));
                Ok(Value::Null)
            }
        };
        result.map_err(|kind| self.fail(kind))
    }

    fn notify(&self, line: usize, variables: &[String], env: &Env) {
        let Some(session) = self.host.session else { return };
        // Skip building snapshots unless someone is debugging.
        if !session.is_enabled() {
            return;
        }
        let snapshot = variables
            .iter()
            .filter_map(|name| env.get(name).map(|value| VariableSnapshot::capture(name, value)))
            .collect();
        session.notify(line, snapshot);
    }

    fn enter_line(&mut self, line: usize) {
        if line != 0 {
            self.line = line;
        }
    }

    fn tick(&mut self) -> Exec<()> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(self.fail(RuntimeErrorKind::StepLimit(self.max_steps)));
        }
        Ok(())
    }

    fn fail(&self, kind: RuntimeErrorKind) -> RuntimeError {
        kind.at(self.line)
    }
}
