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

//! Depth-first walk over the entry point body collecting notification points.

use std::collections::BTreeMap;

use itertools::Itertools;
use solang_parser::pt::{CodeLocation, Loc, Statement};

use super::{BodyWrap, InstrumentationPlan, NotificationPoint, PointKind};
use crate::{
    syntax::{self, block_close, block_open, span, statement_end},
    template::{LineMap, DATA_PARAM, MESSAGE_PARAM},
};

type ScopeId = usize;

/// Collects notification points and single-statement body wraps for one script.
pub(super) struct Analyzer<'a> {
    /// The wrapped translation unit
    source: &'a str,
    map: LineMap,
    /// Byte offset of the script body inside `source`
    body_start: usize,
    body_end: usize,
    /// Active variable bindings in declaration order
    bindings: Vec<(String, ScopeId)>,
    scope_stack: Vec<ScopeId>,
    next_scope: ScopeId,
    points: BTreeMap<usize, NotificationPoint>,
    wraps: Vec<BodyWrap>,
}

impl<'a> Analyzer<'a> {
    pub(super) fn new(source: &'a str, body: &str, body_start: usize) -> Self {
        Self {
            source,
            map: LineMap::new(source, body),
            body_start,
            body_end: body_start + body.len(),
            bindings: Vec::new(),
            scope_stack: Vec::new(),
            next_scope: 0,
            points: BTreeMap::new(),
            wraps: Vec::new(),
        }
    }

    /// Walks the entry point body and returns the resulting plan.
    pub(super) fn analyze(mut self, statements: &[Statement]) -> InstrumentationPlan {
        self.enter_scope();
        self.declare(MESSAGE_PARAM);
        self.declare(DATA_PARAM);
        for stmt in statements {
            self.visit_statement(stmt);
        }
        // The closing brace of the entry point belongs to the template.
        self.exit_scope();

        InstrumentationPlan { points: self.points, wraps: self.wraps }
    }

    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Block { loc, statements, .. } => self.visit_block(loc, statements),
            Statement::Break(_) => {}
            Statement::VariableDefinition(loc, decl, _) => {
                // The declared name is visible only after the declaration.
                self.record_statement(loc);
                if let Some(name) = &decl.name {
                    self.declare(&name.name);
                }
            }
            Statement::If(loc, _, then, otherwise) => {
                self.record_statement(loc);
                self.visit_body(then);
                if let Some(otherwise) = otherwise {
                    self.visit_body(otherwise);
                }
            }
            Statement::While(loc, _, body) => self.visit_loop(loc, body),
            Statement::DoWhile(loc, body, _) => self.visit_loop(loc, body),
            Statement::For(loc, init, _, _, body) => self.visit_for(loc, init.as_deref(), body.as_deref()),
            other => self.record_statement(&other.loc()),
        }
    }

    fn visit_block(&mut self, loc: &Loc, statements: &[Statement]) {
        self.enter_scope();
        for stmt in statements {
            self.visit_statement(stmt);
        }
        if let Some(close) = block_close(self.source, loc) {
            self.record_point(close, close, PointKind::BlockClose);
        }
        self.exit_scope();
    }

    /// Visits the body of a branch or loop. A single statement body is wrapped in
    /// braces so a notification can precede it without leaving the branch.
    fn visit_body(&mut self, body: &Statement) {
        if matches!(body, Statement::Block { .. }) {
            self.visit_statement(body);
            return;
        }

        if let Some((start, end)) = span(&body.loc()) {
            let end = statement_end(self.source, end);
            if self.in_body(start) && self.in_body(end) {
                self.wraps.push(BodyWrap {
                    open: start - self.body_start,
                    close: end - self.body_start,
                });
            }
        }
        self.enter_scope();
        self.visit_statement(body);
        self.exit_scope();
    }

    fn visit_loop(&mut self, loc: &Loc, body: &Statement) {
        match body {
            Statement::Block { loc: body_loc, statements, .. } => {
                // Inside the body, so the header is reported on every iteration.
                if let (Some(header), Some(open)) =
                    (syntax::start(loc), block_open(self.source, body_loc))
                {
                    self.record_point(header, open + 1, PointKind::LoopHeader);
                }
                self.visit_block(body_loc, statements);
            }
            other => {
                self.record_statement(loc);
                self.visit_body(other);
            }
        }
    }

    fn visit_for(&mut self, loc: &Loc, init: Option<&Statement>, body: Option<&Statement>) {
        let block_body = matches!(body, Some(Statement::Block { .. }));
        if !block_body {
            // Inserted before the keyword, where the initializer is not yet declared.
            self.record_statement(loc);
        }

        self.enter_scope();
        if let Some(Statement::VariableDefinition(_, decl, _)) = init {
            if let Some(name) = &decl.name {
                self.declare(&name.name);
            }
        }
        match body {
            Some(body) if block_body => self.visit_loop(loc, body),
            Some(body) => self.visit_body(body),
            None => {}
        }
        self.exit_scope();
    }

    fn record_statement(&mut self, loc: &Loc) {
        if let Some(start) = syntax::start(loc) {
            self.record_point(start, start, PointKind::Statement);
        }
    }

    /// Records a point reported on the line of `line_offset` and inserted at
    /// `insert_offset`. The first point recorded for a line wins.
    fn record_point(&mut self, line_offset: usize, insert_offset: usize, kind: PointKind) {
        if !self.in_body(line_offset) || !self.in_body(insert_offset) {
            return;
        }
        let line = self.map.body_line(line_offset);
        if line == 0 || self.points.contains_key(&line) {
            return;
        }

        let variables = self.visible_variables();
        self.points.insert(
            line,
            NotificationPoint { line, offset: insert_offset - self.body_start, kind, variables },
        );
    }

    /// Names in scope, in declaration order. A shadowed name appears once.
    fn visible_variables(&self) -> Vec<String> {
        self.bindings.iter().map(|(name, _)| name.clone()).unique().collect()
    }

    fn in_body(&self, offset: usize) -> bool {
        (self.body_start..=self.body_end).contains(&offset)
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scope_stack.last() {
            self.bindings.push((name.to_string(), *scope));
        }
    }

    fn enter_scope(&mut self) {
        self.scope_stack.push(self.next_scope);
        self.next_scope += 1;
    }

    /// Drops the bindings of the innermost scope, unwinding from the end.
    fn exit_scope(&mut self) {
        let Some(scope) = self.scope_stack.pop() else { return };
        while self.bindings.last().is_some_and(|(_, owner)| *owner == scope) {
            self.bindings.pop();
        }
    }
}
